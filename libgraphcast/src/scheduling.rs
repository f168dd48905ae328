//! Scheduling input parsing and window checks
//!
//! `parse_schedule` turns what a user types into an epoch timestamp:
//! - Relative durations: "1h", "30m", "2d", "1 hour"
//! - Natural language: "tomorrow 10am", "next monday"
//! - Raw epoch seconds: "1767225600"
//!
//! `validate_window` then checks the timestamp against what the target
//! platform accepts.

use chrono::{DateTime, Duration, Utc};

use crate::error::{GraphcastError, Result};
use crate::platforms::PlatformProfile;

/// Anything below this is a duration or a typo, not an epoch
const MIN_EPOCH: i64 = 1_000_000_000;

/// Parse a schedule string into epoch seconds (UTC).
///
/// # Errors
///
/// Returns `GraphcastError::Validation` if the string is empty or matches
/// none of the supported formats.
pub fn parse_schedule(input: &str) -> Result<i64> {
    parse_schedule_at(input, Utc::now())
}

/// [`parse_schedule`] with an explicit "now"
pub fn parse_schedule_at(input: &str, now: DateTime<Utc>) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GraphcastError::Validation(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(epoch) = input.parse::<i64>() {
        if epoch < MIN_EPOCH {
            return Err(GraphcastError::Validation(format!(
                "'{}' is not a valid epoch timestamp",
                input
            )));
        }
        return Ok(epoch);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok((now + duration).timestamp());
    }

    if let Ok(dt) = parse_natural_language(input, now) {
        return Ok(dt.timestamp());
    }

    Err(GraphcastError::Validation(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| GraphcastError::Validation(format!("Could not parse duration: {}", e)))?;

    i64::try_from(std_duration.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| GraphcastError::Validation("Duration out of range".to_string()))
}

fn parse_natural_language(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|e| GraphcastError::Validation(format!("Could not parse time: {}", e)))
}

/// Check that `scheduled_time` is in the future and inside the platform's
/// scheduling window.
///
/// # Errors
///
/// Returns `GraphcastError::Validation` when the platform cannot schedule,
/// or the time is in the past, too soon, or too far out.
pub fn validate_window(scheduled_time: i64, now: i64, profile: &PlatformProfile) -> Result<()> {
    let window = profile.schedule_window.ok_or_else(|| {
        GraphcastError::Validation(format!("{} does not support scheduled posts", profile.name))
    })?;

    let lead = scheduled_time - now;
    if lead <= 0 {
        return Err(GraphcastError::Validation(format!(
            "Scheduled time {} is not in the future",
            format_timestamp(scheduled_time)
        )));
    }

    if lead < window.min_lead_secs {
        return Err(GraphcastError::Validation(format!(
            "{} needs at least {} minutes of lead time; {} is too soon",
            profile.name,
            window.min_lead_secs / 60,
            format_timestamp(scheduled_time)
        )));
    }

    if lead > window.max_horizon_secs {
        return Err(GraphcastError::Validation(format!(
            "{} schedules at most {} days ahead; {} is too far out",
            profile.name,
            window.max_horizon_secs / 86_400,
            format_timestamp(scheduled_time)
        )));
    }

    Ok(())
}

/// RFC 3339 rendering for messages, raw seconds if out of range
pub fn format_timestamp(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}
