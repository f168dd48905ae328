//! Platform profiles and the Graph-style publish client
//!
//! Instagram and Threads speak the same container protocol with different
//! edges, field names and limits. Those differences live in a
//! [`PlatformProfile`]; [`client::PublishClient`] is written once against
//! the profile.
//!
//! ```no_run
//! use libgraphcast::platforms::PlatformProfile;
//! use libgraphcast::types::Platform;
//!
//! let profile = PlatformProfile::for_platform(Platform::Threads);
//! assert_eq!(profile.publish_edge, "threads_publish");
//! assert_eq!(profile.caption_limit, Some(500));
//! ```

use crate::config::PlatformConfig;
use crate::types::Platform;

pub mod client;
pub mod hints;

pub const INSTAGRAM_BASE_URL: &str = "https://graph.facebook.com/v18.0";
pub const THREADS_BASE_URL: &str = "https://graph.threads.net/v1.0";

/// How far ahead a platform accepts a scheduled publish time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub min_lead_secs: i64,
    pub max_horizon_secs: i64,
}

/// Everything that differs between the Graph-style platforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub name: &'static str,
    pub base_url: String,
    /// Container creation edge under the account
    pub media_edge: &'static str,
    pub publish_edge: &'static str,
    pub quota_edge: &'static str,
    /// Form field carrying the caption text
    pub caption_field: &'static str,
    /// Explicit `media_type` for image containers, where the platform wants one
    pub image_media_type: Option<&'static str>,
    /// `fields` query for a status poll
    pub status_fields: &'static str,
    /// Field in the status response holding the machine-readable state
    pub status_code_field: &'static str,
    /// Field with the human-readable detail for an `ERROR` state
    pub status_text_field: &'static str,
    pub max_images: usize,
    /// Characters, not bytes
    pub caption_limit: Option<usize>,
    /// `None` when the platform cannot schedule
    pub schedule_window: Option<ScheduleWindow>,
    pub required_scopes: &'static [&'static str],
    /// Fallback daily publishing quota when the quota endpoint omits it
    pub default_quota_total: u64,
}

impl PlatformProfile {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Instagram => Self::instagram(),
            Platform::Threads => Self::threads(),
        }
    }

    pub fn instagram() -> Self {
        Self {
            platform: Platform::Instagram,
            name: "instagram",
            base_url: INSTAGRAM_BASE_URL.to_string(),
            media_edge: "media",
            publish_edge: "media_publish",
            quota_edge: "content_publishing_limit",
            caption_field: "caption",
            image_media_type: None,
            status_fields: "status,status_code",
            status_code_field: "status_code",
            status_text_field: "status",
            max_images: 10,
            caption_limit: None,
            schedule_window: Some(ScheduleWindow {
                min_lead_secs: 10 * 60,
                max_horizon_secs: 75 * 86_400,
            }),
            required_scopes: &["instagram_basic", "instagram_content_publish"],
            default_quota_total: 100,
        }
    }

    pub fn threads() -> Self {
        Self {
            platform: Platform::Threads,
            name: "threads",
            base_url: THREADS_BASE_URL.to_string(),
            media_edge: "threads",
            publish_edge: "threads_publish",
            quota_edge: "threads_publishing_limit",
            caption_field: "text",
            image_media_type: Some("IMAGE"),
            status_fields: "status,error_message",
            status_code_field: "status",
            status_text_field: "error_message",
            max_images: 20,
            caption_limit: Some(500),
            schedule_window: None,
            required_scopes: &["threads_basic", "threads_content_publish"],
            default_quota_total: 250,
        }
    }

    /// Defaults for `platform` with the overrides from its config section
    pub fn from_config(platform: Platform, config: Option<&PlatformConfig>) -> Self {
        let mut profile = Self::for_platform(platform);
        if let Some(section) = config {
            if let Some(base_url) = &section.base_url {
                profile.base_url = base_url.trim_end_matches('/').to_string();
            }
            if let Some(max_images) = section.max_images {
                profile.max_images = max_images;
            }
            if let Some(limit) = section.caption_limit {
                profile.caption_limit = Some(limit);
            }
        }
        profile
    }

    pub fn supports_scheduling(&self) -> bool {
        self.schedule_window.is_some()
    }

    /// Caption, then a blank line and the space-joined hashtags. Cut to the
    /// caption limit, if the platform has one.
    pub fn compose_caption(&self, caption: &str, hashtags: &[String]) -> String {
        let tags: Vec<&str> = hashtags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        let text = if tags.is_empty() {
            caption.to_string()
        } else if caption.is_empty() {
            tags.join(" ")
        } else {
            format!("{}\n\n{}", caption, tags.join(" "))
        };

        match self.caption_limit {
            Some(limit) if text.chars().count() > limit => text.chars().take(limit).collect(),
            _ => text,
        }
    }

    pub(crate) fn account_url(&self, account_id: &str, edge: &str) -> String {
        format!("{}/{}/{}", self.base_url, account_id, edge)
    }

    pub(crate) fn node_url(&self, node: &str) -> String {
        format!("{}/{}", self.base_url, node)
    }
}
