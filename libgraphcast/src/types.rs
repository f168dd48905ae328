//! Core types for Graphcast

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Diagnostic, GraphcastError};

/// Supported Graph-API-style publishing targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Threads,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Threads => "threads",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" | "ig" => Ok(Self::Instagram),
            "threads" => Ok(Self::Threads),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: instagram, threads",
                s
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One publish run's input. Image URLs must already be publicly hosted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub id: String,
    pub platform: Platform,
    pub image_urls: Vec<String>,
    pub caption: String,
    pub hashtags: Vec<String>,
    /// Epoch seconds; the platform publishes on its own at this instant
    pub scheduled_time: Option<i64>,
}

impl PublishRequest {
    pub fn new(platform: Platform, image_urls: Vec<String>, caption: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform,
            image_urls,
            caption: caption.into(),
            hashtags: Vec::new(),
            scheduled_time: None,
        }
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.hashtags = hashtags;
        self
    }

    pub fn with_schedule(mut self, scheduled_time: i64) -> Self {
        self.scheduled_time = Some(scheduled_time);
        self
    }

    pub fn is_carousel(&self) -> bool {
        self.image_urls.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Single,
    CarouselChild,
    CarouselParent,
}

/// Lifecycle of a remote media container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Created,
    Processing,
    Finished,
    /// Remote status string, verbatim
    Error(String),
    Expired,
}

impl ContainerState {
    /// Map a remote status code. Anything unrecognised is still processing.
    pub fn from_status_code(code: &str, status_text: Option<&str>) -> Self {
        match code.trim().to_uppercase().as_str() {
            "FINISHED" | "PUBLISHED" => Self::Finished,
            "EXPIRED" => Self::Expired,
            "ERROR" => Self::Error(status_text.unwrap_or(code).to_string()),
            _ => Self::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error(_) | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Processing => "PROCESSING",
            Self::Finished => "FINISHED",
            Self::Error(_) => "ERROR",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(status) => write!(f, "ERROR ({})", status),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Local view of a container that lives on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaContainer {
    pub id: String,
    pub kind: MediaKind,
    pub state: ContainerState,
    pub created_at: i64,
    pub last_checked_at: Option<i64>,
    pub last_error: Option<String>,
}

impl MediaContainer {
    pub fn new(id: String, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            state: ContainerState::Created,
            created_at: chrono::Utc::now().timestamp(),
            last_checked_at: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishOutcome {
    Published,
    Scheduled,
    Failed,
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Published => write!(f, "published"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one publish run
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub platform: Platform,
    pub outcome: PublishOutcome,
    pub media_id: Option<String>,
    pub container_id: Option<String>,
    pub scheduled_time: Option<i64>,
    pub image_count: usize,
    pub error: Option<Diagnostic>,
}

impl PublishResult {
    pub fn published(
        platform: Platform,
        media_id: String,
        container_id: String,
        image_count: usize,
    ) -> Self {
        Self {
            platform,
            outcome: PublishOutcome::Published,
            media_id: Some(media_id),
            container_id: Some(container_id),
            scheduled_time: None,
            image_count,
            error: None,
        }
    }

    pub fn scheduled(
        platform: Platform,
        container_id: String,
        scheduled_time: i64,
        image_count: usize,
    ) -> Self {
        Self {
            platform,
            outcome: PublishOutcome::Scheduled,
            media_id: None,
            container_id: Some(container_id),
            scheduled_time: Some(scheduled_time),
            image_count,
            error: None,
        }
    }

    pub fn failed(platform: Platform, image_count: usize, error: &GraphcastError) -> Self {
        Self {
            platform,
            outcome: PublishOutcome::Failed,
            media_id: None,
            container_id: None,
            scheduled_time: None,
            image_count,
            error: Some(error.diagnostic()),
        }
    }

    pub fn is_published(&self) -> bool {
        self.outcome == PublishOutcome::Published
    }

    pub fn is_scheduled(&self) -> bool {
        self.outcome == PublishOutcome::Scheduled
    }
}
