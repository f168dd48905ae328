//! Graph-style container protocol client
//!
//! One client per platform. All requests carry `access_token`; failures
//! leave this module with a hint attached (see [`super::hints`]).

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::hints;
use super::PlatformProfile;
use crate::config::TimeoutConfig;
use crate::credentials::CredentialSet;
use crate::error::{ConfigError, GraphcastError, Result, TransportError};
use crate::transport::retry::RetryingTransport;
use crate::types::{ContainerState, MediaContainer, MediaKind};

/// Who the token belongs to, from `GET /me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub id: String,
    pub username: Option<String>,
}

/// Rolling 24h publishing quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishingQuota {
    pub usage: u64,
    pub total: u64,
    pub duration_secs: Option<u64>,
}

impl PublishingQuota {
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.usage)
    }
}

pub struct PublishClient {
    profile: PlatformProfile,
    credentials: Option<CredentialSet>,
    missing_reason: String,
    transport: RetryingTransport,
    timeouts: TimeoutConfig,
}

impl PublishClient {
    pub fn new(profile: PlatformProfile, transport: RetryingTransport, timeouts: TimeoutConfig) -> Self {
        Self {
            profile,
            credentials: None,
            missing_reason: "credentials".to_string(),
            transport,
            timeouts,
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Record why credentials could not be resolved; reported on first use
    pub fn with_missing_credentials(mut self, reason: impl Into<String>) -> Self {
        self.credentials = None;
        self.missing_reason = reason.into();
        self
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    pub fn transport(&self) -> &RetryingTransport {
        &self.transport
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredentials` when no credentials were
    /// resolved for this platform.
    pub fn credentials(&self) -> Result<&CredentialSet> {
        self.credentials.as_ref().ok_or_else(|| {
            ConfigError::MissingCredentials {
                platform: self.profile.name.to_string(),
                what: self.missing_reason.clone(),
            }
            .into()
        })
    }

    pub async fn create_single_container(
        &self,
        image_url: &str,
        caption: &str,
        scheduled_time: Option<i64>,
    ) -> Result<MediaContainer> {
        let mut params = vec![param("image_url", image_url)];
        if let Some(media_type) = self.profile.image_media_type {
            params.push(param("media_type", media_type));
        }
        if !caption.is_empty() {
            params.push(param(self.profile.caption_field, caption));
        }
        push_schedule(&mut params, scheduled_time);

        let id = self.create(params).await?;
        info!("Created {} image container {}", self.profile.name, id);
        Ok(MediaContainer::new(id, MediaKind::Single))
    }

    /// Carousel item: no caption, never scheduled on its own
    pub async fn create_child_container(&self, image_url: &str) -> Result<MediaContainer> {
        let mut params = vec![param("image_url", image_url), param("is_carousel_item", "true")];
        if let Some(media_type) = self.profile.image_media_type {
            params.push(param("media_type", media_type));
        }

        let id = self.create(params).await?;
        debug!("Created {} carousel item {}", self.profile.name, id);
        Ok(MediaContainer::new(id, MediaKind::CarouselChild))
    }

    /// Carousel parent referencing `child_ids` in the given order
    pub async fn create_group_container(
        &self,
        child_ids: &[String],
        caption: &str,
        scheduled_time: Option<i64>,
    ) -> Result<MediaContainer> {
        let mut params = vec![param("media_type", "CAROUSEL"), param("children", &child_ids.join(","))];
        if !caption.is_empty() {
            params.push(param(self.profile.caption_field, caption));
        }
        push_schedule(&mut params, scheduled_time);

        let id = self.create(params).await?;
        info!(
            "Created {} carousel container {} with {} items",
            self.profile.name,
            id,
            child_ids.len()
        );
        Ok(MediaContainer::new(id, MediaKind::CarouselParent))
    }

    /// Publish a finished container; returns the live media id
    pub async fn publish(&self, container_id: &str) -> Result<String> {
        let credentials = self.credentials()?;
        let url = self
            .profile
            .account_url(&credentials.account_id, self.profile.publish_edge);
        let params = vec![
            param("creation_id", container_id),
            param("access_token", credentials.access_token()),
        ];

        let body = self
            .transport
            .post(&url, params, self.timeouts.publish())
            .await
            .map_err(|e| match e {
                GraphcastError::RemoteApi(remote) => {
                    GraphcastError::RemoteApi(hints::rewrite_publish_error(remote))
                }
                other => other,
            })?;

        let media_id = extract_id(&body)?;
        info!("Published {} container {} as {}", self.profile.name, container_id, media_id);
        Ok(media_id)
    }

    /// One status read, no retries. The poller owns the retry loop.
    pub async fn status(&self, container_id: &str) -> Result<ContainerState> {
        let credentials = self.credentials()?;
        let params = vec![
            param("fields", self.profile.status_fields),
            param("access_token", credentials.access_token()),
        ];

        let body = self
            .transport
            .get_once(&self.profile.node_url(container_id), params, self.timeouts.status())
            .await
            .map_err(enrich)?;

        let code = body
            .get(self.profile.status_code_field)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let text = body.get(self.profile.status_text_field).and_then(Value::as_str);

        Ok(ContainerState::from_status_code(code, text))
    }

    /// Token introspection, single attempt. Returns the raw verdict.
    pub async fn debug_token(&self) -> Result<Value> {
        let credentials = self.credentials()?;
        let token = credentials.access_token();
        let params = vec![param("input_token", token), param("access_token", token)];

        self.transport
            .get_once(&self.profile.node_url("debug_token"), params, self.timeouts.status())
            .await
            .map_err(enrich)
    }

    pub async fn check_connection(&self) -> Result<AccountInfo> {
        let credentials = self.credentials()?;
        let params = vec![
            param("fields", "id,username"),
            param("access_token", credentials.access_token()),
        ];

        let body = self
            .transport
            .get(&self.profile.node_url("me"), params, self.timeouts.status())
            .await
            .map_err(enrich)?;

        Ok(AccountInfo {
            id: extract_id(&body)?,
            username: body.get("username").and_then(Value::as_str).map(str::to_string),
        })
    }

    pub async fn publishing_quota(&self) -> Result<PublishingQuota> {
        let credentials = self.credentials()?;
        let url = self
            .profile
            .account_url(&credentials.account_id, self.profile.quota_edge);
        let params = vec![
            param("fields", "quota_usage,config"),
            param("access_token", credentials.access_token()),
        ];

        let body = self
            .transport
            .get(&url, params, self.timeouts.status())
            .await
            .map_err(enrich)?;

        let entry = body
            .get("data")
            .and_then(Value::as_array)
            .and_then(|data| data.first())
            .unwrap_or(&Value::Null);
        let config = entry.get("config").unwrap_or(&Value::Null);

        Ok(PublishingQuota {
            usage: entry.get("quota_usage").and_then(Value::as_u64).unwrap_or(0),
            total: config
                .get("quota_total")
                .and_then(Value::as_u64)
                .unwrap_or(self.profile.default_quota_total),
            duration_secs: config.get("quota_duration").and_then(Value::as_u64),
        })
    }

    async fn create(&self, mut params: Vec<(String, String)>) -> Result<String> {
        let credentials = self.credentials()?;
        let url = self
            .profile
            .account_url(&credentials.account_id, self.profile.media_edge);
        params.push(param("access_token", credentials.access_token()));

        let body = self
            .transport
            .post(&url, params, self.timeouts.create())
            .await
            .map_err(enrich)?;

        extract_id(&body)
    }
}

fn param(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn push_schedule(params: &mut Vec<(String, String)>, scheduled_time: Option<i64>) {
    if let Some(ts) = scheduled_time {
        params.push(param("published", "false"));
        params.push(param("scheduled_publish_time", &ts.to_string()));
    }
}

fn extract_id(body: &Value) -> Result<String> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(TransportError::Decode("response carries no id".to_string()).into()),
    }
}

fn enrich(error: GraphcastError) -> GraphcastError {
    match error {
        GraphcastError::RemoteApi(remote) => GraphcastError::RemoteApi(hints::enrich(remote)),
        other => other,
    }
}
