//! End-to-end publish runs
//!
//! One run turns a [`PublishRequest`] into a live (or scheduled) post:
//!
//! 1. validate the request against the platform profile (no network)
//! 2. resolve credentials (no network)
//! 3. advisory token check
//! 4. create the container(s): one image container, or carousel items in
//!    input order followed by the carousel container
//! 5. wait for the top-level container to finish processing
//! 6. scheduled requests stop here; the platform publishes on its own
//! 7. publish
//!
//! There is no idempotency key on the platform side. Running the same
//! request twice creates new containers and can post twice.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::TokenValidator;
use crate::config::Config;
use crate::container::ContainerPoller;
use crate::credentials::CredentialSet;
use crate::error::{ConfigError, GraphcastError, Result};
use crate::jobs::{JobRecord, JobStage, JobStore};
use crate::platforms::client::PublishClient;
use crate::platforms::PlatformProfile;
use crate::scheduling::validate_window;
use crate::transport::http::ReqwestSender;
use crate::transport::retry::{RetryPolicy, RetryingTransport};
use crate::transport::HttpSend;
use crate::types::{MediaContainer, Platform, PublishRequest, PublishResult};

pub struct Publisher {
    clients: HashMap<Platform, PublishClient>,
    poller: ContainerPoller,
    validator: TokenValidator,
    jobs: Option<Arc<dyn JobStore>>,
}

impl Publisher {
    /// Empty publisher; add platforms with [`Publisher::with_client`]
    pub fn new(poller: ContainerPoller) -> Self {
        Self {
            clients: HashMap::new(),
            poller,
            validator: TokenValidator::new(),
            jobs: None,
        }
    }

    /// Production wiring: `reqwest` transport, credentials from env/config
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with_sender(config, Arc::new(ReqwestSender::new()))
    }

    /// Same as [`Publisher::from_config`] over any [`HttpSend`]
    pub fn from_config_with_sender(config: &Config, sender: Arc<dyn HttpSend>) -> Self {
        let transport = RetryingTransport::new(sender, RetryPolicy::from(&config.retry));
        let mut publisher = Self::new(ContainerPoller::from(&config.polling));

        for platform in [Platform::Instagram, Platform::Threads] {
            let section = config.platform(platform);
            let client = PublishClient::new(
                PlatformProfile::from_config(platform, section),
                transport.clone(),
                config.timeouts.clone(),
            );

            let client = match CredentialSet::resolve(platform, section) {
                Ok(credentials) => {
                    debug!(
                        "Resolved {} credentials for account {}",
                        platform,
                        credentials.masked_account()
                    );
                    client.with_credentials(credentials)
                }
                Err(GraphcastError::Config(ConfigError::PlatformDisabled(_))) => {
                    debug!("{} is disabled in the configuration", platform);
                    continue;
                }
                Err(GraphcastError::Config(ConfigError::MissingCredentials { what, .. })) => {
                    client.with_missing_credentials(what)
                }
                Err(e) => client.with_missing_credentials(format!("usable credentials ({})", e)),
            };

            publisher = publisher.with_client(client);
        }

        publisher
    }

    /// Register (or replace) the client for its profile's platform
    pub fn with_client(mut self, client: PublishClient) -> Self {
        self.clients.insert(client.profile().platform, client);
        self
    }

    pub fn with_job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(store);
        self
    }

    pub fn client(&self, platform: Platform) -> Option<&PublishClient> {
        self.clients.get(&platform)
    }

    /// Execute one publish run.
    ///
    /// # Errors
    ///
    /// - `Validation` for a request the platform would reject (no calls made)
    /// - `Config` when the platform is disabled or has no credentials
    /// - `Auth` when the token is explicitly invalid
    /// - `Transport`/`RemoteApi`/`CarouselChild` when a call fails for good
    /// - `ContainerTimeout`/`ContainerTerminal` when processing does not finish
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishResult> {
        self.track(JobRecord::new(&request.id, request.platform));

        let outcome = self.execute(request).await;

        let result = match &outcome {
            Ok(result) => result.clone(),
            Err(e) => PublishResult::failed(request.platform, request.image_urls.len(), e),
        };
        self.update(&request.id, |record| {
            record.stage = JobStage::Done;
            record.result = Some(result.clone());
        });

        outcome
    }

    /// [`Publisher::publish`] with the error folded into a failed result
    pub async fn run(&self, request: &PublishRequest) -> PublishResult {
        match self.publish(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Publish to {} failed: {}", request.platform, e);
                PublishResult::failed(request.platform, request.image_urls.len(), &e)
            }
        }
    }

    /// Run independent requests concurrently. Results keep the input order.
    pub async fn publish_many(&self, requests: &[PublishRequest]) -> Vec<PublishResult> {
        join_all(requests.iter().map(|request| self.run(request))).await
    }

    async fn execute(&self, request: &PublishRequest) -> Result<PublishResult> {
        let client = self.clients.get(&request.platform);

        // A bad request is reported as such even for an unconfigured platform
        let defaults;
        let profile = match client {
            Some(client) => client.profile(),
            None => {
                defaults = PlatformProfile::for_platform(request.platform);
                &defaults
            }
        };
        validate_request(request, profile, chrono::Utc::now().timestamp())?;

        let client =
            client.ok_or_else(|| ConfigError::PlatformDisabled(request.platform.to_string()))?;
        client.credentials()?;

        info!(
            "Publishing {} image(s) to {} (request {})",
            request.image_urls.len(),
            profile.name,
            request.id
        );

        self.validator.validate(client).await?;

        let caption = profile.compose_caption(&request.caption, &request.hashtags);

        self.update(&request.id, |record| record.stage = JobStage::CreatingContainers);
        let mut container = if request.is_carousel() {
            self.create_carousel(client, request, &caption).await?
        } else {
            client
                .create_single_container(&request.image_urls[0], &caption, request.scheduled_time)
                .await?
        };

        let container_id = container.id.clone();
        self.update(&request.id, |record| {
            record.stage = JobStage::WaitingForContainer;
            record.container_ids.push(container_id.clone());
        });

        self.poller.wait_until_ready(client, &mut container).await?;

        if let Some(scheduled_time) = request.scheduled_time {
            info!(
                "Container {} scheduled on {} for {}",
                container.id,
                profile.name,
                crate::scheduling::format_timestamp(scheduled_time)
            );
            return Ok(PublishResult::scheduled(
                request.platform,
                container.id,
                scheduled_time,
                request.image_urls.len(),
            ));
        }

        self.update(&request.id, |record| record.stage = JobStage::Publishing);
        let media_id = client.publish(&container.id).await?;

        Ok(PublishResult::published(
            request.platform,
            media_id,
            container.id,
            request.image_urls.len(),
        ))
    }

    async fn create_carousel(
        &self,
        client: &PublishClient,
        request: &PublishRequest,
        caption: &str,
    ) -> Result<MediaContainer> {
        let mut child_ids = Vec::with_capacity(request.image_urls.len());

        for (index, url) in request.image_urls.iter().enumerate() {
            let child = client
                .create_child_container(url)
                .await
                .map_err(|e| GraphcastError::CarouselChild {
                    index,
                    source: Box::new(e),
                })?;
            child_ids.push(child.id);
        }

        let ids = child_ids.clone();
        self.update(&request.id, |record| record.container_ids.extend(ids.iter().cloned()));

        client
            .create_group_container(&child_ids, caption, request.scheduled_time)
            .await
    }

    fn track(&self, record: JobRecord) {
        if let Some(store) = &self.jobs {
            store.insert(record);
        }
    }

    fn update(&self, request_id: &str, mut change: impl FnMut(&mut JobRecord)) {
        if let Some(store) = &self.jobs {
            store.update(request_id, &mut change);
        }
    }
}

/// Reject requests the platform would refuse, before any call is made.
///
/// # Errors
///
/// Returns `GraphcastError::Validation` describing the first problem found.
pub fn validate_request(request: &PublishRequest, profile: &PlatformProfile, now: i64) -> Result<()> {
    let count = request.image_urls.len();
    if count == 0 {
        return Err(GraphcastError::Validation(
            "At least one image URL is required".to_string(),
        ));
    }

    if count > profile.max_images {
        return Err(GraphcastError::Validation(format!(
            "{} accepts at most {} images per post, got {}",
            profile.name, profile.max_images, count
        )));
    }

    for (index, url) in request.image_urls.iter().enumerate() {
        if !is_http_url(url) {
            return Err(GraphcastError::Validation(format!(
                "Image {} is not an http(s) URL: '{}'",
                index + 1,
                url
            )));
        }
    }

    if let Some(scheduled_time) = request.scheduled_time {
        validate_window(scheduled_time, now, profile)?;
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    ["https://", "http://"]
        .iter()
        .any(|scheme| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}
