//! Readiness polling for remote media containers
//!
//! A container moves `CREATED -> PROCESSING -> {FINISHED, ERROR, EXPIRED}` on
//! the platform's side. Publishing before `FINISHED` fails, so the workflow
//! waits here first.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::error::{GraphcastError, Result};
use crate::platforms::client::PublishClient;
use crate::types::{ContainerState, MediaContainer};

pub const EXPIRED_MESSAGE: &str = "processing window exceeded (>24h)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerPoller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ContainerPoller {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for ContainerPoller {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl ContainerPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Poll until the container is finished.
    ///
    /// Polls once right away, then every `interval`. A failed poll counts as
    /// still processing. The last sleep is clipped so the total wait never
    /// exceeds `timeout`.
    ///
    /// # Errors
    ///
    /// - `GraphcastError::ContainerTerminal` for `ERROR` or `EXPIRED`
    /// - `GraphcastError::ContainerTimeout` when `timeout` elapses first
    pub async fn wait_until_ready(
        &self,
        client: &PublishClient,
        container: &mut MediaContainer,
    ) -> Result<()> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            let state = match client.status(&container.id).await {
                Ok(state) => {
                    container.last_error = None;
                    state
                }
                Err(e) => {
                    warn!(
                        "Status check {} for container {} failed, treating as processing: {}",
                        polls, container.id, e
                    );
                    container.last_error = Some(e.to_string());
                    ContainerState::Processing
                }
            };
            container.last_checked_at = Some(chrono::Utc::now().timestamp());
            container.state = state.clone();

            match state {
                ContainerState::Finished => {
                    info!(
                        "Container {} ready after {}s ({} polls)",
                        container.id,
                        started.elapsed().as_secs(),
                        polls
                    );
                    return Ok(());
                }
                ContainerState::Error(status) => {
                    return Err(GraphcastError::ContainerTerminal {
                        container_id: container.id.clone(),
                        state: "ERROR".to_string(),
                        message: status,
                    });
                }
                ContainerState::Expired => {
                    return Err(GraphcastError::ContainerTerminal {
                        container_id: container.id.clone(),
                        state: "EXPIRED".to_string(),
                        message: EXPIRED_MESSAGE.to_string(),
                    });
                }
                ContainerState::Created | ContainerState::Processing => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    "Container {} still processing after {}s, giving up",
                    container.id,
                    elapsed.as_secs()
                );
                return Err(GraphcastError::ContainerTimeout {
                    container_id: container.id.clone(),
                    waited_secs: elapsed.as_secs(),
                });
            }

            let wait = self.interval.min(self.timeout - elapsed);
            debug!(
                "Container {} is {}, next check in {}s",
                container.id,
                container.state,
                wait.as_secs()
            );
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use crate::credentials::CredentialSet;
    use crate::error::TransportError;
    use crate::platforms::PlatformProfile;
    use crate::transport::mock::{MockReply, MockSender};
    use crate::transport::retry::{RetryPolicy, RetryingTransport};
    use crate::transport::Method;
    use crate::types::MediaKind;
    use serde_json::json;
    use std::sync::Arc;

    fn client(mock: &MockSender) -> PublishClient {
        let transport = RetryingTransport::new(Arc::new(mock.clone()), RetryPolicy::default());
        PublishClient::new(PlatformProfile::instagram(), transport, TimeoutConfig::default())
            .with_credentials(CredentialSet::new("token-value-0000000", "1784"))
    }

    fn container() -> MediaContainer {
        MediaContainer::new("C1".to_string(), MediaKind::Single)
    }

    fn status(code: &str) -> MockReply {
        MockReply::ok(json!({"status_code": code, "status": code}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_every_interval() {
        let mock = MockSender::new();
        mock.on_get("/C1", status("IN_PROGRESS"))
            .on_get("/C1", status("IN_PROGRESS"))
            .on_get("/C1", status("FINISHED"));

        let mut container = container();
        let start = Instant::now();
        ContainerPoller::default()
            .wait_until_ready(&client(&mock), &mut container)
            .await
            .unwrap();

        let calls = mock.requests_to(Method::Get, "/C1");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].at, start);
        assert_eq!(calls[1].at - calls[0].at, Duration::from_secs(30));
        assert_eq!(calls[2].at - calls[1].at, Duration::from_secs(30));
        assert_eq!(container.state, ContainerState::Finished);
        assert!(container.last_checked_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_is_terminal() {
        let mock = MockSender::new();
        mock.on_get("/C1", status("EXPIRED"));

        let err = ContainerPoller::default()
            .wait_until_ready(&client(&mock), &mut container())
            .await
            .unwrap_err();

        match err {
            GraphcastError::ContainerTerminal { state, message, .. } => {
                assert_eq!(state, "EXPIRED");
                assert_eq!(message, EXPIRED_MESSAGE);
            }
            other => panic!("Expected terminal error, got {:?}", other),
        }
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_carries_remote_text() {
        let mock = MockSender::new();
        mock.on_get(
            "/C1",
            MockReply::ok(json!({"status_code": "ERROR", "status": "Error: Media upload has failed with error code 2207026"})),
        );

        let err = ContainerPoller::default()
            .wait_until_ready(&client(&mock), &mut container())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("2207026"));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_configured_wait() {
        let mock = MockSender::new();
        mock.on_get("/C1", status("IN_PROGRESS"));

        let poller = ContainerPoller::new(Duration::from_secs(30), Duration::from_secs(100));
        let start = Instant::now();
        let err = poller
            .wait_until_ready(&client(&mock), &mut container())
            .await
            .unwrap_err();

        match err {
            GraphcastError::ContainerTimeout { container_id, waited_secs } => {
                assert_eq!(container_id, "C1");
                assert_eq!(waited_secs, 100);
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
        // 0, 30, 60, 90, then the clipped sleep lands on 100
        assert_eq!(mock.call_count(Method::Get, "/C1"), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_counts_as_processing() {
        let mock = MockSender::new();
        mock.on_get("/C1", MockReply::Fail(TransportError::Timeout("15s".to_string())))
            .on_get("/C1", MockReply::Text(503, "busy".to_string()))
            .on_get("/C1", status("FINISHED"));

        let mut container = container();
        let start = Instant::now();
        ContainerPoller::default()
            .wait_until_ready(&client(&mock), &mut container)
            .await
            .unwrap();

        assert_eq!(mock.call_count(Method::Get, "/C1"), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert!(container.last_error.is_none());
    }
}
