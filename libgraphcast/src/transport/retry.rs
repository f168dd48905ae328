//! Retrying transport with failure classification and linear backoff
//!
//! Classification, first match wins:
//!
//! 1. HTTP 500/502/503/504
//! 2. `error.is_transient == true`
//! 3. `error.code` in [`RETRYABLE_CODES`]
//! 4. message matches a known transient phrase (for bodies that carry no
//!    structured hints)
//! 5. everything else is terminal
//!
//! Bare transport failures (timeouts, refused connections) are retried with
//! their own, shorter, base delay. The wait before attempt `n + 1` is
//! `base * n`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{HttpRequest, HttpSend};
use crate::config::RetryConfig;
use crate::error::{GraphcastError, RemoteApiError, Result, TransportError};

/// HTTP statuses that indicate a momentary server-side problem
pub const RETRYABLE_STATUS: [u16; 4] = [500, 502, 503, 504];

/// Graph error codes documented as "retry later": unknown error, service
/// temporarily unavailable, media not ready
pub const RETRYABLE_CODES: [i64; 3] = [1, 2, 9007];

const TRANSIENT_PHRASES: [&str; 3] = ["unexpected error", "please retry", "temporarily unavailable"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable(&'static str),
    Terminal,
}

impl Classification {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Classification::Retryable(_))
    }
}

/// Decide whether a structured remote failure is worth another attempt
pub fn classify(error: &RemoteApiError) -> Classification {
    if RETRYABLE_STATUS.contains(&error.http_status) {
        return Classification::Retryable("server error status");
    }

    if error.is_transient == Some(true) {
        return Classification::Retryable("flagged transient");
    }

    if let Some(code) = error.code {
        if RETRYABLE_CODES.contains(&code) {
            return Classification::Retryable("retryable error code");
        }
    }

    if is_transient_message(&error.message) {
        return Classification::Retryable("transient message");
    }

    Classification::Terminal
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();

    if TRANSIENT_PHRASES.iter().any(|p| message.contains(p)) {
        return true;
    }

    // "media ID is not available", "the media is not available yet", ...
    message
        .find("media")
        .map(|at| message[at..].contains("not available"))
        .unwrap_or(false)
}

/// Attempt budget and backoff bases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base wait after a remote (HTTP-level) failure
    pub api_base_delay: Duration,
    /// Base wait after a timeout or connection failure
    pub transport_base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            api_base_delay: Duration::from_secs(30),
            transport_base_delay: Duration::from_secs(15),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            api_base_delay: Duration::from_secs(config.api_base_delay_secs),
            transport_base_delay: Duration::from_secs(config.transport_base_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based)
    fn delay_for(&self, failure: &Failure, attempt: u32) -> Duration {
        let base = match failure {
            Failure::Remote(_) => self.api_base_delay,
            Failure::Transport(_) => self.transport_base_delay,
        };
        base * attempt
    }
}

enum Failure {
    Remote(RemoteApiError),
    Transport(TransportError),
}

impl Failure {
    fn is_retryable(&self) -> bool {
        match self {
            Failure::Remote(e) => classify(e).is_retryable(),
            Failure::Transport(e) => e.is_retryable(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Remote(e) => write!(f, "{}", e),
            Failure::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl From<Failure> for GraphcastError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Remote(e) => GraphcastError::RemoteApi(e),
            Failure::Transport(e) => GraphcastError::Transport(e),
        }
    }
}

/// Issues calls through an [`HttpSend`] and retries transient failures.
///
/// Cheap to clone; clones share the sender.
#[derive(Clone)]
pub struct RetryingTransport {
    sender: Arc<dyn HttpSend>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(sender: Arc<dyn HttpSend>, policy: RetryPolicy) -> Self {
        Self { sender, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST with form parameters, retried per policy
    pub async fn post(
        &self,
        url: &str,
        params: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Value> {
        let request = HttpRequest::post(url, params, timeout);
        self.execute(request, self.policy.max_attempts).await
    }

    /// GET with query parameters, retried per policy
    pub async fn get(
        &self,
        url: &str,
        params: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Value> {
        let request = HttpRequest::get(url, params, timeout);
        self.execute(request, self.policy.max_attempts).await
    }

    /// GET exactly once. For callers that have their own retry loop or that
    /// must not stall on an outage.
    pub async fn get_once(
        &self,
        url: &str,
        params: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Value> {
        let request = HttpRequest::get(url, params, timeout);
        self.execute(request, 1).await
    }

    async fn execute(&self, request: HttpRequest, max_attempts: u32) -> Result<Value> {
        let mut attempt = 1;

        loop {
            debug!("{} {} (attempt {}/{})", request.method, request.endpoint(), attempt, max_attempts);

            let failure = match self.sender.send(&request).await {
                Ok(response) if response.is_success() => {
                    let body = response.json()?;
                    // Some endpoints answer 200 with an error object
                    if body.get("error").is_some() {
                        Failure::Remote(RemoteApiError::from_body(response.status, &body))
                    } else {
                        if attempt > 1 {
                            info!(
                                "{} {} succeeded on attempt {}",
                                request.method,
                                request.endpoint(),
                                attempt
                            );
                        }
                        return Ok(body);
                    }
                }
                Ok(response) => Failure::Remote(RemoteApiError::from_body(
                    response.status,
                    &response.json_or_text(),
                )),
                Err(e) => Failure::Transport(e),
            };

            if !failure.is_retryable() {
                debug!("{} {} failed terminally: {}", request.method, request.endpoint(), failure);
                return Err(failure.into());
            }

            if attempt >= max_attempts {
                if max_attempts > 1 {
                    warn!(
                        "{} {} failed after {} attempts: {}",
                        request.method,
                        request.endpoint(),
                        max_attempts,
                        failure
                    );
                }
                return Err(failure.into());
            }

            let wait = self.policy.delay_for(&failure, attempt);
            warn!(
                "Transient error on {} {} (attempt {}/{}): {}. Retrying in {}s...",
                request.method,
                request.endpoint(),
                attempt,
                max_attempts,
                failure,
                wait.as_secs()
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}
