//! Pre-flight token check
//!
//! The introspection endpoint is advisory: when it cannot be reached, or
//! answers with something other than a verdict about the token, the run goes
//! ahead and the publish calls themselves will surface a bad token. Only an
//! explicit "invalid", a missing required scope, or error 190 stop the run.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::TokenGrant;
use crate::error::{GraphcastError, Result};
use crate::platforms::client::PublishClient;
use crate::platforms::PlatformProfile;

/// Graph error code for an invalid or expired OAuth token
pub const INVALID_TOKEN_CODE: i64 = 190;

const EXPIRY_WARNING_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenCheck {
    Verified {
        scopes: Vec<String>,
        /// Epoch seconds, `None` when the token never expires
        expires_at: Option<i64>,
    },
    /// Could not be checked; the run continues
    Unverified { reason: String },
}

impl TokenCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, TokenCheck::Verified { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator;

impl TokenValidator {
    pub fn new() -> Self {
        Self
    }

    /// Introspect the client's token. A verified grant is stored on the
    /// client's credentials.
    ///
    /// # Errors
    ///
    /// Returns `GraphcastError::Auth` for an explicit invalid verdict, a
    /// missing required scope, or remote error 190, and
    /// `GraphcastError::Config` when the client has no credentials.
    pub async fn validate(&self, client: &PublishClient) -> Result<TokenCheck> {
        let credentials = client.credentials()?;
        debug!(
            "Checking {} token {}",
            client.profile().name,
            credentials.masked_token()
        );

        match client.debug_token().await {
            Ok(body) => {
                let check = self.evaluate(client.profile(), &body, Utc::now().timestamp())?;
                if let TokenCheck::Verified { scopes, expires_at } = &check {
                    credentials.record_grant(TokenGrant {
                        scopes: scopes.clone(),
                        expires_at: *expires_at,
                    });
                }
                Ok(check)
            }
            Err(GraphcastError::RemoteApi(remote)) if remote.code == Some(INVALID_TOKEN_CODE) => {
                Err(GraphcastError::Auth(format!(
                    "{} rejected the token {}: {}",
                    client.profile().name,
                    credentials.masked_token(),
                    remote
                )))
            }
            Err(e @ GraphcastError::Config(_)) => Err(e),
            Err(e) => {
                warn!(
                    "Could not verify {} token, continuing anyway: {}",
                    client.profile().name,
                    e
                );
                Ok(TokenCheck::Unverified {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Judge an introspection body. The verdict may sit at the top level or
    /// under `data`.
    pub fn evaluate(&self, profile: &PlatformProfile, body: &Value, now: i64) -> Result<TokenCheck> {
        let verdict = body.get("data").unwrap_or(body);

        match verdict.get("is_valid").and_then(Value::as_bool) {
            Some(true) => {}
            Some(false) => {
                let reason = verdict
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("token is not valid");
                return Err(GraphcastError::Auth(format!(
                    "{} token is invalid: {}",
                    profile.name, reason
                )));
            }
            None => {
                warn!(
                    "{} token introspection returned no verdict, continuing anyway",
                    profile.name
                );
                return Ok(TokenCheck::Unverified {
                    reason: "introspection returned no verdict".to_string(),
                });
            }
        }

        let scopes: Vec<String> = verdict
            .get("scopes")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let missing: Vec<&str> = profile
            .required_scopes
            .iter()
            .copied()
            .filter(|required| !scopes.iter().any(|s| s == required))
            .collect();

        if !missing.is_empty() {
            return Err(GraphcastError::Auth(format!(
                "{} token is missing required permission(s): {}. Reconnect the account and grant them",
                profile.name,
                missing.join(", ")
            )));
        }

        let expires_at = verdict
            .get("expires_at")
            .and_then(Value::as_i64)
            .filter(|ts| *ts != 0);

        if let Some(ts) = expires_at {
            let remaining = ts - now;
            if remaining < EXPIRY_WARNING_SECS {
                warn!(
                    "{} token expires in {}h; refresh it soon",
                    profile.name,
                    remaining.max(0) / 3600
                );
            }
        }

        Ok(TokenCheck::Verified { scopes, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use crate::credentials::CredentialSet;
    use crate::error::TransportError;
    use crate::transport::mock::{MockReply, MockSender};
    use crate::transport::retry::{RetryPolicy, RetryingTransport};
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::Arc;

    const NOW: i64 = 1_800_000_000;

    fn client(mock: &MockSender) -> PublishClient {
        let transport = RetryingTransport::new(Arc::new(mock.clone()), RetryPolicy::default());
        PublishClient::new(PlatformProfile::instagram(), transport, TimeoutConfig::default())
            .with_credentials(CredentialSet::new("EAAB-token-under-test", "1784"))
    }

    fn verdict(scopes: &[&str]) -> Value {
        json!({"data": {"is_valid": true, "scopes": scopes, "expires_at": 0}})
    }

    #[test]
    fn test_valid_token_with_scopes() {
        let check = TokenValidator::new()
            .evaluate(
                &PlatformProfile::instagram(),
                &verdict(&["instagram_basic", "instagram_content_publish", "pages_show_list"]),
                NOW,
            )
            .unwrap();

        match check {
            TokenCheck::Verified { scopes, expires_at } => {
                assert_eq!(scopes.len(), 3);
                assert_eq!(expires_at, None);
            }
            other => panic!("Expected verified, got {:?}", other),
        }
    }

    #[test]
    fn test_verdict_at_top_level() {
        let body = json!({"is_valid": true, "scopes": ["threads_basic", "threads_content_publish"], "expires_at": NOW + 3600});
        let check = TokenValidator::new()
            .evaluate(&PlatformProfile::threads(), &body, NOW)
            .unwrap();
        assert_eq!(
            check,
            TokenCheck::Verified {
                scopes: vec!["threads_basic".to_string(), "threads_content_publish".to_string()],
                expires_at: Some(NOW + 3600),
            }
        );
    }

    #[test]
    fn test_missing_scope_blocks() {
        let err = TokenValidator::new()
            .evaluate(&PlatformProfile::instagram(), &verdict(&["instagram_basic"]), NOW)
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("instagram_content_publish"));
    }

    #[test]
    fn test_invalid_verdict_blocks() {
        let body = json!({"data": {"is_valid": false, "error": {"message": "Session has expired"}}});
        let err = TokenValidator::new()
            .evaluate(&PlatformProfile::instagram(), &body, NOW)
            .unwrap_err();
        assert!(matches!(err, GraphcastError::Auth(_)));
        assert!(err.to_string().contains("Session has expired"));
    }

    #[test]
    fn test_no_verdict_is_unverified() {
        let check = TokenValidator::new()
            .evaluate(&PlatformProfile::instagram(), &json!({"data": {}}), NOW)
            .unwrap();
        assert!(!check.is_verified());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_introspection_fails_open() {
        let mock = MockSender::new();
        mock.on_get("/debug_token", MockReply::Fail(TransportError::Connect("refused".to_string())));

        let client = client(&mock);
        let check = TokenValidator::new().validate(&client).await.unwrap();
        assert!(matches!(check, TokenCheck::Unverified { .. }));
        assert!(client.credentials().unwrap().grant().is_none());
        assert_eq!(mock.call_count(Method::Get, "/debug_token"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_remote_error_fails_open() {
        let mock = MockSender::new();
        mock.on_get(
            "/debug_token",
            MockReply::error(400, json!({"message": "Unsupported get request", "code": 100})),
        );

        let check = TokenValidator::new().validate(&client(&mock)).await.unwrap();
        assert!(!check.is_verified());
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_190_blocks_without_leaking_token() {
        let mock = MockSender::new();
        mock.on_get(
            "/debug_token",
            MockReply::error(400, json!({"message": "Error validating access token", "code": 190})),
        );

        let err = TokenValidator::new().validate(&client(&mock)).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let message = err.to_string();
        assert!(message.contains("expired"));
        assert!(!message.contains("EAAB-token-under-test"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_introspection_sends_token_twice() {
        let mock = MockSender::new();
        mock.on_get(
            "/debug_token",
            MockReply::ok(verdict(&["instagram_basic", "instagram_content_publish"])),
        );

        let client = client(&mock);
        let check = TokenValidator::new().validate(&client).await.unwrap();
        assert!(check.is_verified());

        let credentials = client.credentials().unwrap();
        assert_eq!(
            credentials.granted_scopes(),
            vec!["instagram_basic".to_string(), "instagram_content_publish".to_string()]
        );
        assert_eq!(credentials.expires_at(), None);
        assert!(credentials.grant().is_some());

        let request = &mock.requests()[0].request;
        assert_eq!(request.param("input_token"), Some("EAAB-token-under-test"));
        assert_eq!(request.param("access_token"), Some("EAAB-token-under-test"));
    }
}
