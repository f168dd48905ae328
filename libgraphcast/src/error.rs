//! Error types for Graphcast

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphcastError>;

#[derive(Error, Debug)]
pub enum GraphcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Remote API error: {0}")]
    RemoteApi(#[from] RemoteApiError),

    #[error("Container {container_id} was not ready after {waited_secs}s")]
    ContainerTimeout {
        container_id: String,
        waited_secs: u64,
    },

    #[error("Container {container_id} ended in {state}: {message}")]
    ContainerTerminal {
        container_id: String,
        state: String,
        message: String,
    },

    #[error("Carousel image {} could not be staged: {source}", .index + 1)]
    CarouselChild {
        index: usize,
        source: Box<GraphcastError>,
    },
}

impl GraphcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GraphcastError::Validation(_) => 3,
            GraphcastError::Auth(_) => 2,
            GraphcastError::CarouselChild { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    /// The remote error behind this failure, if the platform answered with one
    pub fn remote(&self) -> Option<&RemoteApiError> {
        match self {
            GraphcastError::RemoteApi(e) => Some(e),
            GraphcastError::CarouselChild { source, .. } => source.remote(),
            _ => None,
        }
    }

    /// Short user-facing summary plus technical detail
    pub fn diagnostic(&self) -> Diagnostic {
        let message = match self {
            GraphcastError::Config(_) => "Publishing is not configured".to_string(),
            GraphcastError::Auth(_) => "The access token was rejected".to_string(),
            GraphcastError::Validation(msg) => msg.clone(),
            GraphcastError::Transport(_) => "Could not reach the platform".to_string(),
            GraphcastError::RemoteApi(e) => e
                .user_title
                .clone()
                .unwrap_or_else(|| "The platform rejected the request".to_string()),
            GraphcastError::ContainerTimeout { .. } => {
                "The platform is still processing the media".to_string()
            }
            GraphcastError::ContainerTerminal { .. } => {
                "The platform could not process the media".to_string()
            }
            GraphcastError::CarouselChild { index, .. } => {
                format!("Carousel image {} could not be staged", index + 1)
            }
        };

        let remote = self.remote();
        Diagnostic {
            message,
            detail: Some(self.to_string()),
            code: remote.and_then(|e| e.code),
            subcode: remote.and_then(|e| e.subcode),
            trace_id: remote.and_then(|e| e.trace_id.clone()),
            user_message: remote.and_then(|e| e.user_message.clone()),
            hint: remote.and_then(|e| e.hint.clone()),
        }
    }
}

/// What a UI shows for a failed run: `message` by default, `detail` on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub detail: Option<String>,
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub trace_id: Option<String>,
    /// The platform's own explanation (`error_user_msg`)
    pub user_message: Option<String>,
    pub hint: Option<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("{platform} is missing {what}")]
    MissingCredentials { platform: String, what: String },

    #[error("{0} is disabled in the configuration")]
    PlatformDisabled(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unreadable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth another attempt; a body we
    /// cannot decode is not going to change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Decode(_))
    }
}

/// Structured failure reported by the platform in its `error` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteApiError {
    pub http_status: u16,
    pub message: String,
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub error_type: Option<String>,
    pub is_transient: Option<bool>,
    pub trace_id: Option<String>,
    pub user_title: Option<String>,
    pub user_message: Option<String>,
    pub hint: Option<String>,
}

impl RemoteApiError {
    /// Build from an HTTP status and a Graph-style body:
    /// `{"error": {"message", "type", "code", "error_subcode", "is_transient",
    /// "fbtrace_id", "error_user_title", "error_user_msg"}}`
    pub fn from_body(http_status: u16, body: &Value) -> Self {
        let err = body.get("error").unwrap_or(&Value::Null);
        let text = |key: &str| err.get(key).and_then(Value::as_str).map(str::to_string);

        let message = text("message")
            .or_else(|| body.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", http_status));

        Self {
            http_status,
            message,
            code: err.get("code").and_then(Value::as_i64),
            subcode: err.get("error_subcode").and_then(Value::as_i64),
            error_type: text("type"),
            is_transient: err.get("is_transient").and_then(Value::as_bool),
            trace_id: text("fbtrace_id"),
            user_title: text("error_user_title"),
            user_message: text("error_user_msg"),
            hint: None,
        }
    }
}

impl std::fmt::Display for RemoteApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (HTTP {}", self.message, self.http_status)?;
        if let Some(code) = self.code {
            write!(f, ", code {}", code)?;
        }
        if let Some(subcode) = self.subcode {
            write!(f, ", subcode {}", subcode)?;
        }
        if let Some(trace) = &self.trace_id {
            write!(f, ", trace {}", trace)?;
        }
        write!(f, ")")?;
        if let Some(hint) = &self.hint {
            write!(f, ". Suggestion: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exit_code_validation() {
        let error = GraphcastError::Validation("No images".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_auth() {
        let error = GraphcastError::Auth("Token is not valid".to_string());
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let transport = GraphcastError::Transport(TransportError::Timeout("60s".to_string()));
        assert_eq!(transport.exit_code(), 1);

        let config = GraphcastError::Config(ConfigError::MissingField("account_id".to_string()));
        assert_eq!(config.exit_code(), 1);

        let timeout = GraphcastError::ContainerTimeout {
            container_id: "C1".to_string(),
            waited_secs: 300,
        };
        assert_eq!(timeout.exit_code(), 1);
    }

    #[test]
    fn test_carousel_child_delegates_exit_code() {
        let error = GraphcastError::CarouselChild {
            index: 1,
            source: Box::new(GraphcastError::Auth("expired".to_string())),
        };
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_carousel_child_message_is_one_based() {
        let error = GraphcastError::CarouselChild {
            index: 2,
            source: Box::new(GraphcastError::RemoteApi(RemoteApiError {
                http_status: 400,
                message: "Bad image".to_string(),
                ..Default::default()
            })),
        };
        let message = error.to_string();
        assert!(message.starts_with("Carousel image 3 could not be staged"));
        assert!(message.contains("Bad image"));
    }

    #[test]
    fn test_remote_error_from_graph_body() {
        let body = json!({
            "error": {
                "message": "Media download has failed.",
                "type": "OAuthException",
                "code": 9004,
                "error_subcode": 2207052,
                "is_transient": false,
                "error_user_title": "Media download failed",
                "error_user_msg": "The media could not be fetched from the URI.",
                "fbtrace_id": "AbC123"
            }
        });

        let error = RemoteApiError::from_body(400, &body);
        assert_eq!(error.http_status, 400);
        assert_eq!(error.message, "Media download has failed.");
        assert_eq!(error.code, Some(9004));
        assert_eq!(error.subcode, Some(2207052));
        assert_eq!(error.error_type.as_deref(), Some("OAuthException"));
        assert_eq!(error.is_transient, Some(false));
        assert_eq!(error.trace_id.as_deref(), Some("AbC123"));
        assert_eq!(error.user_title.as_deref(), Some("Media download failed"));
        assert_eq!(
            error.user_message.as_deref(),
            Some("The media could not be fetched from the URI.")
        );
        assert!(error.hint.is_none());
    }

    #[test]
    fn test_remote_error_without_error_object() {
        let error = RemoteApiError::from_body(502, &Value::Null);
        assert_eq!(error.message, "HTTP 502");
        assert_eq!(error.code, None);

        let error = RemoteApiError::from_body(500, &json!("upstream exploded"));
        assert_eq!(error.message, "upstream exploded");
    }

    #[test]
    fn test_remote_error_display_includes_codes_and_hint() {
        let error = RemoteApiError {
            http_status: 400,
            message: "Invalid parameter".to_string(),
            code: Some(100),
            subcode: Some(2207004),
            trace_id: Some("T1".to_string()),
            hint: Some("Resize the image".to_string()),
            ..Default::default()
        };

        let message = error.to_string();
        assert_eq!(
            message,
            "Invalid parameter (HTTP 400, code 100, subcode 2207004, trace T1). Suggestion: Resize the image"
        );
    }

    #[test]
    fn test_transport_error_retryability() {
        assert!(TransportError::Timeout("x".to_string()).is_retryable());
        assert!(TransportError::Connect("x".to_string()).is_retryable());
        assert!(TransportError::Request("x".to_string()).is_retryable());
        assert!(!TransportError::Decode("x".to_string()).is_retryable());
    }

    #[test]
    fn test_diagnostic_for_remote_error() {
        let error = GraphcastError::RemoteApi(RemoteApiError {
            http_status: 400,
            message: "Only photo or video can be accepted as media type.".to_string(),
            code: Some(9004),
            subcode: Some(2207005),
            trace_id: Some("T9".to_string()),
            hint: Some("Convert the image to JPEG".to_string()),
            ..Default::default()
        });

        let diagnostic = error.diagnostic();
        assert_eq!(diagnostic.message, "The platform rejected the request");
        assert_eq!(diagnostic.code, Some(9004));
        assert_eq!(diagnostic.subcode, Some(2207005));
        assert_eq!(diagnostic.trace_id.as_deref(), Some("T9"));
        assert_eq!(diagnostic.hint.as_deref(), Some("Convert the image to JPEG"));
        assert!(diagnostic.detail.unwrap().contains("2207005"));
    }

    #[test]
    fn test_diagnostic_for_validation_keeps_message() {
        let error = GraphcastError::Validation("At most 10 images".to_string());
        let diagnostic = error.diagnostic();
        assert_eq!(diagnostic.message, "At most 10 images");
        assert!(diagnostic.hint.is_none());
    }

    #[test]
    fn test_diagnostic_reaches_through_carousel_child() {
        let error = GraphcastError::CarouselChild {
            index: 0,
            source: Box::new(GraphcastError::RemoteApi(RemoteApiError {
                http_status: 400,
                message: "x".to_string(),
                subcode: Some(2207052),
                hint: Some("Check the URL".to_string()),
                ..Default::default()
            })),
        };
        let diagnostic = error.diagnostic();
        assert_eq!(diagnostic.message, "Carousel image 1 could not be staged");
        assert_eq!(diagnostic.subcode, Some(2207052));
        assert_eq!(diagnostic.hint.as_deref(), Some("Check the URL"));
    }

    #[test]
    fn test_config_error_formatting() {
        let error = ConfigError::MissingCredentials {
            platform: "instagram".to_string(),
            what: "an access token".to_string(),
        };
        assert_eq!(error.to_string(), "instagram is missing an access token");

        let wrapped: GraphcastError = error.into();
        assert!(wrapped.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_error_conversion_from_transport_error() {
        let error: GraphcastError = TransportError::Connect("refused".to_string()).into();
        match error {
            GraphcastError::Transport(TransportError::Connect(_)) => {}
            _ => panic!("Expected GraphcastError::Transport"),
        }
    }
}
