//! HTTP plumbing for Graph-style endpoints
//!
//! Every remote call goes through the [`HttpSend`] trait so the retry policy,
//! the container poller and the publish client can be exercised against a
//! scripted sender ([`mock::MockSender`]) as easily as against the real
//! `reqwest` client ([`http::ReqwestSender`]).
//!
//! [`retry::RetryingTransport`] sits on top and owns failure classification
//! and backoff.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::credentials::mask_token;
use crate::error::TransportError;

pub mod http;
pub mod mock;
pub mod retry;

/// Parameters whose values are secrets and never appear in logs
const SECRET_PARAMS: [&str; 2] = ["access_token", "input_token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A single outgoing call. GET parameters travel in the query string, POST
/// parameters as a form body.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, params: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, params: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            params,
            timeout,
        }
    }

    /// Value of the first parameter named `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Last path segment, which is all that gets logged (`media`,
    /// `media_publish`, a container id, ...). The account id stays out of logs.
    pub fn endpoint(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<(&str, String)> = self
            .params
            .iter()
            .map(|(k, v)| {
                if SECRET_PARAMS.contains(&k.as_str()) {
                    (k.as_str(), mask_token(v))
                } else {
                    (k.as_str(), v.clone())
                }
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint())
            .field("params", &params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Raw answer from the remote side
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value, TransportError> {
        serde_json::from_str(&self.body)
            .map_err(|e| TransportError::Decode(format!("HTTP {}: {}", self.status, e)))
    }

    /// Parse the body as JSON, falling back to the raw text for error pages
    pub fn json_or_text(&self) -> Value {
        self.json().unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

/// One HTTP exchange
#[async_trait]
pub trait HttpSend: Send + Sync {
    /// Send the request and return whatever the server answered.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when no HTTP response was obtained
    /// (timeout, connection failure). Non-2xx responses are `Ok`.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
