//! Scripted sender for testing
//!
//! `MockSender` answers requests from per-route reply queues and records
//! every request it sees, along with the (tokio) instant it arrived. It is
//! compiled into the library so integration tests and downstream crates can
//! drive a full publish run without network access.
//!
//! A route matches when the method is equal and the request URL ends with the
//! route path. Replies are consumed in order; the last reply of a queue is
//! sticky and keeps being returned, which is what a status endpoint that
//! never finishes looks like.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use super::{HttpRequest, HttpResponse, HttpSend, Method};
use crate::error::TransportError;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Status code and JSON body
    Json(u16, Value),
    /// Status code and raw body
    Text(u16, String),
    /// No HTTP response at all
    Fail(TransportError),
}

impl MockReply {
    /// 200 with a JSON body
    pub fn ok(body: Value) -> Self {
        Self::Json(200, body)
    }

    /// Graph-style `{"error": {...}}` body with the given status
    pub fn error(status: u16, error: Value) -> Self {
        Self::Json(status, serde_json::json!({ "error": error }))
    }
}

/// A request as the mock saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub at: Instant,
}

struct Route {
    method: Method,
    path: String,
    replies: VecDeque<MockReply>,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

/// Scripted [`HttpSend`] implementation. Clones share state.
#[derive(Clone, Default)]
pub struct MockSender {
    state: Arc<Mutex<MockState>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method` requests whose URL ends with `path`
    pub fn on(&self, method: Method, path: &str, reply: MockReply) -> &Self {
        let mut state = self.lock();
        let existing = state
            .routes
            .iter()
            .position(|r| r.method == method && r.path == path);
        match existing {
            Some(index) => state.routes[index].replies.push_back(reply),
            None => state.routes.push(Route {
                method,
                path: path.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
        drop(state);
        self
    }

    pub fn on_get(&self, path: &str, reply: MockReply) -> &Self {
        self.on(Method::Get, path, reply)
    }

    pub fn on_post(&self, path: &str, reply: MockReply) -> &Self {
        self.on(Method::Post, path, reply)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Requests that matched `method` and ended with `path`
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.request.method == method && r.request.url.ends_with(path))
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HttpSend for MockSender {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                request: request.clone(),
                at: Instant::now(),
            });

            state
                .routes
                .iter_mut()
                .find(|r| r.method == request.method && request.url.ends_with(&r.path))
                .and_then(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    }
                })
        };

        match reply {
            Some(MockReply::Json(status, body)) => Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            Some(MockReply::Text(status, body)) => Ok(HttpResponse { status, body }),
            Some(MockReply::Fail(error)) => Err(error),
            None => Err(TransportError::Connect(format!(
                "no mock route for {} {}",
                request.method,
                request.endpoint()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn get(url: &str) -> HttpRequest {
        HttpRequest::get(url, vec![], Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_replies_in_order_then_sticky() {
        let mock = MockSender::new();
        mock.on_get("/C1", MockReply::ok(json!({"n": 1})))
            .on_get("/C1", MockReply::ok(json!({"n": 2})));

        let first = mock.send(&get("https://g/v1/C1")).await.unwrap();
        let second = mock.send(&get("https://g/v1/C1")).await.unwrap();
        let third = mock.send(&get("https://g/v1/C1")).await.unwrap();

        assert_eq!(first.json().unwrap()["n"], 1);
        assert_eq!(second.json().unwrap()["n"], 2);
        assert_eq!(third.json().unwrap()["n"], 2);
        assert_eq!(mock.call_count(Method::Get, "/C1"), 3);
    }

    #[tokio::test]
    async fn test_unmatched_route_is_connect_error() {
        let mock = MockSender::new();
        let result = mock.send(&get("https://g/v1/nowhere")).await;

        match result {
            Err(TransportError::Connect(message)) => assert!(message.contains("nowhere")),
            other => panic!("Expected connect error, got {:?}", other),
        }
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_method_must_match() {
        let mock = MockSender::new();
        mock.on_post("/media", MockReply::ok(json!({"id": "C1"})));

        assert!(mock.send(&get("https://g/v1/1/media")).await.is_err());
        assert_eq!(mock.call_count(Method::Post, "/media"), 0);
    }

    #[tokio::test]
    async fn test_suffix_does_not_confuse_publish_edge() {
        let mock = MockSender::new();
        mock.on_post("/media", MockReply::ok(json!({"id": "C1"})))
            .on_post("/media_publish", MockReply::ok(json!({"id": "M1"})));

        let publish = HttpRequest::post("https://g/v1/1/media_publish", vec![], Duration::from_secs(1));
        let response = mock.send(&publish).await.unwrap();
        assert_eq!(response.json().unwrap()["id"], "M1");
    }

    #[tokio::test]
    async fn test_scripted_failure_and_error_helpers() {
        let mock = MockSender::new();
        mock.on_get("/a", MockReply::Fail(TransportError::Timeout("slow".to_string())))
            .on_get("/b", MockReply::error(400, json!({"message": "bad", "code": 100})))
            .on_get("/c", MockReply::Text(502, "Bad Gateway".to_string()));

        assert!(matches!(
            mock.send(&get("https://g/a")).await,
            Err(TransportError::Timeout(_))
        ));

        let b = mock.send(&get("https://g/b")).await.unwrap();
        assert_eq!(b.status, 400);
        assert_eq!(b.json().unwrap()["error"]["code"], 100);

        let c = mock.send(&get("https://g/c")).await.unwrap();
        assert_eq!(c.body, "Bad Gateway");
    }
}
