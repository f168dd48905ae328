//! `reqwest`-backed sender used in production

use async_trait::async_trait;
use reqwest::Client;

use super::{HttpRequest, HttpResponse, HttpSend, Method};
use crate::error::TransportError;

/// Sends requests with a shared `reqwest::Client` (connection pool included).
#[derive(Clone, Default)]
pub struct ReqwestSender {
    client: Client,
}

impl ReqwestSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url).query(&request.params),
            Method::Post => self.client.post(&request.url).form(&request.params),
        };

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

/// Map a reqwest failure, dropping the URL so query-string tokens never reach
/// an error message.
fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    let is_timeout = error.is_timeout();
    let is_connect = error.is_connect();
    let message = error.without_url().to_string();

    if is_timeout {
        TransportError::Timeout(message)
    } else if is_connect {
        TransportError::Connect(message)
    } else {
        TransportError::Request(message)
    }
}
