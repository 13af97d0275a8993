//! HTTP transport boundary
//!
//! The client talks to the network only through [`HttpTransport`], so tests can
//! swap in an in-memory transport.

use crate::{CollectorConfig, CollectorError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;

/// One physical request; `url` already carries its query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are retried like 5xx responses
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Transport backed by reqwest, carrying the API headers on every request
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| CollectorError::Config(format!("user agent: {}", e)))?,
        );

        if let Some(ref token) = config.github_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CollectorError::Config(format!("token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectorError::Config(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(request.method, &request.url)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
pub use mock::{json_response, MockTransport, RecordedRequest};


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut response = json_response(403, json!({}));
        response
            .headers
            .insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert_eq!(response.header("X-RateLimit-Remaining"), Some("0"));
        assert_eq!(response.header("x-ratelimit-reset"), None);
    }

    #[test]
    fn only_timeouts_and_connect_failures_are_transient() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("c".into()).is_transient());
        assert!(!TransportError::Other("o".into()).is_transient());
    }

    #[test]
    fn reqwest_transport_rejects_invalid_token() {
        let config = CollectorConfig {
            github_token: Some("bad\ntoken".to_string()),
            ..CollectorConfig::default()
        };
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(CollectorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn mock_replies_in_order_and_records_requests() {
        let transport = MockTransport::new();
        let url = "https://api.test/a";
        transport.push_json(url, 200, json!([1]));
        transport.push_json(url, 404, json!({}));

        let request = HttpRequest {
            method: Method::GET,
            url: url.to_string(),
        };
        let first = transport.send(request.clone()).await.unwrap();
        let second = transport.send(request.clone()).await.unwrap();
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(second.status, StatusCode::NOT_FOUND);
        assert!(transport.send(request).await.is_err());
        assert_eq!(transport.request_count(url), 3);
    }
}
