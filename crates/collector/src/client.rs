//! Rate-limited GitHub API client
//!
//! Every physical request holds one permit of a shared semaphore. Permits are
//! released before any backoff or rate-limit sleep, so a sleeping request does
//! not block other requests.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::{CollectorConfig, CollectorError, Result};
use backon::{BackoffBuilder, ExponentialBuilder};
use chrono::Utc;
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Added to the rate-limit reset instant before retrying
const RESET_MARGIN_SECS: i64 = 1;

/// Query parameters as ordered key/value pairs
pub type Query = [(String, String)];

/// GitHub API client
#[derive(Clone)]
pub struct GithubClient {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<Semaphore>,
    api_url: String,
}

impl GithubClient {
    /// Create a client backed by reqwest
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a client over any transport
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: &CollectorConfig) -> Self {
        Self {
            transport,
            limiter: Arc::new(Semaphore::new(config.concurrency.max(1))),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Issue one logical request and return the parsed JSON body
    ///
    /// Retries without bound on rate-limit exhaustion (sleeping until the
    /// reset instant) and on 429/502/503/504 or transient transport failures
    /// (exponential backoff, 1s doubling up to 30s). Any other non-2xx status
    /// fails immediately.
    pub async fn request(&self, method: Method, url: &str, query: &Query) -> Result<Value> {
        let request = HttpRequest {
            method,
            url: build_url(url, query)?,
        };
        let mut backoff = ExponentialBuilder::default()
            .with_min_delay(INITIAL_BACKOFF)
            .with_max_delay(MAX_BACKOFF)
            .without_max_times()
            .build();

        loop {
            let outcome = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| CollectorError::LimiterClosed)?;
                self.transport.send(request.clone()).await
            };

            let response = match outcome {
                Ok(response) => response,
                Err(e) if e.is_transient() => {
                    let delay = backoff.next().unwrap_or(MAX_BACKOFF);
                    warn!(
                        url = %request.url,
                        error = %e,
                        delay_secs = delay.as_secs(),
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    return Err(CollectorError::Transport(format!("{}: {}", request.url, e)));
                }
            };

            if response.status.is_success() {
                debug!(
                    url = %request.url,
                    status = response.status.as_u16(),
                    "Request succeeded"
                );
                return parse_body(&request.url, &response.body);
            }

            if let Some(wait) = rate_limit_wait(&response) {
                warn!(
                    url = %request.url,
                    wait_secs = wait.as_secs(),
                    "Rate limit exhausted, sleeping until reset"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if is_retryable(response.status) {
                let delay = backoff.next().unwrap_or(MAX_BACKOFF);
                warn!(
                    url = %request.url,
                    status = response.status.as_u16(),
                    delay_secs = delay.as_secs(),
                    "Retryable status, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(CollectorError::Status {
                status: response.status.as_u16(),
                url: request.url,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
    }
}

fn build_url(url: &str, query: &Query) -> Result<String> {
    let mut parsed = Url::parse(url)
        .map_err(|e| CollectorError::Config(format!("invalid URL {}: {}", url, e)))?;

    if !query.is_empty() {
        parsed
            .query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(parsed.into())
}

fn parse_body(url: &str, body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(body).map_err(|e| CollectorError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Sleep needed before retrying a 403 caused by an exhausted rate limit
fn rate_limit_wait(response: &HttpResponse) -> Option<Duration> {
    if response.status != StatusCode::FORBIDDEN {
        return None;
    }
    if response.header("x-ratelimit-remaining")?.trim() != "0" {
        return None;
    }

    let reset: i64 = response.header("x-ratelimit-reset")?.trim().parse().ok()?;
    let wait = (reset - Utc::now().timestamp() + RESET_MARGIN_SECS).max(0);

    Some(Duration::from_secs(wait as u64))
}
