use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

/// Statuses a CDN may clear on its own: server errors, throttling and request timeouts.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT)
}

/// Timeouts and connection failures; malformed requests or bodies are final.
pub fn is_transient_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Retry schedule for one image download. A failed image never fails the
/// record, so the schedule stays short.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// Pause before retry number `retry` (0-based), or `None` once retries are spent.
    pub fn retry_delay(&self, retry: usize) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let doubled = u32::try_from(retry)
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        Some(doubled.min(self.max_delay))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Anything that can hand back the bytes behind a media URL.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_media(&self, url: &str) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            backoff: config.backoff,
        })
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", url);
        self.fetch_with_retries(url).instrument(span).await
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let mut retry = 0usize;
        loop {
            let failure = match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Self::read_body(resp).await,
                Ok(resp) => {
                    let status = resp.status();
                    let error = FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: resp.url().to_string(),
                    };
                    (is_transient_status(status), error)
                }
                Err(err) => (is_transient_transport(&err), FetchError::Request(err)),
            };

            let (transient, error) = failure;
            match self.backoff.retry_delay(retry).filter(|_| transient) {
                Some(delay) => {
                    debug!(retry, ?delay, error = %error, "media fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                None => return Err(error),
            }
        }
    }

    async fn read_body(resp: reqwest::Response) -> Result<FetchedResponse, FetchError> {
        let status = resp.status();
        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?.to_vec();
        Ok(FetchedResponse {
            status,
            final_url,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl MediaSource for HttpFetcher {
    async fn fetch_media(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        self.fetch_bytes(url).await
    }
}

/// In-memory media keyed by URL, for offline runs and tests.
/// Unknown URLs answer with a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticMediaSource {
    items: HashMap<String, Vec<u8>>,
}

impl StaticMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.items.insert(url.into(), bytes);
        self
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    async fn fetch_media(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        match self.items.get(url) {
            Some(body) => Ok(FetchedResponse {
                status: StatusCode::OK,
                final_url: url.to_string(),
                content_type: None,
                body: body.clone(),
            }),
            None => Err(FetchError::HttpStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}
