//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with the configured identity headers
//! - Pacing every attempt through the shared [`RateGate`]
//! - Retrying transient failures through the [`RetryPolicy`]
//! - Error classification

use crate::config::HttpConfig;
use crate::crawler::rate_gate::RateGate;
use crate::crawler::retry::{RetryPolicy, Retryable};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by a single page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request never produced a response (DNS, connect, timeout, ...)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be read
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status of the failure, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || (500..600).contains(status)
            }
            Self::Body { .. } => true,
            Self::InvalidHeader(_) | Self::Client(_) => false,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - User agent and default headers
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use forum_harvest::config::HttpConfig;
/// use forum_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&HttpConfig::default(), Duration::from_secs(20)).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig, timeout: Duration) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(FetchError::Client)
}

/// Rate-gated, retrying page fetcher
///
/// Cloning is cheap; clones share the client and the gate.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    gate: Arc<RateGate>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, gate: Arc<RateGate>, retry: RetryPolicy) -> Self {
        Self {
            client,
            gate,
            retry,
        }
    }

    /// Fetches a page, retrying transient failures
    ///
    /// Every attempt, including retries, passes through the rate gate.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.retry.run(url, || self.fetch_once(url)).await
    }

    /// Performs one gated GET request and returns the body of a 2xx response
    pub async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.gate.wait().await;
        tracing::debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}
