//! Outbound network access.
//!
//! The strategies talk to the network through the `HttpBackend` trait so
//! tests can substitute a canned backend. The real implementation is a
//! thin reqwest client: any HTTP status comes back as `Ok`, and only
//! transport-level failures (refused, timed out, TLS) are errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use satchel_core::Error;
use url::Url;

/// Configuration for the network backend.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "satchel/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "satchel/0.1".to_string(), timeout: Duration::from_millis(20_000), max_redirects: 5 }
    }
}

/// A fetched response: status, headers, body.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network seam for the strategy executors.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Fetch a URL.
    ///
    /// Returns `Ok` for any HTTP status; `Err(NetworkFailure)` only for
    /// transport-level failures.
    async fn fetch(&self, url: &Url) -> Result<BackendResponse, Error>;
}

/// reqwest-backed HTTP client.
pub struct ReqwestBackend {
    http: Client,
}

impl ReqwestBackend {
    /// Build a client with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn fetch(&self, url: &Url) -> Result<BackendResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("fetch {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).to_string()))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read body of {url}: {e}")))?;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(BackendResponse { status, headers, body })
    }
}
