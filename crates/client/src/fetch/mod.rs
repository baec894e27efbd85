//! Network capability and the reqwest-backed fetch client.
//!
//! ### Semantics
//! - `Network::fetch` resolves with any HTTP status, like a browser `fetch`;
//!   it fails only when no response arrived (connect error, timeout, oversize body).
//! - Responses whose final URL is same-origin with the configured origin are
//!   `basic`; everything else is `cors`.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Per-request timeout from configuration

pub mod url;

use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, same_origin};

use stash_core::{AppConfig, ConfigError, Error, Request, Response, ResponseType};

/// Something that can turn a request into a response over the network.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Issue the request. Non-2xx statuses are returned as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin used to classify responses as same-origin
    pub origin: ::url::Url,

    /// User agent string (default: "stash/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Derive fetch settings from the application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.network_timeout(),
            max_redirects: 5,
        })
    }
}

/// HTTP client implementing [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
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

        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let response = self
            .http
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::NetworkFailure(format!("timed out fetching {}", request.url))
                } else {
                    Error::NetworkFailure(format!("network error: {e}"))
                }
            })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::NetworkFailure(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::NetworkFailure(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let response_type =
            if same_origin(&final_url, &self.config.origin) { ResponseType::Basic } else { ResponseType::Cors };

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response { status: status.as_u16(), headers, body: bytes, response_type })
    }
}
