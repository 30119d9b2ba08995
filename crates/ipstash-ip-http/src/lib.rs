// # HTTP IP Resolver
//
// This crate provides the HTTP-based IP resolver for ipstash.
//
// ## Wire Contract
//
// A plain `GET` with no extra headers. The response body is the entire
// value: no JSON, no envelope. After trimming surrounding whitespace it
// must be an IPv4 or IPv6 literal. Services known to behave this way:
// `https://api.ipify.org`, `https://ifconfig.me/ip`, `https://icanhazip.com`.
//
// ## Failure Mapping
//
// - Connect/timeout/body-read errors and non-2xx statuses → `FetchFailed`
// - A body that is not an IP literal → `InvalidIpFormat` with the raw body

use async_trait::async_trait;
use ipstash_core::{Error, IpAddress, IpResolver, Result};
use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP-based IP resolver
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client (carries the request timeout)
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver with the default timeout
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a resolver with an explicit timeout for the whole request
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// The endpoint this resolver queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw body
    ///
    /// The response is consumed by `text()` or dropped on the error path, so
    /// the connection goes back to the pool either way.
    async fn fetch_body(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::fetch_failed(&self.url, format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_failed(&self.url, format!("HTTP error: {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| Error::fetch_failed(&self.url, format!("Failed to read response: {e}")))
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<IpAddress> {
        let body = self.fetch_body().await?;
        let ip = IpAddress::parse(&body)?;
        tracing::debug!("Fetched IP {} from {}", ip, self.url);
        Ok(ip)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}
