//! HTTP client wrapper shared by catalog search and mirror downloads.
//!
//! One [`HttpClient`] owns one connection pool for the whole run. Landing
//! pages and search pages are fetched with a bounded total timeout; binary
//! downloads only carry the stall timeout so large files are not cut off.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PAGE_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::FetchError;
use crate::user_agent;

/// Timeout settings for [`HttpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Maximum gap between two body reads.
    pub read: Duration,
    /// Total timeout for HTML page requests.
    pub page: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(READ_TIMEOUT_SECS),
            page: Duration::from_secs(PAGE_TIMEOUT_SECS),
        }
    }
}

/// HTTP client for fetching pages and streaming binaries.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    page_timeout: Duration,
}

impl HttpClient {
    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend or system
    /// configuration prevents building a client.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            page_timeout: timeouts.page,
        })
    }

    /// Fetches an HTML page and returns its body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, network failure, timeout or
    /// non-success status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send_get(url, Some(self.page_timeout)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }

    /// Starts a streaming GET; the caller reads the body incrementally.
    ///
    /// Only the connect and stall timeouts apply, so long transfers are not
    /// bounded in total.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, network failure, timeout or
    /// non-success status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_stream(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.send_get(url, None).await
    }

    async fn send_get(
        &self,
        url: &str,
        total_timeout: Option<Duration>,
    ) -> Result<reqwest::Response, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let mut request = self.client.get(parsed);
        if let Some(timeout) = total_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success status");
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }
}
