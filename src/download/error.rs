//! Error types for the download module.
//!
//! Three layers:
//! - [`FetchError`] - one HTTP request failed
//! - [`MirrorError`] - one mirror attempt failed (recovered by the fallback loop)
//! - [`DownloadError`] - the whole download failed (surfaces to the caller)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::resolver::ResolveError;

/// Errors from a single HTTP request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Classifies a reqwest error as timeout or generic network failure.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Why one mirror attempt failed. The fallback loop logs these and moves on.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The landing page could not be fetched.
    #[error("landing page unavailable at {mirror}: {source}")]
    LandingPageFetch {
        /// The mirror (landing page) URL.
        mirror: String,
        /// The request failure.
        #[source]
        source: FetchError,
    },

    /// The landing page was fetched but carried no download link.
    #[error("no download link on landing page {mirror}: {source}")]
    NotFound {
        /// The mirror (landing page) URL.
        mirror: String,
        /// The resolver failure.
        #[source]
        source: ResolveError,
    },

    /// The resolved binary URL could not be fetched or its body broke off.
    #[error("binary download failed from {url}: {source}")]
    BinaryFetch {
        /// The resolved binary URL.
        url: String,
        /// The request failure.
        #[source]
        source: FetchError,
    },

    /// Writing the downloaded bytes to disk failed.
    #[error("IO error writing to {path}: {source}")]
    Write {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The whole attempt exceeded the per-mirror deadline.
    #[error("mirror {mirror} did not finish within {after:?}")]
    TimedOut {
        /// The mirror (landing page) URL.
        mirror: String,
        /// The configured deadline.
        after: Duration,
    },
}

impl MirrorError {
    /// Creates a landing page fetch error.
    pub fn landing_page(mirror: impl Into<String>, source: FetchError) -> Self {
        Self::LandingPageFetch {
            mirror: mirror.into(),
            source,
        }
    }

    /// Creates a missing-link error.
    pub fn not_found(mirror: impl Into<String>, source: ResolveError) -> Self {
        Self::NotFound {
            mirror: mirror.into(),
            source,
        }
    }

    /// Creates a binary fetch error.
    pub fn binary(url: impl Into<String>, source: FetchError) -> Self {
        Self::BinaryFetch {
            url: url.into(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Short stable label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LandingPageFetch { .. } => "landing_page_fetch",
            Self::NotFound { .. } => "not_found",
            Self::BinaryFetch { .. } => "binary_fetch",
            Self::Write { .. } => "write",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// One failed mirror attempt, kept for the aggregate error.
#[derive(Debug)]
pub struct MirrorFailure {
    /// The mirror (landing page) URL that was attempted.
    pub mirror: String,
    /// 1-based position of the attempt.
    pub attempt: usize,
    /// Why the attempt failed.
    pub error: MirrorError,
}

/// Errors returned by [`MirrorDownloader::download`](super::MirrorDownloader::download).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every mirror in the list failed (or the list was empty).
    #[error("all {} mirror(s) failed{}", .failures.len(), last_failure_suffix(.failures))]
    AllMirrorsFailed {
        /// Failures in attempt order.
        failures: Vec<MirrorFailure>,
    },

    /// The destination path has no file name component.
    #[error("invalid download destination: {path}")]
    InvalidDestination {
        /// The rejected path.
        path: PathBuf,
    },
}

impl DownloadError {
    /// Returns the per-mirror failures, empty for non-aggregate errors.
    #[must_use]
    pub fn failures(&self) -> &[MirrorFailure] {
        match self {
            Self::AllMirrorsFailed { failures } => failures,
            Self::InvalidDestination { .. } => &[],
        }
    }
}

fn last_failure_suffix(failures: &[MirrorFailure]) -> String {
    failures
        .last()
        .map(|failure| format!("; last error: {}", failure.error))
        .unwrap_or_default()
}
