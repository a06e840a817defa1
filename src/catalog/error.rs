//! Error types for catalog search.

use thiserror::Error;

use crate::download::FetchError;

/// Errors that can occur while searching the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The search page could not be fetched.
    #[error("catalog search failed: {0}")]
    Fetch(#[from] FetchError),

    /// The configured catalog base URL is not a valid absolute URL.
    #[error("invalid catalog URL: {url}")]
    InvalidCatalogUrl {
        /// The rejected URL.
        url: String,
    },

    /// The query was empty after trimming.
    #[error("search query is empty")]
    EmptyQuery,
}
