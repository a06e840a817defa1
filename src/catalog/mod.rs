//! Library Genesis catalog search.
//!
//! Builds the `search.php` request for a query and column, fetches the page
//! through the shared [`HttpClient`], and extracts [`BookRecord`]s from the
//! results table.

mod error;
mod parse;

pub use error::CatalogError;
pub use parse::parse_search_results;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::HttpClient;

/// Catalog column the query is matched against.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchColumn {
    /// Book title (catalog default).
    #[default]
    Title,
    /// Author name(s).
    Author,
    /// Publisher name.
    Publisher,
    /// Publication year.
    Year,
}

impl SearchColumn {
    /// Returns the value sent as the `column` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Publisher => "publisher",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for SearchColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchColumn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            "publisher" => Ok(Self::Publisher),
            "year" => Ok(Self::Year),
            other => Err(format!(
                "unknown search column '{other}'; expected one of: title, author, publisher, year"
            )),
        }
    }
}

/// One row of the search results table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Title text (may include ISBN/series annotations from the listing).
    pub title: String,
    /// Author(s) as listed.
    pub author: String,
    /// Publisher as listed.
    pub publisher: String,
    /// Publication year; `None` when absent or not numeric.
    pub year: Option<u32>,
    /// Page count as listed.
    pub pages: String,
    /// Language as listed.
    pub language: String,
    /// Human-readable size (e.g. `5 Mb`).
    pub size: String,
    /// File extension (e.g. `pdf`, `epub`).
    pub extension: String,
    /// Mirror landing page URLs in priority order, without duplicates.
    pub mirrors: Vec<String>,
}

/// Client for the catalog's search page.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: HttpClient,
    base_url: Url,
}

impl CatalogClient {
    /// Creates a catalog client for `base_url` (e.g. `http://libgen.rs`).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidCatalogUrl`] if `base_url` is not an
    /// absolute http(s) URL.
    pub fn new(client: HttpClient, base_url: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidCatalogUrl {
            url: base_url.to_string(),
        };
        let parsed = Url::parse(base_url).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(invalid());
        }
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Returns the search page URL for `query` in `column`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidCatalogUrl`] if the base URL cannot be
    /// joined with `search.php`.
    pub fn search_url(&self, query: &str, column: SearchColumn) -> Result<Url, CatalogError> {
        let mut url = self
            .base_url
            .join("search.php")
            .map_err(|_| CatalogError::InvalidCatalogUrl {
                url: self.base_url.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("req", query)
            .append_pair("column", column.as_str());
        Ok(url)
    }

    /// Searches the catalog and returns matching records in listing order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyQuery`] for a blank query, or
    /// [`CatalogError::Fetch`] if the search page cannot be fetched.
    #[instrument(skip(self), fields(column = %column))]
    pub async fn search(
        &self,
        query: &str,
        column: SearchColumn,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::EmptyQuery);
        }

        let url = self.search_url(query, column)?;
        debug!(url = %url, "searching catalog");
        let html = self.client.get_text(url.as_str()).await?;
        let books = parse_search_results(&html, &self.base_url);
        info!(results = books.len(), "catalog search complete");
        Ok(books)
    }
}
