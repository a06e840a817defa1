//! Error types for landing page resolution.

use thiserror::Error;

/// Errors that can occur while extracting a download link from a landing page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The page has no link with the expected label.
    ///
    /// Usually means the mirror changed its markup or served an error or
    /// CAPTCHA page instead of the landing page.
    #[error("no link labelled '{label}' found on landing page")]
    NotFound {
        /// The exact link label that was searched for.
        label: String,
    },
}

impl ResolveError {
    /// Creates a `NotFound` error for the given link label.
    #[must_use]
    pub fn not_found(label: impl Into<String>) -> Self {
        Self::NotFound {
            label: label.into(),
        }
    }
}
