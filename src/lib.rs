//! Libgen Core Library
//!
//! This library provides the core functionality for the `libgen` tool,
//! which searches the Library Genesis catalog and downloads the chosen
//! book through an ordered list of mirrors.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Search request building and result-table extraction
//! - [`config`] - `config.json` loading, defaults and validation
//! - [`download`] - HTTP client, mirror fallback downloader, progress reporting
//! - [`resolver`] - Landing page parsing (finds the `GET` link)

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod resolver;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use catalog::{BookRecord, CatalogClient, CatalogError, SearchColumn, parse_search_results};
pub use config::{AppConfig, ConfigError, StyleConfig, expand_home, resolve_default_config_path};
pub use download::{
    CHUNK_SIZE, DownloadError, DownloadObserver, DownloadOptions, DownloadOutcome, FetchError,
    HttpClient, HttpTimeouts, MirrorDownloader, MirrorError, MirrorFailure, NoopObserver,
    TransferProgress, book_filename, sanitize_filename,
};
pub use resolver::{GetLinkResolver, LinkResolver, ResolveError, resolve_download_link};
