//! Mirror download pipeline: HTTP client, fallback loop, progress reporting.
//!
//! # Features
//!
//! - Strictly sequential mirror fallback (first complete transfer wins)
//! - Streaming downloads in [`CHUNK_SIZE`] slices (memory use independent of file size)
//! - Temp-file-then-rename writes, so a failed transfer never clobbers the destination
//! - Configurable timeouts (30s connect, 5min stall, 30s per page by default)
//! - Structured per-mirror errors collected into one aggregate failure

mod client;
mod constants;
mod error;
mod fallback;
mod filename;
mod progress;

pub use client::{HttpClient, HttpTimeouts};
pub use constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, PAGE_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::{DownloadError, FetchError, MirrorError, MirrorFailure};
pub use fallback::{DownloadOptions, DownloadOutcome, MirrorDownloader};
pub use filename::{DEFAULT_EXTENSION, book_filename, sanitize_filename};
pub use progress::{DownloadObserver, NoopObserver, TransferProgress};
