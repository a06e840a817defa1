//! Constants for the download module (timeouts, chunking).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default stall timeout between body reads (5 minutes for slow mirrors).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default total timeout for landing page and search requests.
pub const PAGE_TIMEOUT_SECS: u64 = 30;

/// Size of the slices written to disk and reported to observers.
pub const CHUNK_SIZE: usize = 1024;
