//! Transfer progress counters and the observer interface.
//!
//! The downloader never prints. It reports attempts, byte counts and
//! per-mirror failures to a [`DownloadObserver`]; the CLI renders them as
//! a progress bar and warnings.

use super::error::MirrorFailure;

/// Byte counters for one binary transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes written so far.
    pub transferred: u64,
    /// Declared content length, when the server sent one.
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Starts a new transfer with the given expected size.
    #[must_use]
    pub fn new(total: Option<u64>) -> Self {
        Self {
            transferred: 0,
            total,
        }
    }

    /// Records `len` more bytes.
    pub fn advance(&mut self, len: usize) {
        self.transferred = self.transferred.saturating_add(len as u64);
    }
}

/// Receives download lifecycle events. Every method defaults to a no-op.
pub trait DownloadObserver: Send + Sync {
    /// A mirror attempt is starting. `attempt` is 1-based.
    fn on_attempt(&self, _mirror: &str, _attempt: usize, _total: usize) {}

    /// The binary response arrived and streaming is about to begin.
    fn on_transfer_start(&self, _progress: &TransferProgress) {}

    /// One chunk of `chunk_len` bytes was written.
    fn on_progress(&self, _progress: &TransferProgress, _chunk_len: usize) {}

    /// The transfer finished and the file is in place.
    fn on_transfer_complete(&self, _progress: &TransferProgress) {}

    /// A mirror attempt failed; the downloader moves on to the next one.
    fn on_mirror_failed(&self, _failure: &MirrorFailure) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}
