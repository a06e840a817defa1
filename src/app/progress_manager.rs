//! Progress UI for a mirror download.
//!
//! Implements [`DownloadObserver`] on top of one `indicatif` bar: a bytes bar
//! when the server declares a length, a spinner with a byte counter when it
//! does not. Failed mirrors are reported above the bar.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use libgen_core::{DownloadObserver, MirrorFailure, TransferProgress};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} {bytes_per_sec}";

pub(crate) struct ProgressReporter {
    bar: ProgressBar,
    show_notices: bool,
    total_mirrors: AtomicUsize,
}

impl ProgressReporter {
    /// `show_bar` renders the live bar; `show_notices` prints mirror failure
    /// notices even when the bar is hidden.
    pub(crate) fn new(show_bar: bool, show_notices: bool) -> Self {
        let bar = if show_bar {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            show_notices,
            total_mirrors: AtomicUsize::new(0),
        }
    }

    pub(crate) fn clear(&self) {
        self.bar.finish_and_clear();
    }

    fn notice(&self, message: &str) {
        if !self.show_notices {
            return;
        }
        if self.bar.is_hidden() {
            eprintln!("{message}");
        } else {
            self.bar.println(message);
        }
    }
}

impl DownloadObserver for ProgressReporter {
    fn on_attempt(&self, mirror: &str, attempt: usize, total: usize) {
        self.total_mirrors.store(total, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_style(spinner_style());
        self.bar.set_message(format!("Mirror {attempt}/{total} {}", mirror_host(mirror)));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_transfer_start(&self, progress: &TransferProgress) {
        match progress.total {
            Some(total) => {
                self.bar.set_style(bar_style());
                self.bar.set_length(total);
            }
            None => self.bar.set_style(spinner_style()),
        }
        self.bar.set_position(progress.transferred);
    }

    fn on_progress(&self, progress: &TransferProgress, _chunk_len: usize) {
        self.bar.set_position(progress.transferred);
    }

    fn on_transfer_complete(&self, progress: &TransferProgress) {
        self.bar.set_position(progress.transferred);
        self.bar.finish_and_clear();
    }

    fn on_mirror_failed(&self, failure: &MirrorFailure) {
        let total = self.total_mirrors.load(Ordering::Relaxed);
        self.notice(&failure_notice(failure, total));
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn mirror_host(mirror: &str) -> String {
    url::Url::parse(mirror)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| mirror.to_string())
}

pub(crate) fn failure_notice(failure: &MirrorFailure, total: usize) -> String {
    let tail = if failure.attempt < total {
        "trying next mirror"
    } else {
        "no mirrors left"
    };
    format!(
        "Mirror {}/{} failed: {}; {tail}",
        failure.attempt, total, failure.error
    )
}
