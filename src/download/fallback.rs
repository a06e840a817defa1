//! Mirror fallback downloader.
//!
//! Tries an ordered list of mirror landing pages one at a time. For each
//! mirror it fetches the landing page, resolves the binary link, streams
//! the binary into a temporary file next to the destination and renames it
//! into place. Any failure moves on to the next mirror; the first complete
//! transfer wins.
//!
//! # Example
//!
//! ```no_run
//! use libgen_core::download::{HttpClient, MirrorDownloader, NoopObserver};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = MirrorDownloader::new(HttpClient::new()?);
//! let mirrors = vec!["http://library.lol/main/0123456789ABCDEF".to_string()];
//! let outcome = downloader
//!     .download(&mirrors, Path::new("./books/Rust_Ferris.pdf"), &NoopObserver)
//!     .await?;
//! println!("{} bytes from {}", outcome.bytes, outcome.mirror);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::constants::CHUNK_SIZE;
use super::error::{DownloadError, FetchError, MirrorError, MirrorFailure};
use super::progress::{DownloadObserver, TransferProgress};
use crate::resolver::{GetLinkResolver, LinkResolver, absolutize_url};

/// Prefix of the staging file created next to the destination.
const STAGING_PREFIX: &str = ".libgen-";

/// Suffix of the staging file created next to the destination.
const STAGING_SUFFIX: &str = ".part";

/// Mode of a newly created download (`rw-r--r--`).
#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Tuning for [`MirrorDownloader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Deadline for one whole mirror attempt (page, resolve, transfer).
    /// `None` leaves only the HTTP client's connect/stall timeouts.
    pub mirror_timeout: Option<Duration>,
}

/// A successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The mirror (landing page) that served the file.
    pub mirror: String,
    /// The resolved binary URL.
    pub binary_url: String,
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Declared content length, when the server sent one.
    pub content_length: Option<u64>,
    /// 1-based position of the successful mirror in the list.
    pub attempt: usize,
}

struct CompletedTransfer {
    binary_url: String,
    progress: TransferProgress,
}

/// Downloads a file through an ordered list of mirrors, one at a time.
pub struct MirrorDownloader {
    client: HttpClient,
    resolver: Box<dyn LinkResolver>,
    options: DownloadOptions,
    #[cfg(test)]
    injected_write_failures: std::sync::atomic::AtomicUsize,
}

impl std::fmt::Debug for MirrorDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorDownloader")
            .field("client", &self.client)
            .field("resolver", &self.resolver.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MirrorDownloader {
    /// Creates a downloader using the `GET` link resolver and default options.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            resolver: Box::new(GetLinkResolver::new()),
            options: DownloadOptions::default(),
            #[cfg(test)]
            injected_write_failures: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Replaces the landing page resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn LinkResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the download options.
    #[must_use]
    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Downloads `destination` from the first mirror that works.
    ///
    /// Mirrors are attempted strictly in order. A mirror fails on any
    /// landing page, resolution, binary fetch or write error; the failure is
    /// logged, reported to `observer`, and the next mirror is tried. Any
    /// existing file at `destination` is replaced only after a complete
    /// transfer.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidDestination`] if `destination` has no file name
    /// - [`DownloadError::AllMirrorsFailed`] if no mirror produced the file
    ///   (including an empty mirror list)
    #[instrument(skip(self, mirrors, observer), fields(destination = %destination.display(), mirrors = mirrors.len()))]
    pub async fn download(
        &self,
        mirrors: &[String],
        destination: &Path,
        observer: &dyn DownloadObserver,
    ) -> Result<DownloadOutcome, DownloadError> {
        let staging_dir = staging_dir_for(destination)?;
        let total = mirrors.len();
        let mut failures = Vec::new();

        for (index, mirror) in mirrors.iter().enumerate() {
            let attempt = index + 1;
            observer.on_attempt(mirror, attempt, total);
            debug!(mirror = %mirror, attempt, total, "trying mirror");

            match self
                .attempt_with_deadline(mirror, destination, &staging_dir, observer)
                .await
            {
                Ok(done) => {
                    info!(
                        mirror = %mirror,
                        attempt,
                        bytes = done.progress.transferred,
                        path = %destination.display(),
                        "download complete"
                    );
                    return Ok(DownloadOutcome {
                        mirror: mirror.clone(),
                        binary_url: done.binary_url,
                        path: destination.to_path_buf(),
                        bytes: done.progress.transferred,
                        content_length: done.progress.total,
                        attempt,
                    });
                }
                Err(error) => {
                    warn!(
                        mirror = %mirror,
                        attempt,
                        total,
                        kind = error.kind(),
                        error = %error,
                        "mirror failed"
                    );
                    let failure = MirrorFailure {
                        mirror: mirror.clone(),
                        attempt,
                        error,
                    };
                    observer.on_mirror_failed(&failure);
                    failures.push(failure);
                }
            }
        }

        warn!(attempted = failures.len(), "all mirrors failed");
        Err(DownloadError::AllMirrorsFailed { failures })
    }

    async fn attempt_with_deadline(
        &self,
        mirror: &str,
        destination: &Path,
        staging_dir: &Path,
        observer: &dyn DownloadObserver,
    ) -> Result<CompletedTransfer, MirrorError> {
        let attempt = self.attempt(mirror, destination, staging_dir, observer);
        match self.options.mirror_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| MirrorError::TimedOut {
                    mirror: mirror.to_string(),
                    after: limit,
                })?,
            None => attempt.await,
        }
    }

    async fn attempt(
        &self,
        mirror: &str,
        destination: &Path,
        staging_dir: &Path,
        observer: &dyn DownloadObserver,
    ) -> Result<CompletedTransfer, MirrorError> {
        let page = self
            .client
            .get_text(mirror)
            .await
            .map_err(|e| MirrorError::landing_page(mirror, e))?;

        let link = self
            .resolver
            .resolve(&page)
            .map_err(|e| MirrorError::not_found(mirror, e))?;
        let binary_url = Url::parse(mirror)
            .ok()
            .and_then(|base| absolutize_url(&link, &base))
            .unwrap_or(link);
        debug!(binary_url = %binary_url, resolver = self.resolver.name(), "resolved download link");

        let response = self
            .client
            .get_stream(&binary_url)
            .await
            .map_err(|e| MirrorError::binary(&binary_url, e))?;

        let progress = self
            .stream_to_destination(response, &binary_url, destination, staging_dir, observer)
            .await?;

        Ok(CompletedTransfer {
            binary_url,
            progress,
        })
    }

    /// Streams the body into a staging file and renames it onto `destination`.
    ///
    /// The staging file is removed when this future fails or is dropped.
    async fn stream_to_destination(
        &self,
        response: reqwest::Response,
        url: &str,
        destination: &Path,
        staging_dir: &Path,
        observer: &dyn DownloadObserver,
    ) -> Result<TransferProgress, MirrorError> {
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(staging_dir)
            .map_err(|e| MirrorError::write(destination, e))?;
        let (std_file, staging_path) = staging.into_parts();
        debug!(staging = %staging_path.display(), "writing to staging file");

        let mut progress = TransferProgress::new(response.content_length());
        observer.on_transfer_start(&progress);

        let mut writer = BufWriter::new(File::from_std(std_file));
        let mut stream = response.bytes_stream();

        while let Some(next) = stream.next().await {
            let bytes = next.map_err(|e| MirrorError::binary(url, FetchError::from_reqwest(url, e)))?;
            for chunk in bytes.chunks(CHUNK_SIZE) {
                self.write_chunk(&mut writer, chunk)
                    .await
                    .map_err(|e| MirrorError::write(&*staging_path, e))?;
                progress.advance(chunk.len());
                observer.on_progress(&progress, chunk.len());
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| MirrorError::write(&*staging_path, e))?;
        let file = writer.into_inner();
        file.sync_all()
            .await
            .map_err(|e| MirrorError::write(&*staging_path, e))?;
        drop(file);

        #[cfg(unix)]
        tokio::fs::set_permissions(&*staging_path, destination_permissions(destination))
            .await
            .map_err(|e| MirrorError::write(&*staging_path, e))?;

        staging_path
            .persist(destination)
            .map_err(|e| MirrorError::write(destination, e.error))?;

        observer.on_transfer_complete(&progress);
        Ok(progress)
    }

    async fn write_chunk(
        &self,
        writer: &mut BufWriter<File>,
        chunk: &[u8],
    ) -> std::io::Result<()> {
        #[cfg(test)]
        if self.take_injected_write_failure() {
            return Err(std::io::Error::other("injected write failure"));
        }
        writer.write_all(chunk).await
    }

    #[cfg(test)]
    fn inject_write_failures(&self, count: usize) {
        self.injected_write_failures
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn take_injected_write_failure(&self) -> bool {
        use std::sync::atomic::Ordering;

        self.injected_write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                if count > 0 { Some(count - 1) } else { None }
            })
            .is_ok()
    }
}

/// Permissions for the finished file: those of the file being replaced, or
/// [`DEFAULT_FILE_MODE`] for a new one. The staging file itself is owner-only.
#[cfg(unix)]
fn destination_permissions(destination: &Path) -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(destination)
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map_or_else(
            || std::fs::Permissions::from_mode(DEFAULT_FILE_MODE),
            |metadata| metadata.permissions(),
        )
}

/// Directory that holds the staging file: the destination's parent, or `.`.
fn staging_dir_for(destination: &Path) -> Result<PathBuf, DownloadError> {
    if destination.file_name().is_none() {
        return Err(DownloadError::InvalidDestination {
            path: destination.to_path_buf(),
        });
    }
    Ok(match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::download::NoopObserver;

    #[derive(Default)]
    struct RecordingObserver {
        attempts: Mutex<Vec<String>>,
        failures: Mutex<Vec<&'static str>>,
    }

    impl DownloadObserver for RecordingObserver {
        fn on_attempt(&self, mirror: &str, _attempt: usize, _total: usize) {
            self.attempts.lock().unwrap().push(mirror.to_string());
        }

        fn on_mirror_failed(&self, failure: &MirrorFailure) {
            self.failures.lock().unwrap().push(failure.error.kind());
        }
    }

    async fn mount_mirror(server: &MockServer, name: &str, body: &[u8]) -> String {
        let landing = format!(r#"<h2><a href="{}/files/{name}.bin">GET</a></h2>"#, server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/main/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(landing))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/files/{name}.bin")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
        format!("{}/main/{name}", server.uri())
    }

    #[test]
    fn test_staging_dir_for_bare_filename_is_cwd() {
        assert_eq!(staging_dir_for(Path::new("book.pdf")).unwrap(), PathBuf::from("."));
        assert_eq!(
            staging_dir_for(Path::new("/tmp/books/book.pdf")).unwrap(),
            PathBuf::from("/tmp/books")
        );
    }

    #[test]
    fn test_staging_dir_for_rejects_paths_without_file_name() {
        assert!(matches!(
            staging_dir_for(Path::new("/")),
            Err(DownloadError::InvalidDestination { .. })
        ));
        assert!(matches!(
            staging_dir_for(Path::new("books/..")),
            Err(DownloadError::InvalidDestination { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_failure_on_first_mirror_falls_through_to_second() {
        let server = MockServer::start().await;
        let first = mount_mirror(&server, "first", b"first mirror bytes").await;
        let second = mount_mirror(&server, "second", b"second mirror bytes").await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("book.pdf");

        let downloader = MirrorDownloader::new(HttpClient::new().unwrap());
        downloader.inject_write_failures(1);
        let observer = RecordingObserver::default();

        let outcome = downloader
            .download(&[first.clone(), second.clone()], &destination, &observer)
            .await
            .unwrap();

        assert_eq!(outcome.mirror, second);
        assert_eq!(outcome.attempt, 2);
        assert_eq!(std::fs::read(&destination).unwrap(), b"second mirror bytes");
        assert_eq!(*observer.attempts.lock().unwrap(), vec![first, second]);
        assert_eq!(*observer.failures.lock().unwrap(), vec!["write"]);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_no_staging_file_behind() {
        let server = MockServer::start().await;
        let only = mount_mirror(&server, "only", b"payload").await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("book.pdf");

        let downloader = MirrorDownloader::new(HttpClient::new().unwrap());
        downloader.inject_write_failures(1);

        let result = downloader.download(&[only], &destination, &NoopObserver).await;

        assert!(matches!(result, Err(DownloadError::AllMirrorsFailed { .. })));
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "expected empty dir, found: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_mirror_timeout_is_a_per_mirror_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/main/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<a href=\"/x\">GET</a>")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let fast = mount_mirror(&server, "fast", b"fast bytes").await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("book.pdf");

        let downloader = MirrorDownloader::new(HttpClient::new().unwrap()).with_options(
            DownloadOptions {
                mirror_timeout: Some(Duration::from_millis(200)),
            },
        );
        let observer = RecordingObserver::default();

        let outcome = downloader
            .download(
                &[format!("{}/main/slow", server.uri()), fast],
                &destination,
                &observer,
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempt, 2);
        assert_eq!(*observer.failures.lock().unwrap(), vec!["timed_out"]);
    }

    #[tokio::test]
    async fn test_custom_resolver_is_used() {
        struct FixedResolver(String);

        impl LinkResolver for FixedResolver {
            fn name(&self) -> &str {
                "fixed"
            }

            fn resolve(&self, _html: &str) -> Result<String, crate::ResolveError> {
                Ok(self.0.clone())
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/main/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no links here"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/direct.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"direct".to_vec()))
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("book.pdf");

        let downloader = MirrorDownloader::new(HttpClient::new().unwrap())
            .with_resolver(Box::new(FixedResolver("/direct.bin".to_string())));

        let outcome = downloader
            .download(
                &[format!("{}/main/plain", server.uri())],
                &destination,
                &NoopObserver,
            )
            .await
            .unwrap();

        assert_eq!(outcome.binary_url, format!("{}/direct.bin", server.uri()));
        assert_eq!(std::fs::read(&destination).unwrap(), b"direct");
    }
}
