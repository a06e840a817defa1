//! Integration tests for the mirror fallback downloader.
//!
//! Each test mounts landing pages and binaries on a wiremock server and
//! drives `MirrorDownloader::download` end to end against a temp directory.

use std::sync::Mutex;

use libgen_core::{
    CHUNK_SIZE, DownloadError, DownloadObserver, HttpClient, MirrorDownloader, MirrorFailure,
    NoopObserver, TransferProgress, book_filename,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingObserver {
    attempts: Mutex<Vec<(String, usize, usize)>>,
    increments: Mutex<Vec<usize>>,
    last_progress: Mutex<Option<TransferProgress>>,
    completed: Mutex<Option<TransferProgress>>,
    failures: Mutex<Vec<(String, &'static str)>>,
}

impl DownloadObserver for RecordingObserver {
    fn on_attempt(&self, mirror: &str, attempt: usize, total: usize) {
        self.attempts
            .lock()
            .unwrap()
            .push((mirror.to_string(), attempt, total));
    }

    fn on_progress(&self, progress: &TransferProgress, chunk_len: usize) {
        self.increments.lock().unwrap().push(chunk_len);
        *self.last_progress.lock().unwrap() = Some(*progress);
    }

    fn on_transfer_complete(&self, progress: &TransferProgress) {
        *self.completed.lock().unwrap() = Some(*progress);
    }

    fn on_mirror_failed(&self, failure: &MirrorFailure) {
        self.failures
            .lock()
            .unwrap()
            .push((failure.mirror.clone(), failure.error.kind()));
    }
}

impl RecordingObserver {
    fn attempted_mirrors(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(mirror, _, _)| mirror.clone())
            .collect()
    }

    fn failure_kinds(&self) -> Vec<&'static str> {
        self.failures.lock().unwrap().iter().map(|(_, kind)| *kind).collect()
    }
}

fn downloader() -> MirrorDownloader {
    MirrorDownloader::new(HttpClient::new().unwrap())
}

/// Mounts a landing page at `/main/{name}` whose GET link points at
/// `/files/{name}.bin`, and serves `body` there.
async fn mount_working_mirror(server: &MockServer, name: &str, body: &[u8]) -> String {
    let landing = format!(
        r#"<html><body><h2><a href="{}/files/{name}.bin">GET</a></h2>
<ul><li><a href="https://ipfs.example/{name}">Cloudflare</a></li></ul></body></html>"#,
        server.uri()
    );
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

async fn mount_landing_status(server: &MockServer, name: &str, status: u16) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/main/{name}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    format!("{}/main/{name}", server.uri())
}

async fn mount_landing_without_get(server: &MockServer, name: &str) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/main/{name}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/elsewhere">Download</a><a>GET</a>"#),
        )
        .mount(server)
        .await;
    format!("{}/main/{name}", server.uri())
}

async fn mount_broken_binary(server: &MockServer, name: &str) -> String {
    let landing = format!(r#"<a href="/files/{name}.bin">GET</a>"#);
    Mock::given(method("GET"))
        .and(path(format!("/main/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{name}.bin")))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
    format!("{}/main/{name}", server.uri())
}

/// Serves `response` verbatim to every connection, then closes it. Used for
/// framing wiremock cannot produce: chunked bodies and truncated bodies.
async fn spawn_raw_http_server(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

/// Mounts a landing page on `server` whose GET link points at `binary_url`.
async fn mount_landing_to(server: &MockServer, name: &str, binary_url: &str) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/main/{name}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!(r#"<a href="{binary_url}">GET</a>"#)),
        )
        .mount(server)
        .await;
    format!("{}/main/{name}", server.uri())
}

fn chunked_response(body: &[u8]) -> Vec<u8> {
    let mut response =
        b"HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
            .to_vec();
    for chunk in body.chunks(700) {
        response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        response.extend_from_slice(chunk);
        response.extend_from_slice(b"\r\n");
    }
    response.extend_from_slice(b"0\r\n\r\n");
    response
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
}

#[tokio::test]
async fn test_first_mirror_success_skips_the_rest() {
    let server = MockServer::start().await;
    let first = mount_working_mirror(&server, "first", b"%PDF-1.7 first").await;
    // Never requested: expect(0) verifies on drop.
    Mock::given(method("GET"))
        .and(path("/main/second"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let second = format!("{}/main/second", server.uri());
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    let observer = RecordingObserver::default();

    let outcome = assert_ok!(
        downloader()
            .download(&[first.clone(), second], &destination, &observer)
            .await
    );

    assert_eq!(outcome.mirror, first);
    assert_eq!(outcome.attempt, 1);
    assert_eq!(outcome.bytes, 14);
    assert_eq!(outcome.path, destination);
    assert_eq!(outcome.binary_url, format!("{}/files/first.bin", server.uri()));
    assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.7 first");
    assert_eq!(observer.attempted_mirrors(), vec![first]);
    assert!(observer.failure_kinds().is_empty());
}

#[tokio::test]
async fn test_falls_back_through_each_failure_kind_in_order() {
    let server = MockServer::start().await;
    let unreachable = mount_landing_status(&server, "gone", 404).await;
    let no_link = mount_landing_without_get(&server, "nolink").await;
    let broken = mount_broken_binary(&server, "broken").await;
    let good = mount_working_mirror(&server, "good", b"the real book").await;
    let mirrors = vec![unreachable, no_link, broken, good.clone()];
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    let observer = RecordingObserver::default();

    let outcome = assert_ok!(downloader().download(&mirrors, &destination, &observer).await);

    assert_eq!(outcome.mirror, good);
    assert_eq!(outcome.attempt, 4);
    assert_eq!(std::fs::read(&destination).unwrap(), b"the real book");
    assert_eq!(observer.attempted_mirrors(), mirrors);
    assert_eq!(
        observer.failure_kinds(),
        vec!["landing_page_fetch", "not_found", "binary_fetch"]
    );
    let attempts = observer.attempts.lock().unwrap().clone();
    assert!(attempts.iter().all(|(_, _, total)| *total == 4));
    assert_eq!(
        attempts.iter().map(|(_, n, _)| *n).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
}

#[tokio::test]
async fn test_all_mirrors_failing_reports_every_failure_and_writes_nothing() {
    let server = MockServer::start().await;
    let mirrors = vec![
        mount_landing_status(&server, "a", 503).await,
        mount_landing_without_get(&server, "b").await,
        mount_broken_binary(&server, "c").await,
    ];
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");

    let error = assert_err!(
        downloader()
            .download(&mirrors, &destination, &NoopObserver)
            .await
    );

    let DownloadError::AllMirrorsFailed { failures } = &error else {
        panic!("Expected AllMirrorsFailed, got: {error:?}");
    };
    assert_eq!(failures.len(), 3);
    assert_eq!(
        failures.iter().map(|f| f.mirror.clone()).collect::<Vec<_>>(),
        mirrors
    );
    assert_eq!(
        failures.iter().map(|f| f.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let message = error.to_string();
    assert!(message.contains("all 3 mirror(s) failed"), "got: {message}");
    assert!(!destination.exists());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_run_keeps_pre_existing_file() {
    let server = MockServer::start().await;
    let mirrors = vec![mount_broken_binary(&server, "c").await];
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    std::fs::write(&destination, b"previous download").unwrap();

    assert_err!(
        downloader()
            .download(&mirrors, &destination, &NoopObserver)
            .await
    );

    assert_eq!(std::fs::read(&destination).unwrap(), b"previous download");
}

#[tokio::test]
async fn test_empty_mirror_list_fails_without_requests() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    let observer = RecordingObserver::default();

    let error = assert_err!(downloader().download(&[], &destination, &observer).await);

    assert!(error.failures().is_empty());
    assert!(observer.attempted_mirrors().is_empty());
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_progress_increments_are_chunk_sized_and_sum_to_size() {
    let server = MockServer::start().await;
    let body = payload(10 * CHUNK_SIZE + 517);
    let mirror = mount_working_mirror(&server, "big", &body).await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("big.pdf");
    let observer = RecordingObserver::default();

    let outcome = assert_ok!(
        downloader()
            .download(&[mirror], &destination, &observer)
            .await
    );

    let size = u64::try_from(body.len()).unwrap();
    let increments = observer.increments.lock().unwrap().clone();
    assert!(increments.iter().all(|len| *len > 0 && *len <= CHUNK_SIZE));
    assert_eq!(increments.iter().sum::<usize>(), body.len());

    let last = observer.last_progress.lock().unwrap().unwrap();
    assert_eq!(last.transferred, size);
    assert_eq!(last.total, Some(size));
    let completed = observer.completed.lock().unwrap().unwrap();
    assert_eq!(completed.transferred, size);

    assert_eq!(outcome.bytes, size);
    assert_eq!(outcome.content_length, Some(size));
    assert_eq!(std::fs::read(&destination).unwrap(), body);
}

#[tokio::test]
async fn test_rerun_overwrites_instead_of_appending() {
    let server = MockServer::start().await;
    let mirror = mount_working_mirror(&server, "same", b"short body").await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    std::fs::write(&destination, b"a much longer stale file from an earlier run").unwrap();
    let downloader = downloader();

    assert_ok!(
        downloader
            .download(std::slice::from_ref(&mirror), &destination, &NoopObserver)
            .await
    );
    assert_ok!(
        downloader
            .download(&[mirror], &destination, &NoopObserver)
            .await
    );

    assert_eq!(std::fs::read(&destination).unwrap(), b"short body");
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_mirror_order_changes_attempts_not_outcome() {
    let server = MockServer::start().await;
    let failing = mount_landing_status(&server, "down", 502).await;
    let working = mount_working_mirror(&server, "up", b"content").await;
    let temp_dir = TempDir::new().unwrap();

    let forward = RecordingObserver::default();
    let forward_dest = temp_dir.path().join("forward.pdf");
    let outcome_forward = assert_ok!(
        downloader()
            .download(&[failing.clone(), working.clone()], &forward_dest, &forward)
            .await
    );

    let reverse = RecordingObserver::default();
    let reverse_dest = temp_dir.path().join("reverse.pdf");
    let outcome_reverse = assert_ok!(
        downloader()
            .download(&[working.clone(), failing.clone()], &reverse_dest, &reverse)
            .await
    );

    assert_eq!(forward.attempted_mirrors(), vec![failing, working.clone()]);
    assert_eq!(reverse.attempted_mirrors(), vec![working.clone()]);
    assert_eq!(outcome_forward.mirror, working);
    assert_eq!(outcome_reverse.mirror, working);
    assert_eq!(
        std::fs::read(&forward_dest).unwrap(),
        std::fs::read(&reverse_dest).unwrap()
    );
}

#[tokio::test]
async fn test_duplicate_mirrors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/main/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    let flaky = format!("{}/main/flaky", server.uri());
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");

    let error = assert_err!(
        downloader()
            .download(&[flaky.clone(), flaky], &destination, &NoopObserver)
            .await
    );

    assert_eq!(error.failures().len(), 2);
}

#[tokio::test]
async fn test_relative_get_link_resolves_against_mirror() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/main/ABCDEF"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table><tr><td><A HREF='/get.php?md5=ABCDEF&amp;key=XYZ'>GET</A></td></tr></table>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get.php"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"epub bytes".to_vec()))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.epub");

    let outcome = assert_ok!(
        downloader()
            .download(
                &[format!("{}/main/ABCDEF", server.uri())],
                &destination,
                &NoopObserver
            )
            .await
    );

    assert_eq!(
        outcome.binary_url,
        format!("{}/get.php?md5=ABCDEF&key=XYZ", server.uri())
    );
    assert_eq!(std::fs::read(&destination).unwrap(), b"epub bytes");
}

#[tokio::test]
async fn test_invalid_destination_is_rejected_up_front() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let error = assert_err!(
        downloader()
            .download(
                &[format!("{}/main/x", server.uri())],
                std::path::Path::new("/"),
                &NoopObserver
            )
            .await
    );

    assert!(matches!(error, DownloadError::InvalidDestination { .. }));
}

#[tokio::test]
async fn test_unknown_content_length_counts_bytes_without_total() {
    let body = payload(3 * CHUNK_SIZE + 100);
    let binary_host = spawn_raw_http_server(chunked_response(&body)).await;
    let server = MockServer::start().await;
    let mirror = mount_landing_to(&server, "chunked", &format!("{binary_host}/book.pdf")).await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    let observer = RecordingObserver::default();

    let outcome = assert_ok!(
        downloader()
            .download(&[mirror], &destination, &observer)
            .await
    );

    let size = u64::try_from(body.len()).unwrap();
    let last = observer.last_progress.lock().unwrap().unwrap();
    assert_eq!(last.total, None);
    assert_eq!(last.transferred, size);
    assert!(observer
        .increments
        .lock()
        .unwrap()
        .iter()
        .all(|len| *len <= CHUNK_SIZE));
    assert_eq!(outcome.content_length, None);
    assert_eq!(outcome.bytes, size);
    assert_eq!(std::fs::read(&destination).unwrap(), body);
}

#[tokio::test]
async fn test_body_cut_off_mid_transfer_falls_through_to_next_mirror() {
    let mut truncated =
        b"HTTP/1.1 200 OK\r\nContent-Length: 50000\r\nConnection: close\r\n\r\n".to_vec();
    truncated.extend_from_slice(&payload(4 * CHUNK_SIZE));
    let binary_host = spawn_raw_http_server(truncated).await;
    let server = MockServer::start().await;
    let cut_off = mount_landing_to(&server, "cutoff", &format!("{binary_host}/book.pdf")).await;
    let good = mount_working_mirror(&server, "good", b"complete book").await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    let observer = RecordingObserver::default();

    let outcome = assert_ok!(
        downloader()
            .download(&[cut_off, good.clone()], &destination, &observer)
            .await
    );

    assert_eq!(outcome.mirror, good);
    assert_eq!(observer.failure_kinds(), vec!["binary_fetch"]);
    assert_eq!(std::fs::read(&destination).unwrap(), b"complete book");
    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("book.pdf")]);
}

#[tokio::test]
async fn test_long_multibyte_title_downloads_to_valid_name() {
    let server = MockServer::start().await;
    let first = mount_working_mirror(&server, "cjk", b"book body").await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir
        .path()
        .join(book_filename(&"书".repeat(200), "作者", "pdf"));

    let outcome = assert_ok!(
        downloader()
            .download(&[first], &destination, &NoopObserver)
            .await
    );

    assert_eq!(outcome.attempt, 1);
    assert_eq!(std::fs::read(&destination).unwrap(), b"book body");
}

#[cfg(unix)]
#[tokio::test]
async fn test_new_download_is_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let server = MockServer::start().await;
    let mirror = mount_working_mirror(&server, "perm", b"readable").await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");

    assert_ok!(
        downloader()
            .download(&[mirror], &destination, &NoopObserver)
            .await
    );

    let mode = std::fs::metadata(&destination).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[cfg(unix)]
#[tokio::test]
async fn test_overwrite_keeps_existing_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let server = MockServer::start().await;
    let mirror = mount_working_mirror(&server, "keep", b"new content").await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("book.pdf");
    std::fs::write(&destination, b"old content").unwrap();
    std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(0o640)).unwrap();

    assert_ok!(
        downloader()
            .download(&[mirror], &destination, &NoopObserver)
            .await
    );

    let mode = std::fs::metadata(&destination).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
    assert_eq!(std::fs::read(&destination).unwrap(), b"new content");
}
