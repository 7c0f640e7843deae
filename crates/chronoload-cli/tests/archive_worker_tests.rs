//! Integration tests for the resumable archive worker

use bytes::Bytes;
use chronoload_cli::api::ArchiveClient;
use chronoload_cli::archive::{ArchiveRef, ArchiveWorker, WorkerCommand, WorkerEvent};
use chronoload_common::checksum::sha256_hex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOWNLOAD_PATH: &str = "/bulk-download/archives/download-archive";

fn worker_for(server: &MockServer) -> (ArchiveWorker, UnboundedReceiver<WorkerEvent>) {
    ArchiveWorker::new(ArchiveClient::new(reqwest::Client::new(), server.uri()))
}

fn archive(name: &str, size: u64) -> ArchiveRef {
    ArchiveRef {
        name: name.to_string(),
        size,
        checksum: None,
    }
}

/// Collect events until READY or ERROR; returns (progress events, terminal event)
async fn until_terminal(rx: &mut UnboundedReceiver<WorkerEvent>) -> (Vec<(u64, u64)>, WorkerEvent) {
    let mut progress = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("worker produced no terminal event")
            .expect("event channel closed");
        match event {
            WorkerEvent::Progress {
                received, total, ..
            } => progress.push((received, total)),
            terminal => return (progress, terminal),
        }
    }
}

#[tokio::test]
async fn test_full_download_emits_progress_then_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(query_param("name", "usage-2023"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    worker.start(archive("usage-2023", 11), 0, None, None).await;

    let (progress, terminal) = until_terminal(&mut rx).await;
    assert_eq!(progress.last(), Some(&(11, 11)));
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));

    let WorkerEvent::DownloadReady { name, url, is_blob } = terminal else {
        panic!("expected DOWNLOAD_READY, got {:?}", terminal);
    };
    assert_eq!(name, "usage-2023");
    assert!(is_blob);
    assert_eq!(
        worker.blobs().get(&url).await.unwrap(),
        Bytes::from_static(b"hello world")
    );
    assert!(worker.states().is_empty().await);
}

#[tokio::test]
async fn test_time_window_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(query_param("start", "2023-01-01"))
        .and(query_param("end", "2023-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"window".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    worker
        .handle(WorkerCommand::Download {
            archive: archive("a", 0),
            offset: 0,
            start: Some("2023-01-01".to_string()),
            end: Some("2023-02-01".to_string()),
        })
        .await;

    let (_, terminal) = until_terminal(&mut rx).await;
    assert!(matches!(terminal, WorkerEvent::DownloadReady { .. }));
}

#[tokio::test]
async fn test_content_range_total_overrides_estimate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "bytes 0-4/5")
                .set_body_bytes(b"12345".to_vec()),
        )
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    worker.start(archive("a", 999), 0, None, None).await;

    let (progress, _) = until_terminal(&mut rx).await;
    assert_eq!(progress.last(), Some(&(5, 5)));
}

#[tokio::test]
async fn test_resume_requests_range_and_reuses_buffers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(header("range", "bytes=5-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 5-9/10")
                .set_body_bytes(b"world".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);

    // bytes held from an earlier, aborted attempt
    let lease = worker.states().begin("a", 0, 0).await;
    worker
        .states()
        .append("a", lease.generation, Bytes::from_static(b"hello"))
        .await
        .unwrap();

    worker.start(archive("a", 0), 5, None, None).await;

    let (progress, terminal) = until_terminal(&mut rx).await;
    assert_eq!(progress.last(), Some(&(10, 10)));

    let WorkerEvent::DownloadReady { url, .. } = terminal else {
        panic!("expected DOWNLOAD_READY, got {:?}", terminal);
    };
    assert_eq!(
        worker.blobs().get(&url).await.unwrap(),
        Bytes::from_static(b"helloworld")
    );
}

#[tokio::test]
async fn test_ignored_range_restarts_from_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"complete".to_vec()))
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    let lease = worker.states().begin("a", 0, 0).await;
    worker
        .states()
        .append("a", lease.generation, Bytes::from_static(b"stale"))
        .await
        .unwrap();

    worker.start(archive("a", 0), 5, None, None).await;

    let (_, terminal) = until_terminal(&mut rx).await;
    let WorkerEvent::DownloadReady { url, .. } = terminal else {
        panic!("expected DOWNLOAD_READY, got {:?}", terminal);
    };
    assert_eq!(
        worker.blobs().get(&url).await.unwrap(),
        Bytes::from_static(b"complete")
    );
}

#[tokio::test]
async fn test_abort_is_silent_and_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    let task = worker.start(archive("a", 4), 0, None, None).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(worker.handle(WorkerCommand::abort("a")).await.is_none());

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("fetch task did not observe the abort")
        .unwrap();

    assert!(rx.try_recv().is_err());
    let snapshot = worker.states().snapshot("a").await.unwrap();
    assert!(snapshot.cancelled);
}

/// Read one HTTP request head off `socket`
async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&head).to_lowercase()
}

#[tokio::test]
async fn test_abort_mid_stream_then_resume_from_received() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    // first connection stalls after half the body; the second serves the rest
    let origin = tokio::spawn(async move {
        let (mut stalled, _) = listener.accept().await.unwrap();
        read_request_head(&mut stalled).await;
        stalled
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello")
            .await
            .unwrap();
        stalled.flush().await.unwrap();

        let (mut resumed, _) = listener.accept().await.unwrap();
        let head = read_request_head(&mut resumed).await;
        resumed
            .write_all(
                b"HTTP/1.1 206 Partial Content\r\nContent-Range: bytes 5-9/10\r\nContent-Length: 5\r\n\r\nworld",
            )
            .await
            .unwrap();
        resumed.flush().await.unwrap();
        drop(stalled);
        head
    });

    let (worker, mut rx) = ArchiveWorker::new(ArchiveClient::new(reqwest::Client::new(), base_url));
    let handle = worker.clone().spawn();
    handle
        .send(WorkerCommand::download(archive("a", 10)))
        .unwrap();

    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no progress before the stall")
            .unwrap();
        match event {
            WorkerEvent::Progress { received: 5, total, .. } => {
                assert_eq!(total, 10);
                break;
            },
            WorkerEvent::Progress { .. } => continue,
            other => panic!("unexpected event {:?}", other),
        }
    }

    handle.send(WorkerCommand::abort("a")).unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match worker.states().snapshot("a").await {
                Some(snapshot) if snapshot.cancelled => return snapshot,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .expect("abort was not applied");
    assert_eq!(snapshot.received, 5);

    // abort is silent
    assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .is_err());

    handle
        .send(WorkerCommand::resume(archive("a", 10), snapshot.received))
        .unwrap();

    let (progress, terminal) = until_terminal(&mut rx).await;
    assert_eq!(progress.last(), Some(&(10, 10)));
    let WorkerEvent::DownloadReady { url, .. } = terminal else {
        panic!("expected DOWNLOAD_READY, got {:?}", terminal);
    };
    assert_eq!(
        worker.blobs().get(&url).await.unwrap(),
        Bytes::from_static(b"helloworld")
    );

    let resumed_head = origin.await.unwrap();
    assert!(resumed_head.contains("range: bytes=5-"));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_http_error_emits_error_and_discards_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    worker.start(archive("missing", 10), 0, None, None).await;

    let (progress, terminal) = until_terminal(&mut rx).await;
    assert!(progress.is_empty());
    let WorkerEvent::Error { name, error } = terminal else {
        panic!("expected ERROR, got {:?}", terminal);
    };
    assert_eq!(name, "missing");
    assert!(error.contains("404"));
    assert!(worker.states().is_empty().await);
}

#[tokio::test]
async fn test_checksum_mismatch_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    let expected = ArchiveRef {
        checksum: Some(sha256_hex(b"original")),
        ..archive("a", 8)
    };
    worker.start(expected, 0, None, None).await;

    let (_, terminal) = until_terminal(&mut rx).await;
    let WorkerEvent::Error { error, .. } = terminal else {
        panic!("expected ERROR, got {:?}", terminal);
    };
    assert!(error.contains("Checksum"));
    assert!(worker.blobs().is_empty().await);
}

#[tokio::test]
async fn test_checksum_match_is_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"original".to_vec()))
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    let expected = ArchiveRef {
        checksum: Some(sha256_hex(b"original").to_uppercase()),
        ..archive("a", 8)
    };
    worker.start(expected, 0, None, None).await;

    let (_, terminal) = until_terminal(&mut rx).await;
    assert!(matches!(terminal, WorkerEvent::DownloadReady { .. }));
}

#[tokio::test]
async fn test_distinct_archives_download_concurrently() {
    let server = MockServer::start().await;
    for name in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(DOWNLOAD_PATH))
            .and(query_param("name", name))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(name.as_bytes().to_vec())
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
    }

    let (worker, mut rx) = worker_for(&server);
    let handle = worker.clone().spawn();
    handle
        .send(WorkerCommand::download(archive("a", 1)))
        .unwrap();
    handle
        .send(WorkerCommand::download(archive("b", 1)))
        .unwrap();

    let mut ready = Vec::new();
    while ready.len() < 2 {
        let (_, terminal) = until_terminal(&mut rx).await;
        match terminal {
            WorkerEvent::DownloadReady { name, url, .. } => {
                assert_eq!(
                    worker.blobs().get(&url).await.unwrap(),
                    Bytes::from(name.clone().into_bytes())
                );
                ready.push(name);
            },
            other => panic!("unexpected event {:?}", other),
        }
    }
    ready.sort();
    assert_eq!(ready, vec!["a", "b"]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_ready_blob_can_be_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"to disk".to_vec()))
        .mount(&server)
        .await;

    let (worker, mut rx) = worker_for(&server);
    worker.start(archive("a", 7), 0, None, None).await;

    let (_, terminal) = until_terminal(&mut rx).await;
    let WorkerEvent::DownloadReady { url, .. } = terminal else {
        panic!("expected DOWNLOAD_READY, got {:?}", terminal);
    };

    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("a.bin");
    assert_eq!(worker.blobs().save(&url, &target).await.unwrap(), 7);
    assert_eq!(std::fs::read(&target).unwrap(), b"to disk");
    assert!(worker.blobs().revoke(&url).await);
}
