//! End-to-end tests of `IsolatedTika` against the stub worker process.

use std::io::Write;
use std::sync::Arc;

use isotika::config::{RequestSettings, WorkerSettings};
use isotika::worker::{WorkerError, WorkerState};
use isotika::{IsolatedTika, Metadata, Settings};

fn stub_settings(preferred_port: u16, timeout_ms: u64) -> Settings {
    Settings {
        worker: WorkerSettings {
            runtime: env!("CARGO_BIN_EXE_stub-worker").to_string(),
            preferred_port,
            ready_poll_interval_ms: 50,
            probe_timeout_ms: 500,
            startup_timeout_ms: 15_000,
            stop_timeout_ms: 2_000,
            ..Default::default()
        },
        request: RequestSettings {
            timeout_ms,
            ..Default::default()
        },
    }
}

async fn start_stub(preferred_port: u16, timeout_ms: u64) -> IsolatedTika {
    IsolatedTika::start_with_artifact(stub_settings(preferred_port, timeout_ms), "stub.jar")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_parse_file_sets_resource_name() {
    let tika = start_stub(32000, 5_000).await;

    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(b"hello world").unwrap();
    file.flush().unwrap();

    let mut metadata = Metadata::new();
    assert!(tika.parse_file(file.path(), &mut metadata).await);

    let canonical = std::fs::canonicalize(file.path()).unwrap();
    assert_eq!(
        metadata.get(Metadata::RESOURCE_NAME),
        Some(canonical.to_string_lossy().as_ref())
    );
    assert_eq!(metadata.get("Content-Type"), Some("text/plain"));
    assert_eq!(metadata.get("Content-Length"), Some("11"));

    tika.stop().await;
}

#[tokio::test]
async fn test_missing_file_leaves_metadata_untouched() {
    let tika = start_stub(32100, 5_000).await;

    let mut metadata = Metadata::new();
    metadata.add("existing", "value");
    let before = metadata.clone();

    let path = std::env::temp_dir().join("isotika-definitely-missing.pdf");
    assert!(!tika.parse_file(&path, &mut metadata).await);
    assert_eq!(metadata, before);

    let err = tika.try_parse_file(&path, &mut metadata).await.unwrap_err();
    assert!(matches!(err, WorkerError::FileNotFound(_)));
    assert_eq!(tika.restart_count().await, 0);

    tika.stop().await;
}

#[tokio::test]
async fn test_unsupported_format_records_sentinel() {
    let tika = start_stub(32200, 5_000).await;

    let mut metadata = Metadata::new();
    assert!(!tika.parse_bytes(b"UNSUPPORTED", None, &mut metadata).await);

    let entries: Vec<_> = metadata.iter().collect();
    assert_eq!(entries, vec![(Metadata::PARSE_FAILURE_415, "true")]);
    assert_eq!(tika.restart_count().await, 0);

    let mut metadata = Metadata::new();
    let err = tika
        .try_parse_bytes(b"UNSUPPORTED", None, &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::UnsupportedFormat));

    tika.stop().await;
}

#[tokio::test]
async fn test_repeated_keys_preserved_in_order() {
    let tika = start_stub(32300, 5_000).await;

    let mut metadata = Metadata::new();
    assert!(
        tika.parse_bytes(b"MULTI document", Some("application/msword"), &mut metadata)
            .await
    );

    let entries: Vec<_> = metadata.iter().collect();
    assert_eq!(
        entries,
        vec![
            ("Content-Type", "application/msword"),
            ("Content-Length", "14"),
            ("dc:creator", "alice"),
            ("dc:creator", "bob"),
        ]
    );

    tika.stop().await;
}

#[tokio::test]
async fn test_hung_parse_times_out_and_recovers() {
    let tika = start_stub(32400, 300).await;

    let mut metadata = Metadata::new();
    let err = tika
        .try_parse_bytes(b"HANG", None, &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Timeout(_)));
    assert!(metadata.is_empty());
    assert_eq!(tika.restart_count().await, 1);

    let mut metadata = Metadata::new();
    assert!(tika.parse_bytes(b"fine", Some("text/plain"), &mut metadata).await);
    assert_eq!(metadata.get("Content-Length"), Some("4"));

    tika.stop().await;
}

#[tokio::test]
async fn test_malformed_response_keeps_worker() {
    let tika = start_stub(32500, 5_000).await;
    let port = tika.port().await;

    let mut metadata = Metadata::new();
    let err = tika
        .try_parse_bytes(b"MALFORMED", None, &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Decode(_)));
    assert!(metadata.is_empty());

    assert!(tika.is_running().await);
    assert_eq!(tika.port().await, port);
    assert_eq!(tika.restart_count().await, 0);

    tika.stop().await;
}

#[tokio::test]
async fn test_parse_after_stop_fails_until_restart() {
    let tika = start_stub(32600, 5_000).await;
    tika.stop().await;
    assert_eq!(tika.state().await, WorkerState::Stopped);

    let mut metadata = Metadata::new();
    let err = tika
        .try_parse_bytes(b"hello", None, &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::WorkerNotRunning));
    assert!(!tika.parse_bytes(b"hello", None, &mut metadata).await);

    tika.restart().await.unwrap();
    assert!(tika.parse_bytes(b"hello", None, &mut metadata).await);
    assert_eq!(metadata.get("Content-Type"), Some("application/octet-stream"));

    tika.stop().await;
}

#[tokio::test]
async fn test_parse_reader_with_hint() {
    let tika = start_stub(32700, 5_000).await;

    let mut reader: &[u8] = b"%PDF-1.4 fake";
    let mut metadata = Metadata::new();
    assert!(
        tika.parse_reader(&mut reader, Some("application/pdf"), &mut metadata)
            .await
    );
    assert_eq!(metadata.get("Content-Type"), Some("application/pdf"));
    assert_eq!(metadata.get("Content-Length"), Some("13"));

    tika.stop().await;
}

#[tokio::test]
async fn test_existing_content_type_is_hint() {
    let tika = start_stub(32800, 5_000).await;

    let mut metadata = Metadata::new();
    metadata.add(Metadata::CONTENT_TYPE, "image/tiff");
    assert!(tika.parse_bytes(b"scan", None, &mut metadata).await);

    assert_eq!(
        metadata.get_all(Metadata::CONTENT_TYPE),
        vec!["image/tiff", "image/tiff"]
    );

    tika.stop().await;
}

#[tokio::test]
async fn test_concurrent_parses_are_serialised() {
    let tika = Arc::new(start_stub(32900, 5_000).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let tika = Arc::clone(&tika);
        handles.push(tokio::spawn(async move {
            let payload = format!("document {}", i);
            let mut metadata = Metadata::new();
            let ok = tika
                .parse_bytes(payload.as_bytes(), Some("text/plain"), &mut metadata)
                .await;
            (ok, metadata, payload.len())
        }));
    }

    for handle in handles {
        let (ok, metadata, len) = handle.await.unwrap();
        assert!(ok);
        assert_eq!(metadata.get("Content-Length"), Some(len.to_string().as_str()));
    }
    assert_eq!(tika.restart_count().await, 0);

    tika.stop().await;
}

#[tokio::test]
async fn test_empty_response_is_not_success() {
    let tika = start_stub(33100, 5_000).await;

    let mut metadata = Metadata::new();
    assert!(!tika.parse_bytes(b"EMPTY", None, &mut metadata).await);
    assert!(metadata.is_empty());

    let err = tika
        .try_parse_bytes(b"EMPTY", None, &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Decode(_)));
    assert!(tika.is_running().await);
    assert_eq!(tika.restart_count().await, 0);

    tika.stop().await;
}

#[tokio::test]
async fn test_directory_is_not_a_file() {
    let tika = start_stub(33200, 5_000).await;
    let dir = tempfile::tempdir().unwrap();

    let mut metadata = Metadata::new();
    let err = tika
        .try_parse_file(dir.path(), &mut metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::FileNotFound(_)));
    assert!(metadata.is_empty());

    tika.stop().await;
}
