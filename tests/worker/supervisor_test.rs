//! Supervisor and gateway behaviour against the stub worker process.

use std::time::Duration;

use isotika::config::{RequestSettings, WorkerSettings};
use isotika::worker::{ProcessSupervisor, RequestGateway, RequestOutcome, WorkerError, WorkerState};

/// Each test starts from its own port so parallel tests never race for one.
fn stub_settings(preferred_port: u16) -> WorkerSettings {
    WorkerSettings {
        runtime: env!("CARGO_BIN_EXE_stub-worker").to_string(),
        preferred_port,
        ready_poll_interval_ms: 50,
        probe_timeout_ms: 500,
        startup_timeout_ms: 15_000,
        stop_timeout_ms: 2_000,
        ..Default::default()
    }
}

fn gateway(timeout_ms: u64) -> RequestGateway {
    RequestGateway::new(&RequestSettings {
        timeout_ms,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_start_and_stop() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31000), "stub.jar").unwrap();
    assert_eq!(supervisor.state(), WorkerState::Stopped);

    let port = supervisor.start().await.unwrap();
    assert!(port >= 31000);
    assert_eq!(supervisor.state(), WorkerState::Running);
    assert!(supervisor.is_running());
    assert_eq!(supervisor.port(), Some(port));
    assert!(supervisor.uptime().is_some());

    supervisor.stop().await;
    assert_eq!(supervisor.state(), WorkerState::Stopped);
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.port(), None);

    // Idempotent
    supervisor.stop().await;
    assert_eq!(supervisor.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_start_when_running_is_noop() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31100), "stub.jar").unwrap();

    let first = supervisor.start().await.unwrap();
    let second = supervisor.start().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(supervisor.restart_count(), 0);
    supervisor.stop().await;
}

#[tokio::test]
async fn test_worker_never_ready_fails_start() {
    let mut settings = stub_settings(31200);
    settings.startup_timeout_ms = 500;
    settings
        .env
        .insert("STUB_WORKER_NEVER_READY".to_string(), "1".to_string());
    let mut supervisor = ProcessSupervisor::new(settings, "stub.jar").unwrap();

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, WorkerError::StartupTimeout(_)));
    assert_eq!(supervisor.state(), WorkerState::FailedToStart);
    assert!(!supervisor.is_running());

    let err = gateway(1_000)
        .send(&mut supervisor, b"hello", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::WorkerNotRunning));
}

#[tokio::test]
async fn test_worker_exit_on_start_is_launch_failure() {
    let mut settings = stub_settings(31300);
    settings
        .env
        .insert("STUB_WORKER_EXIT_ON_START".to_string(), "1".to_string());
    let mut supervisor = ProcessSupervisor::new(settings, "stub.jar").unwrap();

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, WorkerError::WorkerExited { .. }));
    assert!(err.is_launch_failure());
    assert_eq!(supervisor.state(), WorkerState::FailedToStart);
}

#[tokio::test]
async fn test_chatty_worker_does_not_stall() {
    // Far more than an OS pipe buffer holds.
    let mut settings = stub_settings(31400);
    settings
        .env
        .insert("STUB_WORKER_CHATTY".to_string(), "1048576".to_string());
    let mut supervisor = ProcessSupervisor::new(settings, "stub.jar").unwrap();

    supervisor.start().await.unwrap();
    assert!(supervisor.is_running());

    // The last pipe buffer may still be in flight when the worker turns ready.
    let mut captured = 0;
    for _ in 0..100 {
        captured = supervisor.output().map(|o| o.len()).unwrap_or(0);
        if captured >= 1_048_576 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(captured >= 1_048_576, "captured {} bytes", captured);

    supervisor.stop().await;
}

#[tokio::test]
async fn test_three_timeouts_three_restarts() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31500), "stub.jar").unwrap();
    supervisor.start().await.unwrap();
    let gateway = gateway(300);

    for expected in 1..=3 {
        let outcome = gateway
            .send(&mut supervisor, b"HANG", Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Timeout);
        assert_eq!(supervisor.restart_count(), expected);
        assert_eq!(supervisor.state(), WorkerState::Running);
    }

    assert!(supervisor.is_running());
    let outcome = gateway
        .send(&mut supervisor, b"hello", Some("text/plain"))
        .await
        .unwrap();
    assert!(outcome.is_success());

    supervisor.stop().await;
}

#[tokio::test]
async fn test_crash_during_request_restarts_worker() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31600), "stub.jar").unwrap();
    supervisor.start().await.unwrap();
    let gateway = gateway(5_000);

    let outcome = gateway.send(&mut supervisor, b"CRASH", None).await.unwrap();
    assert!(matches!(outcome, RequestOutcome::TransportError(_)));
    assert_eq!(supervisor.restart_count(), 1);
    assert!(supervisor.is_running());

    let outcome = gateway
        .send(&mut supervisor, b"MULTI", Some("application/pdf"))
        .await
        .unwrap();
    match outcome {
        RequestOutcome::Success(rows) => {
            assert_eq!(rows.get("Content-Type"), Some("application/pdf"));
            assert_eq!(rows.get_all("dc:creator"), vec!["alice", "bob"]);
        }
        other => panic!("expected success, got {:?}", other),
    }

    supervisor.stop().await;
}

#[tokio::test]
async fn test_unsupported_and_malformed_do_not_restart() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31700), "stub.jar").unwrap();
    let port = supervisor.start().await.unwrap();
    let gateway = gateway(5_000);

    let outcome = gateway
        .send(&mut supervisor, b"UNSUPPORTED", None)
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::UnsupportedFormat);

    let err = gateway
        .send(&mut supervisor, b"MALFORMED", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Decode(_)));

    assert_eq!(supervisor.restart_count(), 0);
    assert_eq!(supervisor.port(), Some(port));
    assert!(supervisor.is_running());

    supervisor.stop().await;
}

#[tokio::test]
async fn test_start_replaces_dead_worker() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31800), "stub.jar").unwrap();
    supervisor.start().await.unwrap();

    // Kill the worker behind the supervisor's back.
    let base_url = supervisor.base_url().unwrap();
    let _ = gateway(2_000).dispatch(&base_url, b"CRASH", None).await;
    for _ in 0..100 {
        if !supervisor.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!supervisor.is_running());

    supervisor.start().await.unwrap();
    assert!(supervisor.is_running());
    assert_eq!(supervisor.state(), WorkerState::Running);

    supervisor.stop().await;
}

#[tokio::test]
async fn test_restart_spawns_fresh_worker() {
    let mut supervisor = ProcessSupervisor::new(stub_settings(31900), "stub.jar").unwrap();
    supervisor.start().await.unwrap();

    supervisor.restart().await.unwrap();
    assert_eq!(supervisor.restart_count(), 1);
    assert!(supervisor.is_running());
    assert!(supervisor.uptime().unwrap() < Duration::from_secs(15));

    supervisor.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_ready_answer_from_orphaned_listener_is_rejected() {
    // The launched process hands the port to a background listener and exits
    // while that listener is still answering the first readiness probe.
    let script = r#""$STUB" -p "$4" & pid=$!; (sleep 3; kill $pid) & sleep 0.3; exit 4"#;
    let mut settings = stub_settings(33000);
    settings.runtime = "sh".to_string();
    settings.jvm_args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
    settings.probe_timeout_ms = 3_000;
    settings.env.insert(
        "STUB".to_string(),
        env!("CARGO_BIN_EXE_stub-worker").to_string(),
    );
    settings
        .env
        .insert("STUB_WORKER_VERSION_DELAY_MS".to_string(), "1000".to_string());
    let mut supervisor = ProcessSupervisor::new(settings, "stub.jar").unwrap();

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, WorkerError::WorkerExited { .. }), "got {:?}", err);
    assert_eq!(supervisor.state(), WorkerState::FailedToStart);
    assert!(!supervisor.is_running());
}
