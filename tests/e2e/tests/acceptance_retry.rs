//! Acceptance client scenarios against a scripted server.

use exam_acceptance::{AcceptanceConfig, AcceptanceError, RestClient, RestRequest, SessionSpec};
use exam_e2e::{Reply, ScriptedServer, TestHarness};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn session(retries: u32, backoff_ms: u64) -> SessionSpec {
    SessionSpec {
        retries,
        backoff_ms,
        ..SessionSpec::default()
    }
}

// ============================================================================
// Retry Budget
// ============================================================================

#[tokio::test]
async fn test_ready_on_last_attempt() {
    let server = Arc::new(ScriptedServer::ready_after(5, 200));
    let client = RestClient::with_transport(session(2, 0), server.clone());

    let response = client
        .get_with_retry(&RestRequest::new("/system/console"))
        .await
        .then()
        .status_code(200)
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(server.requests().len(), 6);
    assert!(server.requests().iter().all(|(method, _)| method == "GET"));
}

#[tokio::test]
async fn test_never_ready_reports_no_response() {
    let server = Arc::new(ScriptedServer::ready_after(6, 200));
    let client = RestClient::with_transport(session(2, 0), server.clone());

    let result = client.get_with_retry(&RestRequest::new("/health")).await;
    assert_eq!(result.attempts_used(), 6);
    assert!(matches!(result.status_code(200), Err(AcceptanceError::NoResponse)));
}

#[tokio::test]
async fn test_refused_connections_report_last_error() {
    let server = Arc::new(ScriptedServer::new(
        (1..=6).map(|i| Reply::Refuse(format!("connection refused ({i})"))),
    ));
    let client = RestClient::with_transport(session(2, 0), server);

    let err = client
        .get_with_retry(&RestRequest::new("/health"))
        .await
        .status_code(200)
        .unwrap_err();
    assert!(err.is_retries_exhausted());
    assert_eq!(
        std::error::Error::source(&err).unwrap().to_string(),
        "connection refused (6)"
    );
}

// ============================================================================
// Interruption
// ============================================================================

#[tokio::test]
async fn test_cancellation_stops_retrying() {
    let server = Arc::new(ScriptedServer::default());
    let cancel = CancellationToken::new();
    let client = RestClient::with_transport(session(100, 20), server.clone())
        .with_cancellation(cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    let result = client.get_with_retry(&RestRequest::new("/health")).await;
    canceller.await.unwrap();

    assert!(result.attempts_used() < 300);
    assert!(matches!(result.status_code(200), Err(AcceptanceError::Interrupted)));
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_session_from_exam_toml() {
    let harness = TestHarness::with_defaults().unwrap();
    let path = harness.data_dir().join("acceptance.toml");
    std::fs::write(
        &path,
        "[acceptance.session]\nport = 8282\nretries = 1\nbackoff_ms = 0\n",
    )
    .unwrap();

    let config = AcceptanceConfig::load_from(&path).unwrap();
    assert_eq!(config.session.port, 8282);
    assert_eq!(config.session.attempt_budget(), 3);

    let server = Arc::new(ScriptedServer::ready_after(2, 204));
    let client = RestClient::with_transport(config.session, server);
    let result = client.get_with_retry(&RestRequest::new("/")).await;
    assert_eq!(result.attempts_used(), 3);
    assert_eq!(result.status_code(204).unwrap().status, 204);
}
