//! HTTP Relay Integration Tests
//!
//! Runs the explorer and analysis clients against a local stub server and the
//! publisher against `sh`, covering the full fetch → analyze → publish chain.

mod common;

use std::time::Duration;

use common::{closed_port_url, StubResponse, StubServer};
use txnscope_relay::analysis::{AnalysisClient, AnalysisError, Analyzer, ANALYST_INSTRUCTION};
use txnscope_relay::config::{AnalysisConfig, ExplorerConfig, PublishConfig};
use txnscope_relay::fetcher::{EventSource, ExplorerClient, FetchError};
use txnscope_relay::normalizer::{normalize, Locale};
use txnscope_relay::pipeline::{CycleError, CycleOutcome, FailureKind, Pipeline};
use txnscope_relay::publisher::CommandPublisher;
use txnscope_relay::scheduler::final_response_line;
use txnscope_relay::store::FingerprintStore;

const ONE_TRANSFER: &str = r#"{"status":"1","message":"OK","result":[
    {"hash":"0xA","tokenName":"USDC","value":"1000000","tokenDecimal":"6","from":"0x1","to":"0x2"}
]}"#;

fn explorer(server: &StubServer) -> ExplorerClient {
    ExplorerClient::new(ExplorerConfig {
        base_url: server.url("/api"),
        api_key: "test-key".to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn analysis_client(server: &StubServer) -> AnalysisClient {
    AnalysisClient::new(AnalysisConfig {
        url: server.url("/command"),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

/// `sh -c script text`: the published text arrives as $0
fn shell_publisher(script: &str) -> CommandPublisher {
    CommandPublisher::new(PublishConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        timeout: Duration::from_secs(5),
    })
}

// ==================== Explorer client tests ====================

#[tokio::test]
async fn test_fetch_parses_transfers_and_sends_query() {
    let server = StubServer::start(vec![StubResponse::json(200, ONE_TRANSFER)]).await;
    let events = explorer(&server).fetch().await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].hash.as_deref(), Some("0xA"));

    let requests = server.requests();
    let query = requests[0].query().expect("explorer request");
    for (key, value) in [
        ("module", "account"),
        ("action", "tokentx"),
        ("address", txnscope_relay::config::DEFAULT_WATCH_ADDRESS),
        ("page", "1"),
        ("offset", "2"),
        ("startblock", "0"),
        ("endblock", "99999999"),
        ("sort", "asc"),
        ("apikey", "test-key"),
    ] {
        assert_eq!(query.get(key).map(String::as_str), Some(value), "param {}", key);
    }
}

#[tokio::test]
async fn test_fetch_http_500_is_status_error() {
    let server = StubServer::start(vec![StubResponse::json(500, "{}")]).await;
    let result = explorer(&server).fetch().await;
    assert_eq!(result, Err(FetchError::Status(500)));
}

#[tokio::test]
async fn test_fetch_non_list_result_is_empty() {
    let body = r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#;
    let server = StubServer::start(vec![StubResponse::json(200, body)]).await;
    assert_eq!(explorer(&server).fetch().await, Ok(vec![]));
}

#[tokio::test]
async fn test_fetch_html_body_is_malformed() {
    let server = StubServer::start(vec![StubResponse::json(200, "<html></html>")]).await;
    let result = explorer(&server).fetch().await;
    assert!(matches!(result, Err(FetchError::Malformed(_))));
}

#[tokio::test]
async fn test_fetch_connection_refused_is_transport_error() {
    let client = ExplorerClient::new(ExplorerConfig {
        base_url: closed_port_url().await,
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(client.fetch().await, Err(FetchError::Transport(_))));
}

#[tokio::test]
async fn test_fetch_times_out() {
    let server = StubServer::start(vec![
        StubResponse::json(200, ONE_TRANSFER).delayed(Duration::from_secs(5)),
    ])
    .await;
    let client = ExplorerClient::new(ExplorerConfig {
        base_url: server.url("/api"),
        timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(client.fetch().await, Err(FetchError::Transport(_))));
}

// ==================== Analysis client tests ====================

#[tokio::test]
async fn test_analyze_posts_command_and_normalizes_reply() {
    let server = StubServer::start(vec![StubResponse::json(
        200,
        r#"{"status":"success","result":"<think>counting</think>\n Small   USDC\n\nmove. "}"#,
    )])
    .await;

    let events = explorer_fixture();
    let digest = normalize(&events, &mut FingerprintStore::new(), Locale::English).unwrap();
    let result = analysis_client(&server).analyze(&digest).await.unwrap();

    assert_eq!(result.as_str(), "Small USDC move.");

    let requests = server.requests();
    let body = requests[0].json().expect("command request");
    let command = body["command"].as_str().unwrap();
    assert!(command.starts_with(ANALYST_INSTRUCTION));
    assert!(command.ends_with("from 0x1 sent 0.01 USDC to 0x2"));
}

#[tokio::test]
async fn test_analyze_non_2xx_is_status_error() {
    let server = StubServer::start(vec![StubResponse::json(502, "{}")]).await;
    let digest = normalize(&explorer_fixture(), &mut FingerprintStore::new(), Locale::English).unwrap();
    let result = analysis_client(&server).analyze(&digest).await;
    assert_eq!(result, Err(AnalysisError::Status(502)));
}

#[tokio::test]
async fn test_analyze_missing_result_is_malformed() {
    let server = StubServer::start(vec![StubResponse::json(200, r#"{"status":"success"}"#)]).await;
    let digest = normalize(&explorer_fixture(), &mut FingerprintStore::new(), Locale::English).unwrap();
    let result = analysis_client(&server).analyze(&digest).await;
    assert!(matches!(result, Err(AnalysisError::Malformed(_))));
}

fn explorer_fixture() -> Vec<txnscope_relay::TransferEvent> {
    txnscope_relay::fetcher::parse_explorer_body(ONE_TRANSFER).unwrap()
}

// ==================== End-to-end cycle tests ====================

#[cfg(unix)]
#[tokio::test]
async fn test_full_cycle_then_no_new_events() {
    let explorer_server = StubServer::start(vec![StubResponse::json(200, ONE_TRANSFER)]).await;
    let analysis_server =
        StubServer::start(vec![StubResponse::json(200, r#"{"result":"Quiet stablecoin flow."}"#)]).await;

    let mut pipeline = Pipeline::new(
        explorer(&explorer_server),
        analysis_client(&analysis_server),
        shell_publisher(r#"echo "cast: $0""#),
        Locale::English,
    );

    let first = pipeline.run_cycle().await;
    assert_eq!(
        final_response_line(&first),
        "FINAL_RESPONSE: cast: Quiet stablecoin flow."
    );

    let second = pipeline.run_cycle().await;
    assert_eq!(second, CycleOutcome::NoNewEvents);
    assert_eq!(final_response_line(&second), "FINAL_RESPONSE: No new transactions.");

    assert_eq!(explorer_server.request_count(), 2);
    assert_eq!(analysis_server.request_count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_explorer_500_never_reaches_analysis() {
    let explorer_server = StubServer::start(vec![StubResponse::json(500, "")]).await;
    let analysis_server = StubServer::start(vec![StubResponse::json(200, r#"{"result":"x"}"#)]).await;

    let mut pipeline = Pipeline::new(
        explorer(&explorer_server),
        analysis_client(&analysis_server),
        shell_publisher("exit 0"),
        Locale::English,
    );

    let outcome = pipeline.run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Failed(CycleError::Fetch(FetchError::Status(500))));
    assert_eq!(analysis_server.request_count(), 0);
    assert!(pipeline.store().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_analysis_failure_skips_publisher() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("published");

    let explorer_server = StubServer::start(vec![StubResponse::json(200, ONE_TRANSFER)]).await;
    let analysis_server = StubServer::start(vec![StubResponse::json(503, "{}")]).await;

    let mut pipeline = Pipeline::new(
        explorer(&explorer_server),
        analysis_client(&analysis_server),
        shell_publisher(&format!("touch {}", marker.display())),
        Locale::English,
    );

    let outcome = pipeline.run_cycle().await;
    match &outcome {
        CycleOutcome::Failed(e) => assert_eq!(e.kind(), FailureKind::Transport),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!marker.exists());
    assert!(final_response_line(&outcome).starts_with("FINAL_RESPONSE: Error: analysis failed"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_publisher_failure_is_recoverable() {
    let explorer_server = StubServer::start(vec![StubResponse::json(200, ONE_TRANSFER)]).await;
    let analysis_server = StubServer::start(vec![StubResponse::json(200, r#"{"result":"ok"}"#)]).await;

    let mut pipeline = Pipeline::new(
        explorer(&explorer_server),
        analysis_client(&analysis_server),
        shell_publisher("echo 'bad api key' >&2; exit 1"),
        Locale::English,
    );

    let outcome = pipeline.run_cycle().await;
    match &outcome {
        CycleOutcome::Failed(e) => assert_eq!(e.kind(), FailureKind::ExternalProcess),
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Next cycle still runs; the transfer is already marked as seen
    assert_eq!(pipeline.run_cycle().await, CycleOutcome::NoNewEvents);
}
