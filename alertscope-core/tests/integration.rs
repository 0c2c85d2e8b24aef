//! Integration tests for the alertscope store and backend client
//!
//! These tests use fixture files in `tests/fixtures/` shaped like the
//! investigation backend's responses, served either from memory or from a
//! throwaway local HTTP server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use alertscope_core::client::{HttpBackend, OutcomeGroup, RecordSource};
use alertscope_core::config::BackendConfig;
use alertscope_core::views::filter_by_date_on;
use alertscope_core::{
    AgentKind, DateFilter, DetailSource, Error, InvestigationStats, InvestigationStore,
    LoadOutcome, Outcome, OutcomeFilter, ReviewQueue, ReviewTab, Result,
};
use chrono::NaiveDate;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_text(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture should exist")
}

fn fixture_json(name: &str) -> Value {
    serde_json::from_str(&fixture_text(name)).expect("fixture should be valid JSON")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================
// In-memory source
// ============================================

/// Serves queued list responses in order, plus fixed detail responses.
struct FixtureSource {
    lists: Mutex<Vec<Result<Vec<Value>>>>,
    details: HashMap<String, Value>,
}

impl FixtureSource {
    fn new(lists: Vec<Result<Vec<Value>>>) -> Self {
        Self {
            lists: Mutex::new(lists.into_iter().rev().collect()),
            details: HashMap::new(),
        }
    }

    fn with_detail(mut self, alert_id: &str, value: Value) -> Self {
        self.details.insert(alert_id.to_string(), value);
        self
    }
}

impl RecordSource for FixtureSource {
    async fn fetch_records(&self) -> Result<Vec<Value>> {
        self.lists
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(Error::Transport("no more responses".to_string())))
    }

    async fn fetch_record(&self, alert_id: &str) -> Result<Value> {
        self.details
            .get(alert_id)
            .cloned()
            .ok_or_else(|| Error::Transport("API error (404 Not Found)".to_string()))
    }
}

fn outcomes_fixture() -> Vec<Value> {
    match fixture_json("investigation_outcomes.json") {
        Value::Array(items) => items,
        other => panic!("expected array fixture, got {other}"),
    }
}

// ============================================
// Store Tests
// ============================================

#[tokio::test]
async fn test_load_drops_record_without_alert_id() {
    alertscope_core::logging::init_test();
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())]);
    let mut store = InvestigationStore::new();

    let snapshot = store.load(&source).await.expect("load should succeed");

    let ids: Vec<_> = snapshot.iter().map(|r| r.alert_id.as_str()).collect();
    assert_eq!(ids, vec!["ALT-1001", "ALT-1002", "ALT-1004", "ALT-1005"]);

    let first = &snapshot[0];
    assert_eq!(first.outcome, Outcome::Escalate);
    assert!(first.is_suspicious);
    assert_eq!(first.confidence, Some(0.92));
    assert!(!first.human_verified);
    assert!(first.agent_outputs.is_empty());
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_records() {
    let source = FixtureSource::new(vec![
        Ok(outcomes_fixture()),
        Err(Error::Transport("API error (500 Internal Server Error): boom".to_string())),
    ]);
    let mut store = InvestigationStore::new();

    store.load(&source).await.unwrap();
    let before = store.snapshot();

    let err = store.load(&source).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(store.records(), &before[..]);
    assert_eq!(store.records().len(), 4);
}

#[tokio::test]
async fn test_review_queue_over_loaded_records() {
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())]);
    let mut store = InvestigationStore::new();
    store.load(&source).await.unwrap();

    let mut queue = ReviewQueue::new();
    let today = date(2025, 8, 5);

    let view = queue.view_on(store.records(), today);
    let ids: Vec<_> = view.rows.iter().map(|r| r.alert_id.as_str()).collect();
    assert_eq!(ids, vec!["ALT-1001", "ALT-1004", "ALT-1005"]);
    assert_eq!(
        view.outcome_choices.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["AUTO_CLOSE", "ESCALATE", "HUMAN_REVIEW"]
    );

    queue.set_date_filter(DateFilter::Today);
    queue.set_outcome_filter(OutcomeFilter::parse("HUMAN_REVIEW"));
    let view = queue.view_on(store.records(), today);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].alert_id, "ALT-1004");

    queue.select_tab(ReviewTab::Reviewed);
    assert_eq!(queue.outcome_filter(), &OutcomeFilter::All);
    let view = queue.view_on(store.records(), today);
    assert!(view.rows.is_empty());

    let partition = store.partition_by_review();
    let reviewed_only_custom = filter_by_date_on(
        &partition.reviewed,
        DateFilter::Custom {
            start: Some(date(2025, 8, 4)),
            end: Some(date(2025, 8, 4)),
        },
        today,
    );
    assert_eq!(reviewed_only_custom.len(), 1);
    assert_eq!(reviewed_only_custom[0].alert_id, "ALT-1002");
}

#[tokio::test]
async fn test_stats_over_loaded_records() {
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())]);
    let mut store = InvestigationStore::new();
    store.load(&source).await.unwrap();

    let stats = InvestigationStats::from_records(store.records());
    assert_eq!(stats.total_investigations, 4);
    assert_eq!(stats.true_positives, 2);
    assert_eq!(stats.false_positives, 2);
    assert_eq!(stats.under_investigation, 1);
    assert_eq!(stats.human_verified, 1);
}

#[tokio::test]
async fn test_interleaved_loads_keep_newest_response() {
    let mut store = InvestigationStore::new();

    let slow = store.begin_load();
    let fast = store.begin_load();

    let newer = vec![serde_json::json!({"alert_id": "NEW", "final_outcome": "ESCALATE"})];
    store.complete_load(fast, Ok(newer)).unwrap();

    let outcome = store.complete_load(slow, Ok(outcomes_fixture())).unwrap();
    assert!(matches!(outcome, LoadOutcome::Stale { .. }));
    assert_eq!(store.records().len(), 1);
    assert_eq!(store.records()[0].alert_id, "NEW");
}

#[tokio::test]
async fn test_detail_uses_backend_result() {
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())])
        .with_detail("ALT-1001", fixture_json("alert_result.json"));
    let mut store = InvestigationStore::new();
    store.load(&source).await.unwrap();

    let detail = store.detail(&source, "ALT-1001").await.unwrap();
    assert_eq!(detail.source, DetailSource::Backend);
    assert!(detail.fetch_error.is_none());

    let record = detail.record;
    assert_eq!(record.risk_factors.len(), 2);
    assert_eq!(record.loops_executed, 1);
    assert_eq!(record.total_queries, 6);
    assert!(record.agent_outputs.stages().iter().all(|s| s.completed));

    let pattern = record.agent_outputs.pattern_recognition.as_ref().unwrap();
    assert_eq!(pattern.llm_analysis.as_ref().unwrap().patterns.len(), 2);
    assert!(pattern.rules_used[0].matched);

    let risk = record.agent_outputs.risk_assessment.as_ref().unwrap();
    assert_eq!(risk.risk_level.as_deref(), Some("HIGH"));

    let explanation = record.agent_outputs.explanation.as_ref().unwrap();
    assert_eq!(explanation.evidence_summary.as_ref().unwrap().total_data_points, 42);
    assert_eq!(explanation.investigation_trail[0].agent, "PatternRecognitionAgent");

    let parsed = record.parsed_explanation().unwrap();
    assert_eq!(parsed.title, "Alert Explanation");
    assert_eq!(parsed.description, "This is the overview.");
    assert_eq!(parsed.key_observations.len(), 2);
    assert_eq!(parsed.key_observations[1].title, "New Payee");
    assert_eq!(parsed.conclusion, "Escalate for manual review.");
}

#[tokio::test]
async fn test_detail_keeps_list_fields_the_result_omits() {
    let result = serde_json::json!({
        "alert_id": "ALT-1002",
        "outcome": "AUTO_CLOSE",
        "outcome_type": "false_positive",
        "is_suspicious": false,
        "confidence": 0.12,
        "investigation_summary": "LOW RISK: routine payroll transfer.",
        "risk_factors": [],
        "loops_executed": 1,
        "total_queries": 4,
        "agent_outputs": {}
    });
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())]).with_detail("ALT-1002", result);
    let mut store = InvestigationStore::new();
    store.load(&source).await.unwrap();

    let detail = store.detail(&source, "ALT-1002").await.unwrap();
    assert_eq!(detail.source, DetailSource::Backend);

    let record = detail.record;
    assert!(record.human_verified);
    assert_eq!(record.local_date(), Some(date(2025, 8, 4)));
    assert_eq!(
        record.raw_timestamp.as_deref(),
        Some("2025-08-04T09:12:45.000001")
    );
    assert_eq!(
        record.outcome_id.as_deref(),
        Some("3f1c9a52-0d7e-4b1e-9d55-8f2b6c1a0002")
    );
    assert_eq!(record.total_queries, 4);
}

#[tokio::test]
async fn test_detail_falls_back_to_loaded_record() {
    let source = FixtureSource::new(vec![Ok(outcomes_fixture())]);
    let mut store = InvestigationStore::new();
    store.load(&source).await.unwrap();

    let detail = store.detail(&source, "ALT-1004").await.unwrap();
    assert_eq!(detail.source, DetailSource::Loaded);
    assert!(detail.fetch_error.unwrap().is_transport());
    assert_eq!(detail.record.outcome, Outcome::HumanReview);
    assert!(detail.record.parsed_explanation().is_none());
    assert!(!detail.record.agent_outputs.has_output(AgentKind::Explanation));
}

#[tokio::test]
async fn test_detail_without_fallback_is_error() {
    let source = FixtureSource::new(vec![]);
    let store = InvestigationStore::new();

    assert!(store.detail(&source, "ALT-404").await.is_err());
}

// ============================================
// HTTP Backend Tests
// ============================================

/// Start a one-route-per-path HTTP server and return its base URL.
///
/// Each route maps a request path to a status line and body.
async fn spawn_server(routes: Vec<(&'static str, &'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: HashMap<&'static str, (&'static str, String)> = routes
        .into_iter()
        .map(|(path, status, body)| (path, (status, body)))
        .collect();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let request = String::from_utf8_lossy(&request);
            let path = request.split_whitespace().nth(1).unwrap_or("/");
            let (status, body) = routes
                .get(path)
                .cloned()
                .unwrap_or(("404 Not Found", r#"{"detail": "Not Found"}"#.to_string()));

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

fn backend_for(base_url: String) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        base_url,
        timeout_secs: 5,
        ..Default::default()
    })
    .expect("valid backend config")
}

#[tokio::test]
async fn test_http_load_and_detail() {
    let base_url = spawn_server(vec![
        (
            "/investigation_outcomes",
            "200 OK",
            fixture_text("investigation_outcomes.json"),
        ),
        (
            "/alert/ALT-1001/result",
            "200 OK",
            fixture_text("alert_result.json"),
        ),
        (
            "/health",
            "200 OK",
            r#"{"status": "healthy", "agents": ["ingestion", "pattern", "explanation", "risk"]}"#
                .to_string(),
        ),
    ])
    .await;
    let backend = backend_for(base_url);

    let mut store = InvestigationStore::new();
    let snapshot = store.load(&backend).await.expect("load over HTTP");
    assert_eq!(snapshot.len(), 4);

    let detail = store.detail(&backend, "ALT-1001").await.unwrap();
    assert_eq!(detail.source, DetailSource::Backend);
    assert_eq!(detail.record.parsed_explanation().unwrap().key_observations.len(), 2);

    let health = backend.health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.agents.len(), 4);
}

#[tokio::test]
async fn test_http_500_keeps_store_and_reports_transport_error() {
    alertscope_core::logging::init_test();
    let good = spawn_server(vec![(
        "/investigation_outcomes",
        "200 OK",
        fixture_text("investigation_outcomes.json"),
    )])
    .await;
    let failing = spawn_server(vec![(
        "/investigation_outcomes",
        "500 Internal Server Error",
        r#"{"detail": "Orchestrator not initialized."}"#.to_string(),
    )])
    .await;

    let mut store = InvestigationStore::new();
    store.load(&backend_for(good)).await.unwrap();
    let before = store.snapshot();

    let err = store.load(&backend_for(failing)).await.unwrap_err();
    match &err {
        Error::Transport(msg) => {
            assert!(msg.contains("500"), "unexpected message: {msg}");
            assert!(msg.contains("Orchestrator not initialized."));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(store.records(), &before[..]);
}

#[tokio::test]
async fn test_http_non_array_body_is_json_error() {
    let base_url = spawn_server(vec![(
        "/investigation_outcomes",
        "200 OK",
        r#"{"error": "Orchestrator not initialized."}"#.to_string(),
    )])
    .await;

    let mut store = InvestigationStore::new();
    let err = store.load(&backend_for(base_url)).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_http_detail_404_falls_back() {
    let base_url = spawn_server(vec![(
        "/investigation_outcomes",
        "200 OK",
        fixture_text("investigation_outcomes.json"),
    )])
    .await;
    let backend = backend_for(base_url);

    let mut store = InvestigationStore::new();
    store.load(&backend).await.unwrap();

    let detail = store.detail(&backend, "ALT-1002").await.unwrap();
    assert_eq!(detail.source, DetailSource::Loaded);
    assert_eq!(detail.record.outcome, Outcome::AutoClose);
}

#[tokio::test]
async fn test_http_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = backend_for(format!("http://{}", addr));
    let err = backend.fetch_records().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_http_investigate_alert() {
    let base_url = spawn_server(vec![
        (
            "/investigate_alert/ALT-1001",
            "200 OK",
            fixture_text("alert_result.json"),
        ),
        (
            "/investigate_alert/ALT-404",
            "200 OK",
            r#"{"alert_id": "ALT-404", "error": "Alert not found: ALT-404", "outcome": "ERROR", "is_suspicious": null}"#
                .to_string(),
        ),
    ])
    .await;
    let backend = backend_for(base_url);

    let record = backend.investigate_alert("ALT-1001").await.unwrap();
    assert_eq!(record.outcome, Outcome::Escalate);
    assert_eq!(record.suspicion, Some(true));
    assert_eq!(record.parsed_explanation().unwrap().key_observations.len(), 2);

    let err = backend.investigate_alert("ALT-404").await.unwrap_err();
    match err {
        Error::Backend(msg) => assert!(msg.contains("Alert not found"), "got {msg}"),
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_process_pending_alerts() {
    let results = format!(
        r#"{{"processed_count": 2, "results": [{}, {{"alert_id": "ALT-1009", "error": "LLM timeout", "outcome": "ERROR", "is_suspicious": null}}]}}"#,
        fixture_text("alert_result.json")
    );
    let base_url = spawn_server(vec![
        ("/process_pending_alerts?limit=3", "200 OK", results),
        (
            "/process_pending_alerts",
            "200 OK",
            r#"{"processed_count": 0, "results": []}"#.to_string(),
        ),
    ])
    .await;
    let backend = backend_for(base_url);

    let batch = backend.process_pending_alerts(Some(3)).await.unwrap();
    assert_eq!(batch.processed_count, 2);

    let investigations = batch.investigations();
    assert_eq!(investigations[0].as_ref().unwrap().alert_id, "ALT-1001");
    assert!(matches!(investigations[1], Err(Error::Backend(_))));

    let empty = backend.process_pending_alerts(None).await.unwrap();
    assert_eq!(empty.processed_count, 0);
    assert!(empty.results.is_empty());
}

#[tokio::test]
async fn test_http_investigation_stats() {
    let base_url = spawn_server(vec![(
        "/investigation_stats",
        "200 OK",
        fixture_text("investigation_stats.json"),
    )])
    .await;

    let stats = backend_for(base_url).investigation_stats().await.unwrap();
    assert_eq!(stats.total_investigations, 5);
    assert_eq!(stats.true_positives, 3);
    assert_eq!(stats.false_positives, 2);
    assert_eq!(stats.under_investigation, 1);
    assert_eq!(stats.outcomes.len(), 3);

    let review: &OutcomeGroup = &stats.outcomes[2];
    assert_eq!(review.outcome(), Outcome::HumanReview);
    assert_eq!(review.suspicion(), Some(true));
    assert_eq!(review.avg_confidence, Some(0.61));
}

#[tokio::test]
async fn test_http_investigation_stats_without_orchestrator() {
    let base_url = spawn_server(vec![(
        "/investigation_stats",
        "200 OK",
        r#"{"error": "Orchestrator not initialized."}"#.to_string(),
    )])
    .await;

    let err = backend_for(base_url).investigation_stats().await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_http_alert_history() {
    let base_url = spawn_server(vec![
        (
            "/alert/ALT-1001/history",
            "200 OK",
            fixture_text("alert_history.json"),
        ),
        (
            "/alert/ALT-1003/history",
            "200 OK",
            r#"{"alert_id": "ALT-1003", "judgements": [], "outcome": null}"#.to_string(),
        ),
    ])
    .await;
    let backend = backend_for(base_url);

    let history = backend.alert_history("ALT-1001").await.unwrap();
    assert_eq!(history.alert_id, "ALT-1001");
    assert_eq!(history.judgements.len(), 2);
    assert_eq!(history.judgements[0].agent_name, "pattern");
    assert_eq!(history.judgements[0].query_count(), 2);
    assert_eq!(history.judgements[1].action, "ESCALATE");
    assert_eq!(
        history.judgements[1].rationale().unwrap()["risk_level"],
        "HIGH"
    );

    let outcome = history.outcome_record().unwrap();
    assert_eq!(outcome.outcome, Outcome::Escalate);
    assert_eq!(outcome.local_date(), Some(date(2025, 8, 5)));

    let pending = backend.alert_history("ALT-1003").await.unwrap();
    assert!(pending.judgements.is_empty());
    assert!(pending.outcome_record().is_none());
}

#[tokio::test]
async fn test_http_post_error_reports_status() {
    let base_url = spawn_server(vec![(
        "/investigate_alert/ALT-1001",
        "500 Internal Server Error",
        r#"{"detail": "Alert not found: ALT-1001"}"#.to_string(),
    )])
    .await;

    let err = backend_for(base_url)
        .investigate_alert("ALT-1001")
        .await
        .unwrap_err();
    match err {
        Error::Transport(msg) => {
            assert!(msg.contains("500"), "got {msg}");
            assert!(msg.contains("Alert not found: ALT-1001"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}
