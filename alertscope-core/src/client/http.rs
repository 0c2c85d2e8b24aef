//! HTTP client for the investigation backend
//!
//! Endpoints (relative to `backend.base_url`):
//!
//! | Method | Path | Returns |
//! |--------|------|---------|
//! | GET | `/investigation_outcomes` (configurable) | array of raw records |
//! | GET | `/alert/{alert_id}/result` | one raw record |
//! | GET | `/alert/{alert_id}/history` | [`AlertHistory`] |
//! | GET | `/investigation_stats` | [`ServerStats`] |
//! | GET | `/health` | [`HealthStatus`] |
//! | POST | `/investigate_alert/{alert_id}` | one raw record |
//! | POST | `/process_pending_alerts?limit=N` | [`ProcessedBatch`] |
//!
//! Requests are not retried; any non-2xx status is reported as
//! [`Error::Transport`]. A 2xx body carrying an `error` field is
//! [`Error::Backend`]. The two POST endpoints run investigations and use
//! `backend.investigation_timeout_secs` instead of the regular timeout.

use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::normalize::{self, parse_flag};
use crate::types::{InvestigationRecord, Outcome};

use super::RecordSource;

/// Response from GET /health
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// "healthy" when the backend is up
    pub status: String,
    /// Names of the analysis agents the backend has loaded
    #[serde(default)]
    pub agents: Vec<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Response from POST /process_pending_alerts
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessedBatch {
    pub processed_count: usize,
    /// One investigation result per processed alert, as sent
    pub results: Vec<Value>,
}

impl ProcessedBatch {
    /// Normalize each result; failed investigations come back as errors
    pub fn investigations(&self) -> Vec<Result<InvestigationRecord>> {
        self.results
            .iter()
            .cloned()
            .map(investigation_result)
            .collect()
    }
}

/// Response from GET /investigation_stats, aggregated over everything the
/// backend has stored
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerStats {
    pub total_investigations: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub under_investigation: u64,
    /// Counts grouped by outcome and suspicion flag
    pub outcomes: Vec<OutcomeGroup>,
}

/// One `(final_outcome, is_suspicious)` group of [`ServerStats`]
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutcomeGroup {
    pub final_outcome: Option<String>,
    pub is_suspicious: Option<Value>,
    pub count: u64,
    pub avg_confidence: Option<f64>,
}

impl OutcomeGroup {
    pub fn outcome(&self) -> Outcome {
        self.final_outcome
            .as_deref()
            .map(Outcome::from)
            .unwrap_or(Outcome::Unknown)
    }

    pub fn suspicion(&self) -> Option<bool> {
        self.is_suspicious.as_ref().and_then(parse_flag)
    }
}

/// Response from GET /alert/{alert_id}/history
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertHistory {
    pub alert_id: String,
    /// Agent decisions in the order they were made
    pub judgements: Vec<AgentJudgement>,
    /// Raw outcome row, `None` while the alert has no outcome yet
    pub outcome: Option<Value>,
}

impl AlertHistory {
    pub fn outcome_record(&self) -> Option<InvestigationRecord> {
        let value = self.outcome.clone()?;
        normalize::normalize_value(value).ok()
    }
}

/// One agent decision recorded during an investigation
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentJudgement {
    pub judgement_id: Option<String>,
    pub agent_name: String,
    pub action: String,
    pub confidence: Option<f64>,
    /// JSON-encoded rationale
    pub rationale_json: Option<String>,
    pub timestamp: Option<String>,
    pub loop_iteration: Option<i64>,
    /// JSON-encoded list of queries the agent ran
    pub queries_executed: Option<String>,
}

impl AgentJudgement {
    pub fn rationale(&self) -> Option<Value> {
        serde_json::from_str(self.rationale_json.as_deref()?).ok()
    }

    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        normalize::parse_timestamp(self.timestamp.as_deref()?)
    }

    pub fn query_count(&self) -> usize {
        self.queries_executed
            .as_deref()
            .and_then(|q| serde_json::from_str::<Vec<Value>>(q).ok())
            .map_or(0, |q| q.len())
    }
}

/// HTTP client for the investigation API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    outcomes_path: String,
    investigation_timeout: Duration,
}

impl HttpBackend {
    /// Create a new backend client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            outcomes_path: config.outcomes_path.clone(),
            investigation_timeout: config.investigation_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check backend health
    ///
    /// Connection failures are returned as errors so callers can show why
    /// the backend is unreachable.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Run a fresh investigation of one alert and return its result
    pub async fn investigate_alert(&self, alert_id: &str) -> Result<InvestigationRecord> {
        let url = format!(
            "{}/investigate_alert/{}",
            self.base_url,
            urlencoding::encode(alert_id)
        );
        let body = self.post_text(&url).await?;
        let record = investigation_result(serde_json::from_str(&body)?)?;

        tracing::info!(
            alert_id = %record.alert_id,
            outcome = %record.outcome.as_str(),
            "Investigation complete"
        );
        Ok(record)
    }

    /// Investigate a batch of pending alerts; the backend picks the batch
    /// size when `limit` is `None`
    pub async fn process_pending_alerts(&self, limit: Option<u32>) -> Result<ProcessedBatch> {
        let url = match limit {
            Some(limit) => format!("{}/process_pending_alerts?limit={}", self.base_url, limit),
            None => format!("{}/process_pending_alerts", self.base_url),
        };
        let body = self.post_text(&url).await?;
        let batch: ProcessedBatch =
            serde_json::from_value(reject_error_body(serde_json::from_str(&body)?)?)?;

        tracing::info!(processed = batch.processed_count, "Pending alerts processed");
        Ok(batch)
    }

    /// Aggregate statistics over every stored investigation
    pub async fn investigation_stats(&self) -> Result<ServerStats> {
        let url = format!("{}/investigation_stats", self.base_url);
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_value(reject_error_body(
            serde_json::from_str(&body)?,
        )?)?)
    }

    /// Agent decisions and stored outcome for one alert
    pub async fn alert_history(&self, alert_id: &str) -> Result<AlertHistory> {
        let url = format!(
            "{}/alert/{}/history",
            self.base_url,
            urlencoding::encode(alert_id)
        );
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_value(reject_error_body(
            serde_json::from_str(&body)?,
        )?)?)
    }

    /// GET a URL and return the body of a 2xx response
    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "GET");
        self.send(self.http_client.get(url)).await
    }

    /// POST to a URL with an empty body and the investigation timeout
    async fn post_text(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "POST");
        self.send(self.http_client.post(url).timeout(self.investigation_timeout))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .text()
                .await
                .map_err(|e| Error::Transport(format!("failed to read response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status,
                error_detail(&error_text)
            )))
        }
    }
}

impl RecordSource for HttpBackend {
    async fn fetch_records(&self) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, self.outcomes_path);
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_record(&self, alert_id: &str) -> Result<Value> {
        let url = format!(
            "{}/alert/{}/result",
            self.base_url,
            urlencoding::encode(alert_id)
        );
        let body = self.get_text(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Prefer the `detail` field of a JSON error body, otherwise the raw text
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Turn a 2xx body of the form `{"error": ...}` into [`Error::Backend`]
fn reject_error_body(value: Value) -> Result<Value> {
    let message = match value.get("error") {
        None | Some(Value::Null) => return Ok(value),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    match value.get("alert_id").and_then(Value::as_str) {
        Some(alert_id) => Err(Error::Backend(format!("alert {}: {}", alert_id, message))),
        None => Err(Error::Backend(message)),
    }
}

fn investigation_result(value: Value) -> Result<InvestigationRecord> {
    normalize::normalize_value(reject_error_body(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_requires_valid_config() {
        let config = BackendConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(HttpBackend::new(&config).is_err());
    }

    #[test]
    fn test_backend_trims_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Investigation result not found."}"#),
            "Investigation result not found."
        );
        assert_eq!(error_detail(" Internal Server Error \n"), "Internal Server Error");
    }

    #[test]
    fn test_error_body_is_backend_error() {
        let err = reject_error_body(serde_json::json!({
            "alert_id": "ALT-9",
            "error": "Alert not found: ALT-9",
            "outcome": "ERROR",
            "is_suspicious": null
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Backend(ref m) if m == "alert ALT-9: Alert not found: ALT-9"));

        let err = reject_error_body(serde_json::json!({"error": "Orchestrator not initialized."}))
            .unwrap_err();
        assert_eq!(err.to_string(), "backend error: Orchestrator not initialized.");

        let ok = serde_json::json!({"alert_id": "ALT-1", "error": null});
        assert_eq!(reject_error_body(ok.clone()).unwrap(), ok);
    }

    #[test]
    fn test_processed_batch_splits_failures() {
        let batch: ProcessedBatch = serde_json::from_str(
            r#"{"processed_count": 2, "results": [
                {"alert_id": "ALT-1", "outcome": "ESCALATE", "is_suspicious": true, "confidence": 0.9},
                {"alert_id": "ALT-2", "error": "LLM timeout", "outcome": "ERROR", "is_suspicious": null}
            ]}"#,
        )
        .unwrap();

        let investigations = batch.investigations();
        assert_eq!(investigations.len(), 2);
        assert_eq!(
            investigations[0].as_ref().unwrap().outcome,
            Outcome::Escalate
        );
        assert!(matches!(investigations[1], Err(Error::Backend(_))));
    }

    #[test]
    fn test_agent_judgement_accessors() {
        let judgement: AgentJudgement = serde_json::from_str(
            r#"{
                "judgement_id": "j-1",
                "alert_id": "ALT-1",
                "agent_name": "risk",
                "action": "ESCALATE",
                "confidence": 0.8,
                "rationale_json": "{\"summary\": \"amount spike\"}",
                "timestamp": "2025-08-05T14:30:12.5",
                "loop_iteration": 1,
                "queries_executed": "[\"SELECT 1\", \"SELECT 2\"]"
            }"#,
        )
        .unwrap();

        assert_eq!(judgement.rationale().unwrap()["summary"], "amount spike");
        assert!(judgement.recorded_at().is_some());
        assert_eq!(judgement.query_count(), 2);

        let bare = AgentJudgement::default();
        assert!(bare.rationale().is_none());
        assert_eq!(bare.query_count(), 0);
    }

    #[test]
    fn test_outcome_group_suspicion() {
        let group: OutcomeGroup = serde_json::from_str(
            r#"{"final_outcome": "AUTO_CLOSE", "is_suspicious": 0, "count": 3, "avg_confidence": 0.2}"#,
        )
        .unwrap();
        assert_eq!(group.outcome(), Outcome::AutoClose);
        assert_eq!(group.suspicion(), Some(false));

        let group: OutcomeGroup =
            serde_json::from_str(r#"{"final_outcome": null, "is_suspicious": null, "count": 1}"#)
                .unwrap();
        assert_eq!(group.outcome(), Outcome::Unknown);
        assert_eq!(group.suspicion(), None);
    }

    #[test]
    fn test_health_status() {
        let status: HealthStatus =
            serde_json::from_str(r#"{"status": "healthy", "agents": ["ingestion", "risk"]}"#)
                .unwrap();
        assert!(status.is_healthy());
        assert_eq!(status.agents.len(), 2);

        let status: HealthStatus = serde_json::from_str(r#"{"status": "degraded"}"#).unwrap();
        assert!(!status.is_healthy());
    }
}
