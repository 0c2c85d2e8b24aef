//! Normalization of raw backend payloads
//!
//! The list endpoint and the detail endpoint describe the same investigation
//! with different field names and loosely typed values:
//!
//! | Canonical | Accepted sources |
//! |-----------|------------------|
//! | `outcome` | `outcome`, then `final_outcome` (blank strings are skipped) |
//! | `confidence` | `confidence`, then `confidence_score` (number or numeric string) |
//! | `is_suspicious`, `human_verified` | `true`/`false`, `0`/`1`, `"true"`/`"1"`, `null` |
//! | `alert_id` | string or integer |
//!
//! Everything is resolved here so the rest of the crate only sees
//! [`InvestigationRecord`].
//!
//! # Error Handling
//!
//! A single bad element never fails the batch. Elements that are not JSON
//! objects, or that lack an `alert_id`, are dropped and reported as
//! [`NormalizeWarning`]s. Any other field of the wrong type is ignored with a
//! warning and the record is kept. Agent outputs that do not match their
//! typed shape are kept as opaque JSON under [`AgentOutputs::other`].

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{
    AgentKind, AgentOutputs, ExplanationOutput, InvestigationRecord, Outcome, OutcomeType,
    PatternRecognitionOutput, RiskAssessmentOutput,
};

/// Investigation record exactly as the backend sends it.
///
/// Every field is untyped JSON so one mistyped value cannot reject the
/// whole element; coercion happens in [`normalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInvestigationRecord {
    pub alert_id: Option<Value>,
    pub outcome: Option<Value>,
    pub final_outcome: Option<Value>,
    pub outcome_type: Option<Value>,
    pub is_suspicious: Option<Value>,
    pub confidence: Option<Value>,
    pub confidence_score: Option<Value>,
    pub investigation_summary: Option<Value>,
    pub risk_factors: Option<Value>,
    pub loops_executed: Option<Value>,
    pub total_queries: Option<Value>,
    pub agent_outputs: Option<Value>,
    pub human_verified: Option<Value>,
    pub timestamp: Option<Value>,
    pub outcome_id: Option<Value>,
}

/// Why a raw element was dropped or partially degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// Element was not an object of the expected shape
    InvalidShape { index: usize, message: String },
    /// Element has no usable `alert_id`
    MissingAlertId { index: usize },
    /// A field had the wrong JSON type and was ignored
    FieldType {
        alert_id: String,
        field: &'static str,
        expected: &'static str,
    },
    /// A known agent's output did not match its expected shape
    AgentOutputShape { alert_id: String, agent: String, message: String },
    /// Timestamp present but not ISO-8601
    UnparseableTimestamp { alert_id: String, value: String },
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeWarning::InvalidShape { index, message } => {
                write!(f, "record #{} dropped: {}", index, message)
            }
            NormalizeWarning::MissingAlertId { index } => {
                write!(f, "record #{} dropped: missing alert_id", index)
            }
            NormalizeWarning::FieldType {
                alert_id,
                field,
                expected,
            } => write!(f, "alert {}: ignored {} (expected {})", alert_id, field, expected),
            NormalizeWarning::AgentOutputShape {
                alert_id,
                agent,
                message,
            } => write!(
                f,
                "alert {}: {} output kept as raw JSON: {}",
                alert_id, agent, message
            ),
            NormalizeWarning::UnparseableTimestamp { alert_id, value } => {
                write!(f, "alert {}: unparseable timestamp {:?}", alert_id, value)
            }
        }
    }
}

impl NormalizeWarning {
    /// Whether the warning removed a record from the output
    pub fn is_dropped_record(&self) -> bool {
        matches!(
            self,
            NormalizeWarning::InvalidShape { .. } | NormalizeWarning::MissingAlertId { .. }
        )
    }
}

/// Result of normalizing a batch of raw elements.
#[derive(Debug, Default)]
pub struct NormalizeResult {
    /// Records in source order
    pub records: Vec<InvestigationRecord>,
    /// Non-fatal problems encountered
    pub warnings: Vec<NormalizeWarning>,
}

impl NormalizeResult {
    pub fn dropped(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_dropped_record()).count()
    }
}

/// Normalize a batch of untyped JSON elements, preserving order.
pub fn normalize_all(elements: Vec<Value>) -> NormalizeResult {
    let mut result = NormalizeResult::default();

    for (index, element) in elements.into_iter().enumerate() {
        if !element.is_object() {
            result.warnings.push(NormalizeWarning::InvalidShape {
                index,
                message: format!("expected a JSON object, got {}", json_kind(&element)),
            });
            continue;
        }

        let raw: RawInvestigationRecord = match serde_json::from_value(element) {
            Ok(raw) => raw,
            Err(e) => {
                result.warnings.push(NormalizeWarning::InvalidShape {
                    index,
                    message: e.to_string(),
                });
                continue;
            }
        };

        match normalize(raw, &mut result.warnings) {
            Some(record) => result.records.push(record),
            None => result
                .warnings
                .push(NormalizeWarning::MissingAlertId { index }),
        }
    }

    result
}

/// Normalize one standalone payload (a detail or investigation result).
///
/// Warnings are logged; a payload that cannot become a record is
/// [`Error::RecordNotFound`].
pub fn normalize_value(value: Value) -> Result<InvestigationRecord> {
    let mut result = normalize_all(vec![value]);
    for warning in &result.warnings {
        tracing::warn!(%warning, "Normalization warning");
    }

    match result.records.pop() {
        Some(record) => Ok(record),
        None => Err(Error::RecordNotFound(
            result
                .warnings
                .first()
                .map(|w| w.to_string())
                .unwrap_or_else(|| "empty response".to_string()),
        )),
    }
}

/// Normalize one raw record.
///
/// Returns `None` when the record has no usable `alert_id`.
pub fn normalize(
    raw: RawInvestigationRecord,
    warnings: &mut Vec<NormalizeWarning>,
) -> Option<InvestigationRecord> {
    let alert_id = to_identifier(raw.alert_id.as_ref())?;
    let mut fields = FieldReader {
        alert_id: &alert_id,
        warnings,
    };

    let outcome = fields.text("outcome", raw.outcome);
    let final_outcome = fields.text("final_outcome", raw.final_outcome);
    let outcome = outcome
        .or(final_outcome)
        .map(Outcome::from)
        .unwrap_or(Outcome::Unknown);

    let suspicion = fields.flag("is_suspicious", raw.is_suspicious);
    let is_suspicious = suspicion.unwrap_or(false);
    let outcome_type = fields
        .text("outcome_type", raw.outcome_type)
        .map(OutcomeType::from)
        .unwrap_or_else(|| OutcomeType::from_suspicion(is_suspicious));

    let confidence = fields.number("confidence", raw.confidence);
    let confidence_score = fields.number("confidence_score", raw.confidence_score);

    let investigation_summary = fields.text("investigation_summary", raw.investigation_summary);
    let risk_factors = fields.labels("risk_factors", raw.risk_factors);
    let loops_executed = fields.count("loops_executed", raw.loops_executed);
    let total_queries = fields.count("total_queries", raw.total_queries);
    let human_verified = fields.flag("human_verified", raw.human_verified).unwrap_or(false);

    let raw_timestamp = fields.text("timestamp", raw.timestamp);
    let timestamp = raw_timestamp.as_deref().and_then(|ts| {
        let parsed = parse_timestamp(ts);
        if parsed.is_none() {
            fields.warnings.push(NormalizeWarning::UnparseableTimestamp {
                alert_id: alert_id.clone(),
                value: ts.to_string(),
            });
        }
        parsed
    });

    let agent_outputs = match raw.agent_outputs {
        None => AgentOutputs::default(),
        Some(Value::Object(map)) => agent_outputs_from_map(&alert_id, map, fields.warnings),
        Some(_) => {
            fields.mismatch("agent_outputs", "an object");
            AgentOutputs::default()
        }
    };

    Some(InvestigationRecord {
        outcome,
        outcome_type,
        is_suspicious,
        suspicion,
        confidence: confidence.or(confidence_score),
        investigation_summary,
        risk_factors,
        loops_executed,
        total_queries,
        agent_outputs,
        human_verified,
        timestamp,
        raw_timestamp,
        outcome_id: to_identifier(raw.outcome_id.as_ref()),
        alert_id,
    })
}

/// Per-field coercion that records a warning instead of failing.
///
/// `null` counts as absent and is never a warning.
struct FieldReader<'a> {
    alert_id: &'a str,
    warnings: &'a mut Vec<NormalizeWarning>,
}

impl FieldReader<'_> {
    fn mismatch(&mut self, field: &'static str, expected: &'static str) {
        self.warnings.push(NormalizeWarning::FieldType {
            alert_id: self.alert_id.to_string(),
            field,
            expected,
        });
    }

    /// Non-blank trimmed string
    fn text(&mut self, field: &'static str, value: Option<Value>) -> Option<String> {
        match value? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => {
                self.mismatch(field, "a string");
                None
            }
        }
    }

    fn number(&mut self, field: &'static str, value: Option<Value>) -> Option<f64> {
        let value = value?;
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed.filter(|n| n.is_finite()) {
            Some(n) => Some(n),
            None => {
                self.mismatch(field, "a number");
                None
            }
        }
    }

    fn flag(&mut self, field: &'static str, value: Option<Value>) -> Option<bool> {
        let value = value?;
        let parsed = parse_flag(&value);
        if parsed.is_none() && !value.is_null() {
            self.mismatch(field, "a boolean");
        }
        parsed
    }

    fn count(&mut self, field: &'static str, value: Option<Value>) -> u32 {
        let Some(value) = value else { return 0 };
        let parsed = match &value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) => v.min(u32::MAX as u64) as u32,
            None => {
                self.mismatch(field, "a non-negative integer");
                0
            }
        }
    }

    fn labels(&mut self, field: &'static str, value: Option<Value>) -> Vec<String> {
        match value {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(to_label)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(_) => {
                self.mismatch(field, "a list");
                Vec::new()
            }
        }
    }
}

/// Split the `agent_outputs` mapping into typed outputs.
///
/// Empty objects mean the agent did not run and are dropped.
fn agent_outputs_from_map(
    alert_id: &str,
    map: Map<String, Value>,
    warnings: &mut Vec<NormalizeWarning>,
) -> AgentOutputs {
    let mut outputs = AgentOutputs::default();

    for (name, value) in map {
        if is_empty_output(&value) {
            continue;
        }

        let Some(kind) = AgentKind::from_key(&name) else {
            outputs.other.insert(name, value);
            continue;
        };

        let typed = match kind {
            AgentKind::PatternRecognition => {
                serde_json::from_value::<PatternRecognitionOutput>(value.clone())
                    .map(|o| outputs.pattern_recognition = Some(o))
            }
            AgentKind::Explanation => serde_json::from_value::<ExplanationOutput>(value.clone())
                .map(|o| outputs.explanation = Some(o)),
            AgentKind::RiskAssessment => {
                serde_json::from_value::<RiskAssessmentOutput>(value.clone())
                    .map(|o| outputs.risk_assessment = Some(o))
            }
        };

        if let Err(e) = typed {
            warnings.push(NormalizeWarning::AgentOutputShape {
                alert_id: alert_id.to_string(),
                agent: name.clone(),
                message: e.to_string(),
            });
            outputs.other.insert(name, value);
        }
    }

    outputs
}

fn is_empty_output(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse an ISO-8601 timestamp into local wall-clock time.
///
/// Offsets are converted to the local zone; naive timestamps (as written by
/// the backend) are taken to be local already. A bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Loose boolean: `true`/`false`, numbers (non-zero is true), or the
/// strings `"true"`/`"false"`/`"1"`/`"0"`. Anything else is `None`.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_identifier(value: Option<&Value>) -> Option<String> {
    let id = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn to_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
