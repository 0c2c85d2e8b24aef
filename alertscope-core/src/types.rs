//! Core domain types for alertscope
//!
//! These types are the canonical in-memory model of an investigation. Raw
//! backend payloads are converted into them once, in [`crate::normalize`];
//! nothing downstream branches on which source field a value came from.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Investigation** | One alert's outcome, confidence and supporting agent analysis |
//! | **Outcome** | The pipeline's decision (`ESCALATE`, `AUTO_CLOSE`, `HUMAN_REVIEW`, ...) |
//! | **Agent output** | The result object of one analysis stage, keyed by agent name |
//! | **Human-verified** | Signed off by a reviewer; otherwise the record is "under review" |

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::explanation::{self, ParsedExplanation};

// ============================================
// Outcome
// ============================================

/// Final decision of the investigation pipeline.
///
/// Unknown strings are preserved so newer backends keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Escalate,
    AutoClose,
    HumanReview,
    InvestigateFurther,
    /// Neither `outcome` nor `final_outcome` was present
    Unknown,
    Other(String),
}

impl Outcome {
    /// Returns the wire identifier
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Escalate => "ESCALATE",
            Outcome::AutoClose => "AUTO_CLOSE",
            Outcome::HumanReview => "HUMAN_REVIEW",
            Outcome::InvestigateFurther => "INVESTIGATE_FURTHER",
            Outcome::Unknown => "UNKNOWN",
            Outcome::Other(s) => s,
        }
    }

    /// Returns the display label for this outcome
    pub fn label(&self) -> &str {
        match self {
            Outcome::Escalate => "Escalate",
            Outcome::AutoClose => "Auto Close",
            Outcome::HumanReview => "Human Review",
            Outcome::InvestigateFurther => "Investigate Further",
            Outcome::Unknown => "Unknown",
            Outcome::Other(s) => s,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Escalate => Severity::Critical,
            Outcome::AutoClose => Severity::Resolved,
            Outcome::HumanReview | Outcome::InvestigateFurther => Severity::Attention,
            Outcome::Unknown | Outcome::Other(_) => Severity::Neutral,
        }
    }

    /// Whether the pipeline left this investigation open for a person
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::HumanReview | Outcome::InvestigateFurther)
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        match s {
            "ESCALATE" => Outcome::Escalate,
            "AUTO_CLOSE" => Outcome::AutoClose,
            "HUMAN_REVIEW" => Outcome::HumanReview,
            "INVESTIGATE_FURTHER" => Outcome::InvestigateFurther,
            "UNKNOWN" => Outcome::Unknown,
            other => Outcome::Other(other.to_string()),
        }
    }
}

impl From<String> for Outcome {
    fn from(s: String) -> Self {
        Outcome::from(s.as_str())
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.as_str().to_string()
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an outcome should be highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Resolved,
    Attention,
    Neutral,
}

/// Classification of the investigation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutcomeType {
    TruePositive,
    FalsePositive,
    UnderInvestigation,
    AutoClosed,
    Other(String),
}

impl OutcomeType {
    pub fn as_str(&self) -> &str {
        match self {
            OutcomeType::TruePositive => "true_positive",
            OutcomeType::FalsePositive => "false_positive",
            OutcomeType::UnderInvestigation => "under_investigation",
            OutcomeType::AutoClosed => "auto_closed",
            OutcomeType::Other(s) => s,
        }
    }

    /// Classification implied by the suspicion flag alone
    pub fn from_suspicion(is_suspicious: bool) -> Self {
        if is_suspicious {
            OutcomeType::TruePositive
        } else {
            OutcomeType::FalsePositive
        }
    }
}

impl From<String> for OutcomeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "true_positive" => OutcomeType::TruePositive,
            "false_positive" => OutcomeType::FalsePositive,
            "under_investigation" => OutcomeType::UnderInvestigation,
            "auto_closed" => OutcomeType::AutoClosed,
            _ => OutcomeType::Other(s),
        }
    }
}

impl From<OutcomeType> for String {
    fn from(t: OutcomeType) -> Self {
        t.as_str().to_string()
    }
}

// ============================================
// Confidence
// ============================================

/// Coarse confidence bucket used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    /// `> 0.7` is high, `> 0.4` is medium, anything else is low.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.7 {
            ConfidenceBand::High
        } else if confidence > 0.4 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

// ============================================
// Agent Outputs
// ============================================

/// Agent name keys used in `agent_outputs`
pub const PATTERN_RECOGNITION_AGENT: &str = "PatternRecognitionAgent";
pub const EXPLANATION_AGENT: &str = "ExplanationAgent";
pub const RISK_ASSESSMENT_AGENT: &str = "RiskAssessmentAgent";

/// The analysis stages of the investigation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    PatternRecognition,
    Explanation,
    RiskAssessment,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [
        AgentKind::PatternRecognition,
        AgentKind::Explanation,
        AgentKind::RiskAssessment,
    ];

    /// Key used in the backend's `agent_outputs` mapping
    pub fn key(&self) -> &'static str {
        match self {
            AgentKind::PatternRecognition => PATTERN_RECOGNITION_AGENT,
            AgentKind::Explanation => EXPLANATION_AGENT,
            AgentKind::RiskAssessment => RISK_ASSESSMENT_AGENT,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::PatternRecognition => "Pattern Recognition Agent",
            AgentKind::Explanation => "Explanation Agent",
            AgentKind::RiskAssessment => "Risk Assessment Agent",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        AgentKind::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// Whether a pipeline stage produced output for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStage {
    pub kind: AgentKind,
    pub completed: bool,
}

/// LLM findings attached to the pattern recognition output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmAnalysis {
    pub patterns: Vec<String>,
    pub risk_indicators: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One decision rule checked by the pattern agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleEvaluation {
    pub rule: String,
    pub matched: bool,
}

/// Output of `PatternRecognitionAgent`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternRecognitionOutput {
    pub overall_confidence: Option<f64>,
    pub llm_analysis: Option<LlmAnalysis>,
    pub risk_factors: Vec<String>,
    pub rules_used: Vec<RuleEvaluation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query/evidence totals gathered during an investigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceSummary {
    pub total_queries_executed: u64,
    pub total_data_points: u64,
    pub key_findings: Vec<String>,
}

/// One step of the investigation trail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailEntry {
    pub agent: String,
    pub loop_iteration: u32,
    pub key_findings: String,
    pub confidence_contributed: Option<f64>,
    pub result_context: Option<String>,
}

/// Output of `ExplanationAgent`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationOutput {
    /// Narrative text, see [`crate::explanation::parse`]
    pub explanation: Option<String>,
    pub rationale: Option<Value>,
    pub evidence_summary: Option<EvidenceSummary>,
    pub investigation_trail: Vec<TrailEntry>,
    pub result_context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output of `RiskAssessmentAgent`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessmentOutput {
    pub final_confidence: Option<f64>,
    /// LOW / MEDIUM / HIGH
    pub risk_level: Option<String>,
    pub risk_factors: Vec<String>,
    pub investigation_loops: u32,
    pub key_indicators: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-agent analysis attached to an investigation.
///
/// Known agents are typed; anything else is kept verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutputs {
    pub pattern_recognition: Option<PatternRecognitionOutput>,
    pub explanation: Option<ExplanationOutput>,
    pub risk_assessment: Option<RiskAssessmentOutput>,
    pub other: BTreeMap<String, Value>,
}

impl AgentOutputs {
    pub fn is_empty(&self) -> bool {
        self.pattern_recognition.is_none()
            && self.explanation.is_none()
            && self.risk_assessment.is_none()
            && self.other.is_empty()
    }

    /// Raw narrative produced by the explanation agent
    pub fn explanation_text(&self) -> Option<&str> {
        self.explanation.as_ref()?.explanation.as_deref()
    }

    /// Pipeline stages in execution order with their completion state
    pub fn stages(&self) -> Vec<AgentStage> {
        AgentKind::ALL
            .into_iter()
            .map(|kind| AgentStage {
                kind,
                completed: self.has_output(kind),
            })
            .collect()
    }

    pub fn has_output(&self, kind: AgentKind) -> bool {
        match kind {
            AgentKind::PatternRecognition => self.pattern_recognition.is_some(),
            AgentKind::Explanation => self.explanation.is_some(),
            AgentKind::RiskAssessment => self.risk_assessment.is_some(),
        }
    }
}

// ============================================
// Investigation Record
// ============================================

/// Canonical investigation record.
///
/// Every record has an `alert_id`, an `outcome`, and boolean
/// `is_suspicious`/`human_verified` flags. `is_suspicious` is `false` when
/// the pipeline gave no verdict; `suspicion` keeps that distinction.
/// `confidence` is `None` when the backend sent no usable `confidence` or
/// `confidence_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub alert_id: String,
    pub outcome: Outcome,
    pub outcome_type: OutcomeType,
    pub is_suspicious: bool,
    /// Suspicion flag as sent; `None` when the backend sent null or nothing
    pub suspicion: Option<bool>,
    pub confidence: Option<f64>,
    pub investigation_summary: Option<String>,
    pub risk_factors: Vec<String>,
    pub loops_executed: u32,
    pub total_queries: u32,
    pub agent_outputs: AgentOutputs,
    pub human_verified: bool,
    /// Local wall-clock time of the investigation, if parseable
    pub timestamp: Option<NaiveDateTime>,
    /// Timestamp exactly as sent by the backend
    pub raw_timestamp: Option<String>,
    pub outcome_id: Option<String>,
}

impl InvestigationRecord {
    /// Key that is unique per list row (outcome id when present)
    pub fn row_key(&self) -> &str {
        self.outcome_id.as_deref().unwrap_or(&self.alert_id)
    }

    /// Local calendar date of the investigation
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date())
    }

    pub fn confidence_band(&self) -> Option<ConfidenceBand> {
        self.confidence.map(ConfidenceBand::from_confidence)
    }

    /// Parse the explanation agent's narrative, if any.
    ///
    /// Derived on every call; callers hold on to the result as long as they need it.
    pub fn parsed_explanation(&self) -> Option<ParsedExplanation> {
        explanation::parse(self.agent_outputs.explanation_text())
    }
}
