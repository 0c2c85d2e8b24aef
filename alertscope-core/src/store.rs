//! In-memory store of normalized investigation records
//!
//! ## Loading
//!
//! [`InvestigationStore::load`] fetches the full collection, normalizes it and
//! swaps it in as one immutable [`Snapshot`]. The previous snapshot stays in
//! place when the fetch or the response body fails.
//!
//! ## Request sequencing
//!
//! Callers that issue overlapping fetches (e.g. a poll timer plus a manual
//! refresh) use the split form instead:
//!
//! ```rust,ignore
//! let ticket = store.begin_load();
//! let result = backend.fetch_records().await;
//! store.complete_load(ticket, result)?;
//! ```
//!
//! Tickets are numbered in issue order. A response is applied only if its
//! ticket is newer than the last applied one, so a slow response can never
//! overwrite fresher data.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::client::RecordSource;
use crate::error::{Error, Result};
use crate::normalize::{self, NormalizeWarning};
use crate::types::{InvestigationRecord, Outcome};
use crate::views::{self, ReviewPartition};

/// Immutable view of one successful load, in backend order
pub type Snapshot = Arc<[InvestigationRecord]>;

/// Sequence token for one in-flight load
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// Summary of an applied load
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records now in the store
    pub loaded: usize,
    /// Raw elements that were dropped
    pub dropped: usize,
    /// Everything normalization complained about
    pub warnings: Vec<NormalizeWarning>,
}

/// What happened to a completed load
#[derive(Debug)]
pub enum LoadOutcome {
    /// The response replaced the store's collection
    Applied(LoadReport),
    /// A newer response was already applied; this one was discarded
    Stale { ticket: LoadTicket, applied: LoadTicket },
}

/// Where a detail view's record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailSource {
    /// Fresh full result from the backend
    Backend,
    /// The list record already in the store
    Loaded,
}

/// One investigation prepared for a detail view
#[derive(Debug)]
pub struct DetailView {
    pub record: InvestigationRecord,
    pub source: DetailSource,
    /// Why the backend result was not used, when falling back
    pub fetch_error: Option<Error>,
}

/// Holds the current collection of investigation records.
#[derive(Debug)]
pub struct InvestigationStore {
    records: Snapshot,
    next_ticket: u64,
    applied: LoadTicket,
    loaded_at: Option<DateTime<Local>>,
}

impl Default for InvestigationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InvestigationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            next_ticket: 1,
            applied: LoadTicket(0),
            loaded_at: None,
        }
    }

    /// Current snapshot (cheap to clone)
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.records)
    }

    pub fn records(&self) -> &[InvestigationRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the current snapshot was applied, `None` before the first load
    pub fn loaded_at(&self) -> Option<DateTime<Local>> {
        self.loaded_at
    }

    /// Look up a loaded record by alert id
    pub fn get(&self, alert_id: &str) -> Option<&InvestigationRecord> {
        self.records.iter().find(|r| r.alert_id == alert_id)
    }

    /// Split the current collection by reviewer sign-off
    pub fn partition_by_review(&self) -> ReviewPartition<'_> {
        views::partition_by_review(&self.records)
    }

    /// Issue a ticket for a load that is about to start
    pub fn begin_load(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Finish a load started with [`Self::begin_load`].
    ///
    /// Errors leave the collection untouched and are returned as-is. A
    /// successful response older than the last applied one is discarded.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Value>>,
    ) -> Result<LoadOutcome> {
        let elements = match result {
            Ok(elements) => elements,
            Err(e) => {
                tracing::warn!(ticket = ticket.0, error = %e, "Load failed, keeping previous records");
                return Err(e);
            }
        };

        if ticket <= self.applied {
            tracing::warn!(
                ticket = ticket.0,
                applied = self.applied.0,
                "Discarding stale load response"
            );
            return Ok(LoadOutcome::Stale {
                ticket,
                applied: self.applied,
            });
        }

        let normalized = normalize::normalize_all(elements);
        for warning in &normalized.warnings {
            tracing::warn!(%warning, "Normalization warning");
        }

        let report = LoadReport {
            loaded: normalized.records.len(),
            dropped: normalized.dropped(),
            warnings: normalized.warnings,
        };

        self.records = Arc::from(normalized.records);
        self.applied = ticket;
        self.loaded_at = Some(Local::now());

        tracing::info!(
            ticket = ticket.0,
            loaded = report.loaded,
            dropped = report.dropped,
            "Investigation records loaded"
        );

        Ok(LoadOutcome::Applied(report))
    }

    /// Fetch, normalize and replace the whole collection.
    ///
    /// On failure the previous collection is kept and the error returned.
    pub async fn load<S: RecordSource>(&mut self, source: &S) -> Result<Snapshot> {
        let ticket = self.begin_load();
        let result = source.fetch_records().await;
        self.complete_load(ticket, result)?;
        Ok(self.snapshot())
    }

    /// Fetch the full result for one alert, falling back to the loaded record.
    ///
    /// Fields the result payload leaves out (review flag, timestamp, outcome
    /// id and so on) are taken from the loaded record. Returns the fetch
    /// error only when there is nothing to fall back to.
    pub async fn detail<S: RecordSource>(&self, source: &S, alert_id: &str) -> Result<DetailView> {
        let fetch_error = match source.fetch_record(alert_id).await {
            Ok(value) => match normalize_detail(value, self.get(alert_id)) {
                Ok(record) => {
                    return Ok(DetailView {
                        record,
                        source: DetailSource::Backend,
                        fetch_error: None,
                    })
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        match self.get(alert_id) {
            Some(record) => {
                tracing::warn!(%alert_id, error = %fetch_error, "Using loaded record for detail view");
                Ok(DetailView {
                    record: record.clone(),
                    source: DetailSource::Loaded,
                    fetch_error: Some(fetch_error),
                })
            }
            None => Err(fetch_error),
        }
    }
}

/// Normalize a detail payload and fill what it omits from the list record.
///
/// A field the payload sends (non-null) always wins, even when unusable.
fn normalize_detail(
    value: Value,
    listed: Option<&InvestigationRecord>,
) -> Result<InvestigationRecord> {
    let sent = |key: &str| value.get(key).is_some_and(|v| !v.is_null());
    let verified_sent = sent("human_verified");
    let timestamp_sent = sent("timestamp");
    let suspicion_sent = sent("is_suspicious");
    let outcome_type_sent = sent("outcome_type");

    let mut record = normalize::normalize_value(value)?;
    let Some(listed) = listed else {
        return Ok(record);
    };

    if !verified_sent {
        record.human_verified = listed.human_verified;
    }
    if !timestamp_sent {
        record.timestamp = listed.timestamp;
        record.raw_timestamp = listed.raw_timestamp.clone();
    }
    if !suspicion_sent {
        record.suspicion = listed.suspicion;
        record.is_suspicious = listed.is_suspicious;
        if !outcome_type_sent {
            record.outcome_type = listed.outcome_type.clone();
        }
    }
    if record.outcome == Outcome::Unknown {
        record.outcome = listed.outcome.clone();
    }
    if record.outcome_id.is_none() {
        record.outcome_id = listed.outcome_id.clone();
    }
    if record.confidence.is_none() {
        record.confidence = listed.confidence;
    }
    if record.investigation_summary.is_none() {
        record.investigation_summary = listed.investigation_summary.clone();
    }

    Ok(record)
}
