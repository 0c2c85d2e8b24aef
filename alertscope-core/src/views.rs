//! Derived views over loaded investigation records
//!
//! Every function here is a total, side-effect free projection: it never
//! fails, preserves the relative order of its input, and returns an empty
//! result for empty input.
//!
//! The review queue applies them in a fixed order:
//!
//! ```text
//! records ─► partition_by_review ─► filter_by_date ─┬─► unique_outcomes (filter choices)
//!                (active tab)                       └─► filter_by_outcome (rows)
//! ```

use chrono::{Local, NaiveDate};
use std::collections::BTreeSet;

use crate::types::InvestigationRecord;

// ============================================
// Review partition
// ============================================

/// Records split by reviewer sign-off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPartition<'a> {
    /// Not yet human-verified
    pub under_review: Vec<&'a InvestigationRecord>,
    /// Human-verified
    pub reviewed: Vec<&'a InvestigationRecord>,
}

/// Split records by `human_verified`, preserving order within each side.
pub fn partition_by_review(records: &[InvestigationRecord]) -> ReviewPartition<'_> {
    let (reviewed, under_review): (Vec<_>, Vec<_>) =
        records.iter().partition(|r| r.human_verified);
    ReviewPartition {
        under_review,
        reviewed,
    }
}

// ============================================
// Outcome filter
// ============================================

/// Outcome selection for the review queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutcomeFilter {
    #[default]
    All,
    /// Exact, case-sensitive outcome string
    Only(String),
}

impl OutcomeFilter {
    /// Parse a filter value; `"ALL"` selects everything.
    pub fn parse(value: &str) -> Self {
        if value == "ALL" {
            OutcomeFilter::All
        } else {
            OutcomeFilter::Only(value.to_string())
        }
    }

    pub fn matches(&self, record: &InvestigationRecord) -> bool {
        match self {
            OutcomeFilter::All => true,
            OutcomeFilter::Only(outcome) => record.outcome.as_str() == outcome,
        }
    }
}

pub fn filter_by_outcome<'a>(
    records: &[&'a InvestigationRecord],
    filter: &OutcomeFilter,
) -> Vec<&'a InvestigationRecord> {
    records
        .iter()
        .copied()
        .filter(|r| filter.matches(r))
        .collect()
}

// ============================================
// Date filter
// ============================================

/// Date selection for the review queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    All,
    /// Investigations from the current local calendar day
    Today,
    /// Inclusive local date range; a missing bound is open
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl DateFilter {
    /// Whether the record passes, with `today` as the local reference date.
    ///
    /// Records without a usable timestamp only pass filters that impose no
    /// date constraint.
    pub fn matches_on(&self, record: &InvestigationRecord, today: NaiveDate) -> bool {
        match *self {
            DateFilter::All | DateFilter::Custom {
                start: None,
                end: None,
            } => true,
            DateFilter::Today => record.local_date() == Some(today),
            DateFilter::Custom { start, end } => match record.local_date() {
                Some(date) => {
                    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
                }
                None => false,
            },
        }
    }
}

/// Filter by date against the current local date.
pub fn filter_by_date<'a>(
    records: &[&'a InvestigationRecord],
    filter: DateFilter,
) -> Vec<&'a InvestigationRecord> {
    filter_by_date_on(records, filter, Local::now().date_naive())
}

/// Filter by date against an explicit local reference date.
pub fn filter_by_date_on<'a>(
    records: &[&'a InvestigationRecord],
    filter: DateFilter,
    today: NaiveDate,
) -> Vec<&'a InvestigationRecord> {
    records
        .iter()
        .copied()
        .filter(|r| filter.matches_on(r, today))
        .collect()
}

// ============================================
// Outcome choices
// ============================================

/// Distinct outcome strings present in `records`.
///
/// Pass the already partitioned and date-filtered subset so every choice
/// has at least one matching row.
pub fn unique_outcomes(records: &[&InvestigationRecord]) -> BTreeSet<String> {
    records
        .iter()
        .map(|r| r.outcome.as_str().to_string())
        .collect()
}

// ============================================
// Review queue
// ============================================

/// Review queue tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReviewTab {
    #[default]
    UnderReview,
    Reviewed,
}

impl ReviewTab {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewTab::UnderReview => "Under Review",
            ReviewTab::Reviewed => "Reviewed",
        }
    }
}

/// Filter selections of the review queue.
///
/// Tab changes reset the outcome filter (its choices depend on the tab) but
/// keep the date filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewQueue {
    tab: ReviewTab,
    outcome_filter: OutcomeFilter,
    date_filter: DateFilter,
}

/// Rows and filter choices for the active tab.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueView<'a> {
    pub tab: ReviewTab,
    pub rows: Vec<&'a InvestigationRecord>,
    pub outcome_choices: BTreeSet<String>,
    /// Size of the tab before the outcome filter
    pub tab_total: usize,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self) -> ReviewTab {
        self.tab
    }

    pub fn outcome_filter(&self) -> &OutcomeFilter {
        &self.outcome_filter
    }

    pub fn date_filter(&self) -> DateFilter {
        self.date_filter
    }

    /// Switch tabs. Selecting the active tab is a no-op.
    pub fn select_tab(&mut self, tab: ReviewTab) {
        if tab != self.tab {
            self.tab = tab;
            self.outcome_filter = OutcomeFilter::All;
        }
    }

    pub fn set_outcome_filter(&mut self, filter: OutcomeFilter) {
        self.outcome_filter = filter;
    }

    pub fn set_date_filter(&mut self, filter: DateFilter) {
        self.date_filter = filter;
    }

    /// Project the active tab against the current local date.
    pub fn view<'a>(&self, records: &'a [InvestigationRecord]) -> QueueView<'a> {
        self.view_on(records, Local::now().date_naive())
    }

    /// Project the active tab with an explicit local reference date.
    pub fn view_on<'a>(&self, records: &'a [InvestigationRecord], today: NaiveDate) -> QueueView<'a> {
        let partition = partition_by_review(records);
        let tab_records = match self.tab {
            ReviewTab::UnderReview => partition.under_review,
            ReviewTab::Reviewed => partition.reviewed,
        };

        let dated = filter_by_date_on(&tab_records, self.date_filter, today);
        let outcome_choices = unique_outcomes(&dated);
        let rows = filter_by_outcome(&dated, &self.outcome_filter);

        QueueView {
            tab: self.tab,
            tab_total: dated.len(),
            rows,
            outcome_choices,
        }
    }
}
