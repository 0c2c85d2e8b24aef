//! Investigation statistics for the dashboard header.
//!
//! Aggregate counts derived from whatever record set the caller passes in
//! (the whole store, or one review tab).

use crate::types::InvestigationRecord;

/// Headline counts for a set of investigations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvestigationStats {
    /// Number of investigations
    pub total_investigations: usize,
    /// Investigations flagged as suspicious
    pub true_positives: usize,
    /// Investigations explicitly cleared as not suspicious; a missing
    /// verdict counts toward neither positives nor false positives
    pub false_positives: usize,
    /// Investigations left for a person (`HUMAN_REVIEW`, `INVESTIGATE_FURTHER`)
    pub under_investigation: usize,
    /// Investigations a reviewer has signed off
    pub human_verified: usize,
}

impl InvestigationStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a InvestigationRecord>,
    {
        let mut stats = Self::default();

        for record in records {
            stats.total_investigations += 1;
            match record.suspicion {
                Some(true) => stats.true_positives += 1,
                Some(false) => stats.false_positives += 1,
                None => {}
            }
            if record.outcome.is_pending() {
                stats.under_investigation += 1;
            }
            if record.human_verified {
                stats.human_verified += 1;
            }
        }

        stats
    }

    /// Share of true positives in percent, `None` with no investigations.
    pub fn accuracy_pct(&self) -> Option<f64> {
        if self.total_investigations == 0 {
            return None;
        }
        Some(self.true_positives as f64 / self.total_investigations as f64 * 100.0)
    }

    /// Format accuracy for display (e.g., "66.7%").
    pub fn format_accuracy(&self) -> String {
        match self.accuracy_pct() {
            Some(pct) => format!("{:.1}%", pct),
            None => "—".to_string(),
        }
    }
}
