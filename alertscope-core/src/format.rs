//! Formatting helpers shared across UIs.

use chrono::{Local, NaiveDateTime};

/// Format a local timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: NaiveDateTime) -> String {
    format_relative_time_from(ts, Local::now().naive_local())
}

/// Format `ts` relative to `now`.
pub fn format_relative_time_from(ts: NaiveDateTime, now: NaiveDateTime) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format an optional timestamp as relative time, or an em dash if missing.
pub fn format_relative_time_opt(ts: Option<NaiveDateTime>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => "—".to_string(),
    }
}

/// Format a confidence in [0, 1] as a percentage (e.g., "87.5%").
pub fn format_confidence(confidence: Option<f64>) -> String {
    match confidence {
        Some(c) => format!("{:.1}%", c * 100.0),
        None => "—".to_string(),
    }
}
