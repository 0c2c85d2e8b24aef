//! Plain-text rendering of queue rows, detail views and stats.

use alertscope_core::client::{AlertHistory, ProcessedBatch, ServerStats};
use alertscope_core::format::{format_confidence, format_relative_time_opt};
use alertscope_core::{
    AgentKind, DetailSource, DetailView, InvestigationRecord, InvestigationStats,
    ParsedExplanation, QueueView, Severity,
};

const SUMMARY_WIDTH: usize = 60;

/// Shorten `text` to at most `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "!!",
        Severity::Attention => "! ",
        Severity::Resolved => "  ",
        Severity::Neutral => "? ",
    }
}

/// One table row for the review queue.
pub fn queue_row(record: &InvestigationRecord) -> String {
    format!(
        "{} {:<16} {:<20} {:>7}  {:<10} {}",
        severity_marker(record.outcome.severity()),
        truncate(&record.alert_id, 16),
        record.outcome.label(),
        format_confidence(record.confidence),
        format_relative_time_opt(record.timestamp),
        truncate(
            record.investigation_summary.as_deref().unwrap_or(""),
            SUMMARY_WIDTH
        ),
    )
}

pub fn print_queue(view: &QueueView<'_>) {
    println!(
        "{} ({} of {})",
        view.tab.label(),
        view.rows.len(),
        view.tab_total
    );

    if !view.outcome_choices.is_empty() {
        let choices: Vec<&str> = view.outcome_choices.iter().map(String::as_str).collect();
        println!("Outcomes: {}", choices.join(", "));
    }
    println!();

    if view.rows.is_empty() {
        println!("No investigations match the current filters.");
        return;
    }

    println!(
        "   {:<16} {:<20} {:>7}  {:<10} SUMMARY",
        "ALERT", "OUTCOME", "CONF", "WHEN"
    );
    for record in &view.rows {
        println!("{}", queue_row(record));
    }
}

pub fn print_detail(detail: &DetailView) {
    let record = &detail.record;

    println!("Alert {}", record.alert_id);
    println!("==============================");

    if detail.source == DetailSource::Loaded {
        if let Some(err) = &detail.fetch_error {
            println!("(full result unavailable: {})", err);
        }
        println!("(showing the record from the investigation list)");
        println!();
    }

    println!("Outcome:         {}", record.outcome.label());
    println!("Classification:  {}", record.outcome_type.as_str());
    let suspicious = match record.suspicion {
        Some(true) => "yes",
        Some(false) => "no",
        None => "undetermined",
    };
    println!("Suspicious:      {}", suspicious);
    match record.confidence_band() {
        Some(band) => println!(
            "Confidence:      {} ({:?})",
            format_confidence(record.confidence),
            band
        ),
        None => println!("Confidence:      {}", format_confidence(record.confidence)),
    }
    println!("Human verified:  {}", if record.human_verified { "yes" } else { "no" });
    println!("Loops executed:  {}", record.loops_executed);
    println!("Queries:         {}", record.total_queries);
    match (&record.timestamp, &record.raw_timestamp) {
        (Some(ts), _) => println!("Timestamp:       {}", ts.format("%Y-%m-%d %H:%M:%S")),
        (None, Some(raw)) => println!("Timestamp:       {} (unparsed)", raw),
        (None, None) => println!("Timestamp:       —"),
    }

    if let Some(summary) = &record.investigation_summary {
        println!();
        println!("Summary:");
        println!("  {}", summary);
    }

    if !record.risk_factors.is_empty() {
        println!();
        println!("Risk factors:");
        for factor in &record.risk_factors {
            println!("  - {}", factor);
        }
    }

    println!();
    println!("Agents:");
    for stage in record.agent_outputs.stages() {
        println!(
            "  [{}] {}",
            if stage.completed { "x" } else { " " },
            stage.kind.display_name()
        );
    }

    if let Some(risk) = &record.agent_outputs.risk_assessment {
        if let Some(level) = &risk.risk_level {
            println!();
            println!("Risk level:      {}", level);
        }
        if !risk.key_indicators.is_empty() {
            println!("Key indicators:  {}", risk.key_indicators.join(", "));
        }
    }

    println!();
    match record.parsed_explanation() {
        Some(parsed) if !parsed.is_empty() => print_explanation(&parsed),
        _ if record.agent_outputs.has_output(AgentKind::Explanation) => {
            println!("Explanation could not be structured.");
        }
        _ => println!("No explanation available"),
    }
}

fn print_explanation(parsed: &ParsedExplanation) {
    if !parsed.title.is_empty() {
        println!("{}", parsed.title);
        println!("------------------------------");
    }
    if !parsed.description.is_empty() {
        println!("{}", parsed.description);
    }

    if !parsed.key_observations.is_empty() {
        println!();
        println!("Key Observations:");
        for (i, observation) in parsed.key_observations.iter().enumerate() {
            if observation.content.is_empty() {
                println!("  {}. {}", i + 1, observation.title);
            } else {
                println!("  {}. {}: {}", i + 1, observation.title, observation.content);
            }
        }
    }

    if !parsed.conclusion.is_empty() {
        println!();
        println!("Conclusion:");
        for line in parsed.conclusion.lines() {
            println!("  {}", line);
        }
    }
}

pub fn print_stats(label: &str, stats: &InvestigationStats) {
    println!("{}", label);
    println!("  Investigations:       {}", stats.total_investigations);
    println!("  True positives:       {}", stats.true_positives);
    println!("  False positives:      {}", stats.false_positives);
    println!("  Under investigation:  {}", stats.under_investigation);
    println!("  Human verified:       {}", stats.human_verified);
    println!("  Accuracy:             {}", stats.format_accuracy());
}

/// Totals as the backend computed them, followed by the grouped counts.
pub fn print_server_stats(stats: &ServerStats) {
    println!("Backend totals");
    println!("  Investigations:       {}", stats.total_investigations);
    println!("  True positives:       {}", stats.true_positives);
    println!("  False positives:      {}", stats.false_positives);
    println!("  Under investigation:  {}", stats.under_investigation);

    if stats.outcomes.is_empty() {
        return;
    }

    println!();
    println!("  {:<20} {:<12} {:>6} {:>8}", "OUTCOME", "SUSPICIOUS", "COUNT", "AVG CONF");
    for group in &stats.outcomes {
        let suspicious = match group.suspicion() {
            Some(true) => "yes",
            Some(false) => "no",
            None => "—",
        };
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            group.outcome().label(),
            suspicious,
            group.count,
            format_confidence(group.avg_confidence)
        );
    }
}

/// One line per investigated alert, failures included.
pub fn print_processed(batch: &ProcessedBatch) {
    println!("Processed {} pending alerts", batch.processed_count);
    if batch.results.is_empty() {
        return;
    }

    println!();
    for result in batch.investigations() {
        match result {
            Ok(record) => println!("{}", queue_row(&record)),
            Err(e) => println!("!! {}", e),
        }
    }
}

pub fn print_history(history: &AlertHistory) {
    println!("Alert {} history", history.alert_id);
    println!("==============================");

    match history.outcome_record() {
        Some(record) => println!(
            "Outcome:         {} ({})",
            record.outcome.label(),
            format_confidence(record.confidence)
        ),
        None => println!("Outcome:         pending"),
    }

    println!();
    if history.judgements.is_empty() {
        println!("No agent judgements recorded.");
        return;
    }

    println!(
        "  {:<4} {:<20} {:<20} {:>7} {:>7}  WHEN",
        "LOOP", "AGENT", "ACTION", "CONF", "QUERIES"
    );
    for judgement in &history.judgements {
        let when = judgement
            .recorded_at()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .or_else(|| judgement.timestamp.clone())
            .unwrap_or_else(|| "—".to_string());
        println!(
            "  {:<4} {:<20} {:<20} {:>7} {:>7}  {}",
            judgement
                .loop_iteration
                .map_or_else(|| "—".to_string(), |i| i.to_string()),
            truncate(&judgement.agent_name, 20),
            truncate(&judgement.action, 20),
            format_confidence(judgement.confidence),
            judgement.query_count(),
            when
        );
    }
}
