//! alertscope - review queue for automated fraud alert investigations
//!
//! This tool provides commands for:
//! - Listing investigations awaiting review, with outcome and date filters
//! - Showing one investigation with its agent outputs and explanation
//! - Summarising investigation counts, locally or as the backend reports them
//! - Running investigations and browsing agent history
//! - Checking backend health
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/alertscope/config.toml (~/.config/alertscope/config.toml)
//! - Logs: $XDG_STATE_HOME/alertscope/alertscope.log (~/.local/state/alertscope/alertscope.log)

mod render;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alertscope_core::client::HttpBackend;
use alertscope_core::config::BackendConfig;
use alertscope_core::{
    Config, DateFilter, DetailSource, DetailView, InvestigationStats, InvestigationStore,
    OutcomeFilter, ReviewQueue, ReviewTab,
};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "alertscope")]
#[command(about = "Review automated fraud alert investigations")]
#[command(version)]
struct Args {
    /// Verbose output (writes a log file)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL (default: from config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List investigations in the review queue
    Queue {
        /// Which tab to show
        #[arg(long, value_enum, default_value_t = TabArg::UnderReview)]
        tab: TabArg,

        /// Only show this outcome (e.g. ESCALATE); "ALL" shows every outcome
        #[arg(long)]
        outcome: Option<String>,

        /// Only show investigations from today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        today: bool,

        /// Earliest local date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest local date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Watch mode - keep refreshing the queue
        #[arg(short, long)]
        watch: bool,

        /// Poll interval in seconds (only with --watch, default: from config)
        #[arg(long)]
        poll: Option<u64>,
    },

    /// Show one investigation in detail
    Show {
        /// Alert identifier
        alert_id: String,

        /// Print the normalized record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show investigation counts for each tab
    Stats {
        /// Show the backend's own totals instead of counting loaded records
        #[arg(long)]
        server: bool,
    },

    /// Run a fresh investigation of one alert
    Investigate {
        /// Alert identifier
        alert_id: String,

        /// Print the normalized result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Investigate a batch of pending alerts
    Process {
        /// Maximum number of alerts to process (default: backend's choice)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show the agent judgements recorded for one alert
    History {
        /// Alert identifier
        alert_id: String,
    },

    /// Check backend health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum TabArg {
    UnderReview,
    Reviewed,
}

impl From<TabArg> for ReviewTab {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::UnderReview => ReviewTab::UnderReview,
            TabArg::Reviewed => ReviewTab::Reviewed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging if verbose
    let _log_guard = if args.verbose {
        Some(
            alertscope_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    let backend_config = BackendConfig {
        base_url: args
            .base_url
            .clone()
            .unwrap_or_else(|| config.backend.base_url.clone()),
        ..config.backend.clone()
    };
    let backend = HttpBackend::new(&backend_config).context("invalid backend configuration")?;

    tracing::info!(base_url = %backend.base_url(), "alertscope starting");

    match args.command {
        Command::Queue {
            tab,
            outcome,
            today,
            from,
            to,
            watch,
            poll,
        } => {
            let mut queue = ReviewQueue::new();
            queue.select_tab(tab.into());
            if let Some(outcome) = outcome {
                queue.set_outcome_filter(OutcomeFilter::parse(&outcome));
            }
            queue.set_date_filter(date_filter(today, from, to)?);

            if watch {
                let interval = poll
                    .map(|secs| Duration::from_secs(secs.max(1)))
                    .unwrap_or_else(|| config.dashboard.poll_interval());
                cmd_watch(&backend, &queue, interval).await
            } else {
                cmd_queue(&backend, &queue).await
            }
        }
        Command::Show { alert_id, json } => cmd_show(&backend, &alert_id, json).await,
        Command::Stats { server: false } => cmd_stats(&backend).await,
        Command::Stats { server: true } => cmd_server_stats(&backend).await,
        Command::Investigate { alert_id, json } => {
            cmd_investigate(&backend, &alert_id, json).await
        }
        Command::Process { limit } => cmd_process(&backend, limit).await,
        Command::History { alert_id } => cmd_history(&backend, &alert_id).await,
        Command::Health => cmd_health(&backend).await,
    }
}

fn date_filter(today: bool, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DateFilter> {
    if today {
        return Ok(DateFilter::Today);
    }
    if let (Some(start), Some(end)) = (from, to) {
        if start > end {
            bail!("--from ({}) is after --to ({})", start, end);
        }
    }
    Ok(match (from, to) {
        (None, None) => DateFilter::All,
        (start, end) => DateFilter::Custom { start, end },
    })
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .context("invalid progress template")?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Load the full collection behind a spinner
async fn load_store(backend: &HttpBackend) -> Result<InvestigationStore> {
    let pb = spinner(&format!("Loading investigations from {}", backend.base_url()))?;

    let mut store = InvestigationStore::new();
    let result = store.load(backend).await;
    pb.finish_and_clear();

    result.context("failed to load investigations")?;
    Ok(store)
}

async fn cmd_queue(backend: &HttpBackend, queue: &ReviewQueue) -> Result<()> {
    let store = load_store(backend).await?;
    render::print_queue(&queue.view(store.records()));
    Ok(())
}

/// Refresh the queue until interrupted. Failed refreshes keep the last rows.
async fn cmd_watch(backend: &HttpBackend, queue: &ReviewQueue, interval: Duration) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    println!(
        "Watch mode active (refresh every {}s). Press Ctrl+C to stop.",
        interval.as_secs()
    );
    println!();

    let mut store = InvestigationStore::new();
    let mut iteration = 0u64;

    while running.load(Ordering::SeqCst) {
        iteration += 1;
        let timestamp = chrono::Local::now().format("%H:%M:%S");

        match store.load(backend).await {
            Ok(snapshot) => {
                println!("[{}] {} investigations loaded", timestamp, snapshot.len());
                render::print_queue(&queue.view(store.records()));
                println!();
                tracing::info!(iteration, records = snapshot.len(), "watch refresh");
            }
            Err(e) => {
                println!(
                    "[{}] Warning: refresh failed ({}); keeping {} previous investigations",
                    timestamp,
                    e,
                    store.records().len()
                );
                tracing::warn!(iteration, error = %e, "watch refresh failed");
            }
        }

        // Sleep in short steps so Ctrl+C is noticed promptly
        let mut waited = Duration::ZERO;
        let step = Duration::from_millis(200);
        while waited < interval && running.load(Ordering::SeqCst) {
            tokio::time::sleep(step).await;
            waited += step;
        }
    }

    println!("Watch mode stopped.");
    tracing::info!("alertscope watch mode stopped");

    Ok(())
}

async fn cmd_show(backend: &HttpBackend, alert_id: &str, json: bool) -> Result<()> {
    // The list is only needed as a fallback, so a failure here is not fatal
    let mut store = InvestigationStore::new();
    if let Err(e) = store.load(backend).await {
        tracing::warn!(error = %e, "Could not load investigation list for fallback");
    }

    let pb = spinner(&format!("Fetching investigation {}", alert_id))?;
    let detail = store.detail(backend, alert_id).await;
    pb.finish_and_clear();

    let detail = detail.with_context(|| format!("failed to fetch investigation {}", alert_id))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&detail.record).context("failed to encode record")?
        );
    } else {
        render::print_detail(&detail);
    }

    Ok(())
}

async fn cmd_stats(backend: &HttpBackend) -> Result<()> {
    let store = load_store(backend).await?;
    let partition = store.partition_by_review();

    render::print_stats(
        "All investigations",
        &InvestigationStats::from_records(store.records()),
    );
    println!();
    render::print_stats(
        ReviewTab::UnderReview.label(),
        &InvestigationStats::from_records(partition.under_review.iter().copied()),
    );
    println!();
    render::print_stats(
        ReviewTab::Reviewed.label(),
        &InvestigationStats::from_records(partition.reviewed.iter().copied()),
    );

    if let Some(loaded_at) = store.loaded_at() {
        println!();
        println!("Loaded at {}", loaded_at.format("%Y-%m-%d %H:%M:%S"));
    }

    Ok(())
}

async fn cmd_server_stats(backend: &HttpBackend) -> Result<()> {
    let stats = backend
        .investigation_stats()
        .await
        .context("failed to fetch backend statistics")?;
    render::print_server_stats(&stats);
    Ok(())
}

async fn cmd_investigate(backend: &HttpBackend, alert_id: &str, json: bool) -> Result<()> {
    let pb = spinner(&format!("Investigating alert {}", alert_id))?;
    let record = backend.investigate_alert(alert_id).await;
    pb.finish_and_clear();

    let record = record.with_context(|| format!("investigation of {} failed", alert_id))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("failed to encode record")?
        );
    } else {
        render::print_detail(&DetailView {
            record,
            source: DetailSource::Backend,
            fetch_error: None,
        });
    }

    Ok(())
}

async fn cmd_process(backend: &HttpBackend, limit: Option<u32>) -> Result<()> {
    let pb = spinner("Processing pending alerts")?;
    let batch = backend.process_pending_alerts(limit).await;
    pb.finish_and_clear();

    let batch = batch.context("failed to process pending alerts")?;
    render::print_processed(&batch);
    Ok(())
}

async fn cmd_history(backend: &HttpBackend, alert_id: &str) -> Result<()> {
    let history = backend
        .alert_history(alert_id)
        .await
        .with_context(|| format!("failed to fetch history for {}", alert_id))?;
    render::print_history(&history);
    Ok(())
}

async fn cmd_health(backend: &HttpBackend) -> Result<()> {
    let health = backend
        .health()
        .await
        .with_context(|| format!("backend at {} is unreachable", backend.base_url()))?;

    println!("Backend:  {}", backend.base_url());
    println!("Status:   {}", health.status);
    if !health.agents.is_empty() {
        println!("Agents:   {}", health.agents.join(", "));
    }

    if !health.is_healthy() {
        bail!("backend reported status '{}'", health.status);
    }

    Ok(())
}
