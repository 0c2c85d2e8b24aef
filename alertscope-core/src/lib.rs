//! # alertscope-core
//!
//! Core library for alertscope - a review queue for automated fraud alert
//! investigations.
//!
//! This library provides:
//! - A parser for the explanation agent's narrative ([`explanation`])
//! - Canonical investigation types and the normalization of raw backend payloads
//! - An in-memory record store with review-queue views
//! - An HTTP client for the investigation backend
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Raw:** JSON from the investigation backend (loosely typed, transient)
//! - **Canonical:** [`InvestigationRecord`]s held by the [`InvestigationStore`]
//! - **Derived:** review partitions, filters, stats and parsed explanations (pure projections)
//!
//! ## Example
//!
//! ```rust,no_run
//! use alertscope_core::client::HttpBackend;
//! use alertscope_core::{Config, InvestigationStore, ReviewQueue};
//!
//! # async fn run() -> alertscope_core::Result<()> {
//! let config = Config::load()?;
//! let backend = HttpBackend::new(&config.backend)?;
//!
//! let mut store = InvestigationStore::new();
//! store.load(&backend).await?;
//!
//! let view = ReviewQueue::new().view(store.records());
//! for record in view.rows {
//!     println!("{} {}", record.alert_id, record.outcome);
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use explanation::{Observation, ParsedExplanation};
pub use stats::InvestigationStats;
pub use store::{DetailSource, DetailView, InvestigationStore, LoadOutcome, LoadTicket, Snapshot};
pub use types::*;
pub use views::{DateFilter, OutcomeFilter, QueueView, ReviewQueue, ReviewTab};

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod explanation;
pub mod format;
pub mod logging;
pub mod normalize;
pub mod stats;
pub mod store;
pub mod types;
pub mod views;
