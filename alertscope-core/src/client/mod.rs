//! Investigation backend access
//!
//! The store only needs two reads from the backend, expressed by the
//! [`RecordSource`] trait:
//!
//! - the full collection of investigation outcomes (list view)
//! - the stored result of one investigation (detail view)
//!
//! [`HttpBackend`] implements it over HTTP. Sources hand back untyped JSON so
//! that normalization can drop bad elements one at a time instead of failing
//! the whole response. The backend's write and audit endpoints (running
//! investigations, server-side stats, agent history) are inherent methods on
//! [`HttpBackend`] since only the CLI drives them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use alertscope_core::client::HttpBackend;
//! use alertscope_core::{Config, InvestigationStore};
//!
//! # async fn run() -> alertscope_core::Result<()> {
//! let config = Config::load()?;
//! let backend = HttpBackend::new(&config.backend)?;
//!
//! let mut store = InvestigationStore::new();
//! let snapshot = store.load(&backend).await?;
//! println!("{} investigations", snapshot.len());
//! # Ok(())
//! # }
//! ```

mod http;

pub use http::{
    AgentJudgement, AlertHistory, HealthStatus, HttpBackend, OutcomeGroup, ProcessedBatch,
    ServerStats,
};

use std::future::Future;

use serde_json::Value;

use crate::error::Result;

/// A backend that serves raw investigation records.
pub trait RecordSource {
    /// Fetch every investigation outcome.
    ///
    /// A transport failure or a body that is not a JSON array is an error;
    /// individual elements are not validated here.
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Fetch the full stored result for one alert.
    fn fetch_record(&self, alert_id: &str) -> impl Future<Output = Result<Value>> + Send;
}
