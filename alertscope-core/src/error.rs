//! Error types for alertscope-core

use thiserror::Error;

/// Main error type for the alertscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure or non-2xx response from the backend
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend answered 2xx but reported a failure in the body
    #[error("backend error: {0}")]
    Backend(String),

    /// Investigation record not found
    #[error("investigation record not found: {0}")]
    RecordNotFound(String),
}

impl Error {
    /// Whether this error came from talking to the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result type alias for alertscope-core
pub type Result<T> = std::result::Result<T, Error>;
