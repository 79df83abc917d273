//! Error taxonomy shared by every ConectaSEI component.
//!
//! Mirrors the fault boundaries from the extraction pipeline design: per-process
//! failures are caught at the worker boundary and accumulated, while run-level
//! faults propagate out and terminate the run.

use thiserror::Error;

/// Result type alias using [`ConectaError`].
pub type Result<T> = std::result::Result<T, ConectaError>;

/// Unified error type for the extraction/download pipeline.
#[derive(Error, Debug)]
pub enum ConectaError {
    /// Bad credentials or an expired upstream session. Recovered by one
    /// re-login attempt; fatal to the run on a second failure.
    #[error("authentication failed for tenant {tenant_id}: {reason}")]
    Auth { tenant_id: String, reason: String },

    /// Network failure, navigation timeout, or an unexpected page. Retried
    /// once per process; otherwise the attempted link is marked inactive.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A scraper plugin's selector missed or its classifier could not make
    /// sense of the page. Fatal to the one process being worked, not the run.
    #[error("plugin error in {stage}: {message}")]
    Plugin { stage: String, message: String },

    /// Object-store upload failed. Not fatal to the process: the document
    /// record is left in `partial` status for a later retry.
    #[error("object store operation failed: {0}")]
    Storage(String),

    /// Database commit failed. Fatal to the one process whose transaction
    /// rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Missing tenant, unregistered scraper version, or missing encryption
    /// key. Fatal to the entire run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run or task was cancelled via its abort signal.
    #[error("operation cancelled")]
    Cancelled,

    /// A long-running task exceeded its hard timeout.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid process number: {0}")]
    InvalidProcessNumber(String),

    #[error("invalid document number: {0}")]
    InvalidDocumentNumber(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConectaError {
    /// True when this error should be treated as fatal to the whole run
    /// rather than accumulated against a single process.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            ConectaError::Config(_) | ConectaError::Cancelled | ConectaError::Timeout(_)
        )
    }
}
