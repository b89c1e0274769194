//! Error types for pool operations.

use thiserror::Error;

/// Errors produced by the pool and its queues.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Admitting the task would exceed the window budget. Expected and
    /// non-fatal; the submission is counted and dropped, never truncated.
    #[error("admission rejected: {requested_ms}ms would exceed window budget ({used_ms}/{budget_ms}ms committed)")]
    AdmissionRejected {
        /// Estimated cost of the rejected task, in milliseconds.
        requested_ms: u64,
        /// Cost already committed to the window, in milliseconds.
        used_ms: u64,
        /// The fixed per-window budget, in milliseconds.
        budget_ms: u64,
    },

    /// The pool has been shut down; no further submissions are accepted.
    #[error("pool has been shut down")]
    PoolShutdown,

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A metrics sink failed to record a window. Non-fatal; rotation
    /// proceeds without the record.
    #[error("metrics write failed: {0}")]
    MetricsWrite(String),
}

impl PoolError {
    /// Whether this error is an admission rejection, the expected outcome of
    /// the budget policy rather than a fault.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::AdmissionRejected { .. })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
