//! Queue errors.

use vigil_core::JobId;

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// An enqueue with a logical id that already has a non-terminal job.
    #[error("duplicate job for logical id {logical_id:?}")]
    Duplicate {
        /// The rejected dedup key.
        logical_id: String,
    },

    /// The referenced job does not exist.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The backing store failed.
    #[error("job store failure: {0}")]
    Store(String),
}
