//! Execution status.

use serde::{Deserialize, Serialize};

/// Status of one workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created, waiting for a worker.
    Pending,
    /// A worker is stepping through the graph (or the run is suspended
    /// at a delay node).
    Running,
    /// Every reached node completed.
    Completed,
    /// An action exhausted its retries, the time budget ran out, or the
    /// worker hit a terminal error.
    Failed,
}

impl ExecutionStatus {
    /// Whether the execution can still make progress.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
