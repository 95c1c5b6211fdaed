//! Job records and retry policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vigil_core::JobId;

use crate::topic::Topic;

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for its scheduled time.
    Pending,
    /// Claimed by a worker; `executed_at` is set.
    Running,
    /// The handler finished.
    Completed,
    /// Cancelled before execution; a no-op at dequeue.
    Cancelled,
    /// Retries exhausted or terminal handler failure.
    Failed,
    /// Replaced by a reconciled re-enqueue under the same logical id.
    Superseded,
}

impl JobState {
    /// Whether the job can never run again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed | Self::Superseded
        )
    }
}

/// Per-job retry policy supplied at enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = no retry).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// The queue default: three attempts, exponential from one second.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }

    /// Backoff before retry number `attempt` (1-based):
    /// `initial_delay_ms * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let raw = self.initial_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(raw.min(self.max_delay_ms.max(self.initial_delay_ms)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// One durable job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Queue-assigned identity.
    pub id: JobId,
    /// The topic this job belongs to.
    pub topic: Topic,
    /// Caller-supplied dedup/supersede key, e.g. `escalation:<incident>`.
    #[serde(default)]
    pub logical_id: Option<String>,
    /// Owner-defined payload.
    pub payload: serde_json::Value,
    /// Current state.
    pub state: JobState,
    /// When the job becomes due.
    pub scheduled_for: DateTime<Utc>,
    /// Attempts made so far (incremented at claim).
    pub attempts: u32,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Set at claim, before the handler runs.
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    /// Set when the handler acknowledges completion.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last handler error, for inspection and logs.
    #[serde(default)]
    pub last_error: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Whether this row is a stale in-flight claim relative to `cutoff`:
    /// claimed (executed_at set), never completed, and older than the cutoff.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.state == JobState::Running
            && self.completed_at.is_none()
            && self.executed_at.is_some_and(|at| at < cutoff)
    }
}
