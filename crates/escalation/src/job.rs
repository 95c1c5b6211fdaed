//! Escalation job records.
//!
//! One row per scheduled level-timer. The invariant the store enforces:
//! at most one non-completed record per incident at any moment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{IncidentId, JobId};

/// A scheduled (or executed) escalation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationJob {
    /// Identity.
    pub id: JobId,
    /// The incident being escalated.
    pub incident_id: IncidentId,
    /// Target level (1-based).
    pub level: u32,
    /// Which pass through the ladder this is (0 = first).
    pub repeat_index: u32,
    /// The queue job carrying this step.
    pub queue_job_id: JobId,
    /// When the step fires.
    pub scheduled_for: DateTime<Utc>,
    /// Set when a worker picked the step up.
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    /// Set when the step finished (notified and rescheduled).
    pub completed: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl EscalationJob {
    /// The queue-level dedup key for this step.
    #[must_use]
    pub fn logical_id(incident_id: IncidentId, repeat_index: u32, level: u32) -> String {
        format!("escalation:{incident_id}:{repeat_index}:{level}")
    }
}
