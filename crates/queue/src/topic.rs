//! Queue topics.

use serde::{Deserialize, Serialize};

/// A named queue topic. Each topic gets its own worker pool and
/// concurrency budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Escalation level timers.
    Escalation,
    /// Workflow execution steps.
    Workflow,
    /// Runbook outbound calls.
    Runbook,
    /// Maintenance and cleanup (audit retention, reconciliation).
    System,
}

impl Topic {
    /// All topics, in worker startup order.
    pub const ALL: [Self; 4] = [Self::Escalation, Self::Workflow, Self::Runbook, Self::System];

    /// The wire name of the topic.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalation => "escalation",
            Self::Workflow => "workflow",
            Self::Runbook => "runbook",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
