//! The execution record.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{ExecutionId, IncidentId, NodeId, WorkflowId};
use vigil_workflow::WorkflowDefinition;

use crate::status::ExecutionStatus;

/// Cap on stored response previews, bytes.
pub(crate) const MAX_RESULT_PREVIEW: usize = 4096;

/// How an execution was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// A lifecycle event matched the workflow's trigger.
    Event,
    /// An explicit manual trigger call.
    Manual,
}

/// Stored result of one action node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    /// HTTP status, when the action made a call.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Response body, truncated to 4 KiB.
    #[serde(default)]
    pub response_preview: Option<String>,
    /// Created ticket id (jira/linear).
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Created ticket URL.
    #[serde(default)]
    pub ticket_url: Option<String>,
    /// Terminal error, when the action failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl ActionOutcome {
    /// Truncate the preview to its storage cap on a char boundary.
    #[must_use]
    pub fn with_preview(mut self, body: &str) -> Self {
        let mut end = body.len().min(MAX_RESULT_PREVIEW);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        self.response_preview = Some(body[..end].to_owned());
        self
    }
}

/// One workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    /// Identity.
    pub id: ExecutionId,
    /// The triggering workflow.
    pub workflow_id: WorkflowId,
    /// The workflow version snapshotted.
    pub workflow_version: u32,
    /// Deep copy of the definition at trigger time; the interpreter's
    /// only source of truth.
    pub snapshot: WorkflowDefinition,
    /// The incident that fired the trigger.
    pub incident_id: IncidentId,
    /// JSON snapshot of that incident at trigger time; conditions and
    /// templates read this, not the live row.
    pub incident_snapshot: Value,
    /// How the execution came to be.
    pub origin: TriggerOrigin,
    /// The matched trigger's event name (`incident.created`, `age`, ...).
    #[serde(default)]
    pub trigger_event: Option<String>,
    /// Current status.
    pub status: ExecutionStatus,
    /// Nodes that already ran; redelivered jobs skip these.
    #[serde(default)]
    pub completed_nodes: HashSet<NodeId>,
    /// Per-action results.
    #[serde(default)]
    pub node_results: HashMap<NodeId, ActionOutcome>,
    /// Where to resume after a delay suspension.
    #[serde(default)]
    pub cursor: Option<NodeId>,
    /// Workflow ids traversed in the cascade that led here; always
    /// duplicate-free, and always ends with `workflow_id`.
    pub chain: Vec<WorkflowId>,
    /// Milliseconds of non-delay work consumed so far, against the
    /// settings timeout budget.
    #[serde(default)]
    pub work_ms: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// First worker touch.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Execution-level error, when failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// Create a PENDING execution with its snapshots and cascade chain.
    ///
    /// `prior_chain` is the chain of the event that caused this match;
    /// the new execution's chain appends the workflow itself.
    #[must_use]
    pub fn create(
        workflow_id: WorkflowId,
        workflow_version: u32,
        snapshot: WorkflowDefinition,
        incident_id: IncidentId,
        incident_snapshot: Value,
        origin: TriggerOrigin,
        trigger_event: Option<String>,
        prior_chain: &[WorkflowId],
    ) -> Self {
        let mut chain = prior_chain.to_vec();
        chain.push(workflow_id);
        Self {
            id: ExecutionId::v4(),
            workflow_id,
            workflow_version,
            snapshot,
            incident_id,
            incident_snapshot,
            origin,
            trigger_event,
            status: ExecutionStatus::Pending,
            completed_nodes: HashSet::new(),
            node_results: HashMap::new(),
            cursor: None,
            chain,
            work_ms: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the execution running on first worker touch.
    pub fn mark_running(&mut self) {
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the execution completed.
    pub fn mark_completed(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the execution failed with a reason.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
