//! Runbook execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{ExecutionId, IncidentId, RunbookId, UserId};
use vigil_http::RetryConfig;

use crate::runbook::{Runbook, RunbookHttpSpec};

/// Status of one runbook execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunbookStatus {
    /// Created, waiting for a worker.
    Pending,
    /// The worker is making the call.
    Running,
    /// The upstream answered 2xx.
    Success,
    /// Anything else.
    Failed,
}

impl RunbookStatus {
    /// Whether the execution is finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// What started the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    /// A human pressed the button.
    Manual,
    /// A workflow action invoked the runbook.
    Workflow,
}

/// The definition snapshot an execution carries: everything the worker
/// needs, decoupled from later runbook edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunbookSnapshot {
    /// The outbound call.
    pub http: RunbookHttpSpec,
    /// Body template.
    pub payload_template: String,
    /// Timeout seconds.
    pub timeout_seconds: u32,
    /// Retry policy, if the runbook opted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl From<&Runbook> for RunbookSnapshot {
    fn from(runbook: &Runbook) -> Self {
        Self {
            http: runbook.http.clone(),
            payload_template: runbook.payload_template.clone(),
            timeout_seconds: runbook.timeout_seconds,
            retry: runbook.retry,
        }
    }
}

/// One runbook execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunbookExecution {
    /// Identity.
    pub id: ExecutionId,
    /// The runbook.
    pub runbook_id: RunbookId,
    /// The version executed.
    pub runbook_version: u32,
    /// Definition snapshot.
    pub snapshot: RunbookSnapshot,
    /// The incident context, when run against one.
    #[serde(default)]
    pub incident_id: Option<IncidentId>,
    /// Incident JSON snapshot at execution creation.
    #[serde(default)]
    pub incident_snapshot: Option<Value>,
    /// Validated, defaulted parameters.
    pub params: Map<String, Value>,
    /// Status.
    pub status: RunbookStatus,
    /// What started it.
    pub triggered_by: TriggeredBy,
    /// The human who started it, for manual runs.
    #[serde(default)]
    pub executed_by: Option<UserId>,
    /// Upstream status code.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Response preview, ≤4 KiB.
    #[serde(default)]
    pub response_preview: Option<String>,
    /// Failure reason.
    #[serde(default)]
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// First worker touch.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunbookExecution {
    /// Create a PENDING execution.
    #[must_use]
    pub fn create(
        runbook: &Runbook,
        incident_id: Option<IncidentId>,
        incident_snapshot: Option<Value>,
        params: Map<String, Value>,
        triggered_by: TriggeredBy,
        executed_by: Option<UserId>,
    ) -> Self {
        Self {
            id: ExecutionId::v4(),
            runbook_id: runbook.id,
            runbook_version: runbook.version,
            snapshot: RunbookSnapshot::from(runbook),
            incident_id,
            incident_snapshot,
            params,
            status: RunbookStatus::Pending,
            triggered_by,
            executed_by,
            status_code: None,
            response_preview: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}
