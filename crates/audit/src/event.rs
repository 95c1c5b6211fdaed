//! Audit event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{IncidentId, TeamId, UserId};

/// Severity of an audit event. `High` marks security-relevant actions
/// (runbook approvals, permission-adjacent mutations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Routine operational event.
    #[default]
    Info,
    /// Security-relevant event.
    High,
}

/// The kind of resource an audit event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// An incident.
    Incident,
    /// An escalation policy.
    Policy,
    /// A workflow.
    Workflow,
    /// A workflow execution.
    Execution,
    /// A runbook.
    Runbook,
    /// A service catalog entry.
    Service,
}

/// One append-only audit/timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Dotted action name, e.g. `workflow.action.completed`.
    pub action: String,
    /// The acting user, absent for system actions.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// The owning team, absent for global resources.
    #[serde(default)]
    pub team_id: Option<TeamId>,
    /// What the event refers to.
    pub resource_kind: ResourceKind,
    /// The referred resource's id, stringly typed across id domains.
    pub resource_id: String,
    /// The incident this event belongs to, when any; the timeline view
    /// is keyed by this.
    #[serde(default)]
    pub incident_id: Option<IncidentId>,
    /// Event severity.
    #[serde(default)]
    pub severity: Severity,
    /// When the event happened.
    pub at: DateTime<Utc>,
    /// Free-form metadata; `executionId` here drives timeline grouping.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl AuditEvent {
    /// Start an event for a resource with the current timestamp.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        resource_kind: ResourceKind,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            user_id: None,
            team_id: None,
            resource_kind,
            resource_id: resource_id.into(),
            incident_id: None,
            severity: Severity::Info,
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attribute the event to a user.
    #[must_use]
    pub fn by_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Scope the event to a team.
    #[must_use]
    pub fn for_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// Key the event into an incident's timeline.
    #[must_use]
    pub fn on_incident(mut self, incident_id: IncidentId) -> Self {
        self.incident_id = Some(incident_id);
        self
    }

    /// Raise the severity to `High`.
    #[must_use]
    pub fn high_severity(mut self) -> Self {
        self.severity = Severity::High;
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `executionId` metadata entry, when present.
    #[must_use]
    pub fn execution_id_meta(&self) -> Option<&str> {
        self.metadata.get("executionId").and_then(Value::as_str)
    }
}
