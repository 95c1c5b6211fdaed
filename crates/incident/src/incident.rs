//! The incident entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{IncidentId, PolicyId, Priority, TeamId, UserId};

use crate::status::IncidentStatus;

/// An incident row.
///
/// `version` is the optimistic-concurrency counter: every committed
/// mutation bumps it, and a compare-and-swap against a stale version is
/// retried by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Identity.
    pub id: IncidentId,
    /// Short human summary.
    pub title: String,
    /// Urgency.
    pub priority: Priority,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Owning team.
    pub team_id: TeamId,
    /// The escalation policy driving notification, if bound.
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    /// Current escalation level; 0 means escalation has not started.
    pub escalation_level: u32,
    /// Assigned responder.
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    /// Free-form metadata, reachable from trigger conditions and
    /// templates via dotted paths (`metadata.service`).
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When a responder acknowledged.
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// When the incident was resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: u64,
}

/// Parameters for creating an incident.
#[derive(Debug, Clone)]
pub struct NewIncident {
    /// Short human summary.
    pub title: String,
    /// Urgency.
    pub priority: Priority,
    /// Owning team.
    pub team_id: TeamId,
    /// Escalation policy to bind, if any.
    pub policy_id: Option<PolicyId>,
    /// Free-form metadata.
    pub metadata: serde_json::Map<String, Value>,
}

impl Incident {
    /// Materialize a new OPEN incident.
    #[must_use]
    pub fn create(new: NewIncident) -> Self {
        Self {
            id: IncidentId::v4(),
            title: new.title,
            priority: new.priority,
            status: IncidentStatus::Open,
            team_id: new.team_id,
            policy_id: new.policy_id,
            escalation_level: 0,
            assignee_id: None,
            metadata: new.metadata,
            created_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            version: 1,
        }
    }

    /// The JSON snapshot consumers see on the event bus and in template
    /// contexts. Field names here are the dotted-path surface trigger
    /// conditions address (`priority`, `status`, `metadata.service`).
    #[must_use]
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_starts_open_at_level_zero() {
        let incident = Incident::create(NewIncident {
            title: "db down".into(),
            priority: Priority::Critical,
            team_id: TeamId::v4(),
            policy_id: None,
            metadata: serde_json::Map::new(),
        });
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.escalation_level, 0);
        assert_eq!(incident.version, 1);
        assert!(incident.assignee_id.is_none());
    }

    #[test]
    fn snapshot_exposes_condition_paths() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("service".into(), Value::String("payments".into()));
        let incident = Incident::create(NewIncident {
            title: "latency".into(),
            priority: Priority::High,
            team_id: TeamId::v4(),
            policy_id: None,
            metadata,
        });

        let snapshot = incident.snapshot();
        assert_eq!(snapshot["priority"], "HIGH");
        assert_eq!(snapshot["status"], "OPEN");
        assert_eq!(snapshot["metadata"]["service"], "payments");
    }
}
