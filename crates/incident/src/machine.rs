//! The state machine service.
//!
//! Each legal transition does three things as one unit: update the
//! incident row (compare-and-swap on version, retried on conflict),
//! append the timeline event, and publish the lifecycle event. With the
//! reference store the CAS is the critical section; a SQL store wraps the
//! row update and the audit insert in one transaction.

use std::sync::Arc;

use chrono::Utc;
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{IncidentId, UserId};
use vigil_eventbus::{EventBus, LifecycleEvent, LifecycleKind};

use crate::error::IncidentError;
use crate::incident::{Incident, NewIncident};
use crate::status::IncidentStatus;
use crate::store::IncidentStore;
use crate::transition::can_transition;

/// CAS retries before giving up on a hot row.
const MAX_CAS_RETRIES: u32 = 3;

/// A requested transition with its actor and context.
#[derive(Debug, Clone)]
pub enum TransitionRequest {
    /// A responder takes the incident; cancels escalation downstream.
    Acknowledge {
        /// The acknowledging responder.
        user_id: UserId,
        /// Optional note for the timeline.
        note: Option<String>,
    },
    /// The underlying problem is fixed.
    Resolve {
        /// The resolving responder.
        user_id: UserId,
        /// Resolution note.
        note: Option<String>,
    },
    /// Administrative close after resolution.
    Close {
        /// The closing responder.
        user_id: UserId,
    },
    /// Re-open a resolved incident.
    Reopen {
        /// The re-opening responder.
        user_id: UserId,
    },
    /// Soft-delete; only from CLOSED or RESOLVED.
    Archive {
        /// The archiving responder.
        user_id: UserId,
    },
}

impl TransitionRequest {
    /// The status this request targets.
    #[must_use]
    pub fn target(&self) -> IncidentStatus {
        match self {
            Self::Acknowledge { .. } => IncidentStatus::Acknowledged,
            Self::Resolve { .. } => IncidentStatus::Resolved,
            Self::Close { .. } => IncidentStatus::Closed,
            Self::Reopen { .. } => IncidentStatus::Open,
            Self::Archive { .. } => IncidentStatus::Archived,
        }
    }

    /// The timeline action name.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Acknowledge { .. } => "incident.acknowledged",
            Self::Resolve { .. } => "incident.resolved",
            Self::Close { .. } => "incident.closed",
            Self::Reopen { .. } => "incident.reopened",
            Self::Archive { .. } => "incident.archived",
        }
    }

    fn user_id(&self) -> UserId {
        match self {
            Self::Acknowledge { user_id, .. }
            | Self::Resolve { user_id, .. }
            | Self::Close { user_id }
            | Self::Reopen { user_id }
            | Self::Archive { user_id } => *user_id,
        }
    }

    fn note(&self) -> Option<&str> {
        match self {
            Self::Acknowledge { note, .. } | Self::Resolve { note, .. } => note.as_deref(),
            _ => None,
        }
    }
}

/// The incident state machine.
pub struct IncidentMachine {
    store: Arc<dyn IncidentStore>,
    audit: Arc<dyn AuditSink>,
    bus: Arc<EventBus>,
}

impl IncidentMachine {
    /// Wire the machine to its store, sink, and bus.
    #[must_use]
    pub fn new(store: Arc<dyn IncidentStore>, audit: Arc<dyn AuditSink>, bus: Arc<EventBus>) -> Self {
        Self { store, audit, bus }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn IncidentStore> {
        Arc::clone(&self.store)
    }

    /// Create an OPEN incident, audit it, and publish `incident.created`.
    pub async fn create(&self, new: NewIncident) -> Result<Incident, IncidentError> {
        let incident = Incident::create(new);
        self.store.insert(incident.clone()).await?;

        self.audit
            .append(
                AuditEvent::new("incident.created", ResourceKind::Incident, incident.id.to_string())
                    .for_team(incident.team_id)
                    .on_incident(incident.id),
            )
            .await?;

        self.bus.emit(LifecycleEvent::new(
            incident.id,
            incident.team_id,
            LifecycleKind::Created,
            incident.snapshot(),
        ));

        tracing::info!(incident_id = %incident.id, priority = %incident.priority, "incident created");
        Ok(incident)
    }

    /// Apply a transition.
    ///
    /// Duplicate acknowledgement is a no-op returning the current row
    /// without a second timeline event. Any other illegal transition
    /// fails with [`IncidentError::InvalidTransition`] and no side effect.
    pub async fn transition(
        &self,
        id: IncidentId,
        request: TransitionRequest,
    ) -> Result<Incident, IncidentError> {
        let target = request.target();

        for _ in 0..MAX_CAS_RETRIES {
            let Some(current) = self.store.get(id).await? else {
                return Err(IncidentError::NotFound(id));
            };

            if matches!(request, TransitionRequest::Acknowledge { .. })
                && current.status == IncidentStatus::Acknowledged
            {
                return Ok(current);
            }

            if !can_transition(current.status, target) {
                return Err(IncidentError::InvalidTransition {
                    from: current.status,
                    to: target,
                });
            }

            let from = current.status;
            let expected_version = current.version;
            let mut next = current;
            next.status = target;
            match &request {
                TransitionRequest::Acknowledge { user_id, .. } => {
                    next.acknowledged_at = Some(Utc::now());
                    next.assignee_id = Some(*user_id);
                }
                TransitionRequest::Resolve { .. } => {
                    next.resolved_at = Some(Utc::now());
                }
                TransitionRequest::Reopen { .. } => {
                    next.resolved_at = None;
                    next.acknowledged_at = None;
                    next.assignee_id = None;
                }
                TransitionRequest::Close { .. } | TransitionRequest::Archive { .. } => {}
            }

            if !self.store.update(next.clone(), expected_version).await? {
                tracing::debug!(incident_id = %id, "version conflict, retrying transition");
                continue;
            }
            next.version = expected_version + 1;

            let mut event = AuditEvent::new(
                request.action(),
                ResourceKind::Incident,
                id.to_string(),
            )
            .by_user(request.user_id())
            .for_team(next.team_id)
            .on_incident(id);
            if let Some(note) = request.note() {
                event = event.with_meta("note", note);
            }
            self.audit.append(event).await?;

            self.bus.emit(LifecycleEvent::new(
                id,
                next.team_id,
                LifecycleKind::StateChanged {
                    from: from.as_str().to_owned(),
                    to: target.as_str().to_owned(),
                },
                next.snapshot(),
            ));

            tracing::info!(incident_id = %id, from = %from, to = %target, "incident transitioned");
            return Ok(next);
        }

        Err(IncidentError::Conflict(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIncidentStore;
    use pretty_assertions::assert_eq;
    use vigil_audit::MemoryAuditSink;
    use vigil_core::{Priority, TeamId};

    fn machine() -> (IncidentMachine, Arc<MemoryAuditSink>, Arc<EventBus>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let bus = Arc::new(EventBus::new());
        let machine = IncidentMachine::new(
            Arc::new(MemoryIncidentStore::new()),
            audit.clone(),
            bus.clone(),
        );
        (machine, audit, bus)
    }

    fn new_incident() -> NewIncident {
        NewIncident {
            title: "checkout errors".into(),
            priority: Priority::High,
            team_id: TeamId::v4(),
            policy_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn create_audits_and_emits() {
        let (machine, audit, bus) = machine();
        let mut rx = bus.subscribe();

        let incident = machine.create(new_incident()).await.unwrap();

        assert_eq!(audit.with_action("incident.created").len(), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.incident_id, incident.id);
        assert_eq!(event.kind, LifecycleKind::Created);
    }

    #[tokio::test]
    async fn acknowledge_sets_assignee_and_emits_state_change() {
        let (machine, audit, bus) = machine();
        let incident = machine.create(new_incident()).await.unwrap();
        let mut rx = bus.subscribe();
        let user = UserId::v4();

        let acked = machine
            .transition(
                incident.id,
                TransitionRequest::Acknowledge {
                    user_id: user,
                    note: Some("looking".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(acked.status, IncidentStatus::Acknowledged);
        assert_eq!(acked.assignee_id, Some(user));
        assert!(acked.acknowledged_at.is_some());
        assert_eq!(acked.version, 2);
        assert_eq!(audit.with_action("incident.acknowledged").len(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.kind,
            LifecycleKind::StateChanged {
                from: "OPEN".into(),
                to: "ACKNOWLEDGED".into()
            }
        );
        assert_eq!(event.incident["status"], "ACKNOWLEDGED");
    }

    #[tokio::test]
    async fn duplicate_acknowledge_is_a_noop() {
        let (machine, audit, _bus) = machine();
        let incident = machine.create(new_incident()).await.unwrap();
        let user = UserId::v4();

        let ack = |note: &str| TransitionRequest::Acknowledge {
            user_id: user,
            note: Some(note.into()),
        };
        let first = machine.transition(incident.id, ack("one")).await.unwrap();
        let second = machine.transition(incident.id, ack("two")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(audit.with_action("incident.acknowledged").len(), 1);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_without_side_effect() {
        let (machine, audit, _bus) = machine();
        let incident = machine.create(new_incident()).await.unwrap();

        let err = machine
            .transition(incident.id, TransitionRequest::Archive { user_id: UserId::v4() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IncidentError::InvalidTransition {
                from: IncidentStatus::Open,
                to: IncidentStatus::Archived
            }
        ));
        assert!(audit.with_action("incident.archived").is_empty());
    }

    #[tokio::test]
    async fn full_lifecycle_to_archive() {
        let (machine, _audit, _bus) = machine();
        let incident = machine.create(new_incident()).await.unwrap();
        let user = UserId::v4();

        machine
            .transition(incident.id, TransitionRequest::Acknowledge { user_id: user, note: None })
            .await
            .unwrap();
        machine
            .transition(incident.id, TransitionRequest::Resolve { user_id: user, note: None })
            .await
            .unwrap();
        machine
            .transition(incident.id, TransitionRequest::Close { user_id: user })
            .await
            .unwrap();
        let archived = machine
            .transition(incident.id, TransitionRequest::Archive { user_id: user })
            .await
            .unwrap();

        assert_eq!(archived.status, IncidentStatus::Archived);
        assert_eq!(archived.version, 5);
    }

    #[tokio::test]
    async fn reopen_clears_resolution_fields() {
        let (machine, _audit, _bus) = machine();
        let incident = machine.create(new_incident()).await.unwrap();
        let user = UserId::v4();

        machine
            .transition(incident.id, TransitionRequest::Resolve { user_id: user, note: None })
            .await
            .unwrap();
        let reopened = machine
            .transition(incident.id, TransitionRequest::Reopen { user_id: user })
            .await
            .unwrap();

        assert_eq!(reopened.status, IncidentStatus::Open);
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.assignee_id.is_none());
    }
}
