//! Broadcast bus for incident lifecycle events.
//!
//! Uses [`tokio::sync::broadcast`] for fan-out delivery to multiple
//! subscribers (the escalation engine and the workflow trigger matcher).
//! Events are emitted *after* the state mutation they describe has
//! committed; they are projections, **not** the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vigil_core::{IncidentId, TeamId, WorkflowId};

/// What happened to the incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleKind {
    /// The incident was persisted for the first time.
    Created,
    /// The incident moved between states.
    StateChanged {
        /// Status before the transition (wire form, e.g. `"OPEN"`).
        from: String,
        /// Status after the transition.
        to: String,
    },
    /// The escalation engine advanced to a level.
    Escalated {
        /// The level that was just triggered (1-based).
        level: u32,
    },
}

impl LifecycleKind {
    /// The dotted action name used for trigger matching and audit rows.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Created => "incident.created",
            Self::StateChanged { .. } => "incident.state_changed",
            Self::Escalated { .. } => "incident.escalated",
        }
    }
}

/// An incident lifecycle event as observed on the bus.
///
/// Carries a JSON snapshot of the incident at emission time so consumers
/// evaluate trigger conditions against what the incident looked like when
/// the event fired, not whatever it mutated into afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// The incident this event belongs to.
    pub incident_id: IncidentId,
    /// The incident's owning team.
    pub team_id: TeamId,
    /// What happened.
    pub kind: LifecycleKind,
    /// JSON snapshot of the incident at emission time.
    pub incident: serde_json::Value,
    /// Workflow ids already traversed in the reactive cascade that led to
    /// this event. Empty for organic events; the trigger matcher skips any
    /// workflow present here.
    #[serde(default)]
    pub chain: Vec<WorkflowId>,
    /// When the event was emitted.
    pub at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Build an event with an empty cascade chain.
    #[must_use]
    pub fn new(
        incident_id: IncidentId,
        team_id: TeamId,
        kind: LifecycleKind,
        incident: serde_json::Value,
    ) -> Self {
        Self {
            incident_id,
            team_id,
            kind,
            incident,
            chain: Vec::new(),
            at: Utc::now(),
        }
    }

    /// Attach the cascade chain that produced this event.
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<WorkflowId>) -> Self {
        self.chain = chain;
        self
    }
}

/// Broadcast-based lifecycle event bus.
///
/// Delivers events to all active subscribers. If no subscribers are
/// listening, events are silently dropped (fire-and-forget).
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

/// Default channel capacity; lagging subscribers lose the oldest events.
const DEFAULT_CAPACITY: usize = 1024;

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: LifecycleEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_event(kind: LifecycleKind) -> LifecycleEvent {
        LifecycleEvent::new(
            IncidentId::v4(),
            TeamId::v4(),
            kind,
            serde_json::json!({"priority": "HIGH"}),
        )
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let event = sample_event(LifecycleKind::Created);
        bus.emit(event.clone());

        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(sample_event(LifecycleKind::Escalated { level: 2 }));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn action_names_are_dotted() {
        assert_eq!(LifecycleKind::Created.action(), "incident.created");
        assert_eq!(
            LifecycleKind::StateChanged {
                from: "OPEN".into(),
                to: "ACKNOWLEDGED".into()
            }
            .action(),
            "incident.state_changed"
        );
        assert_eq!(
            LifecycleKind::Escalated { level: 1 }.action(),
            "incident.escalated"
        );
    }
}
