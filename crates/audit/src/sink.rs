//! The append-only sink and its in-memory reference implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use vigil_core::IncidentId;

use crate::event::AuditEvent;

/// Failure while writing or reading the audit stream.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The backing store rejected the operation.
    #[error("audit store failure: {0}")]
    Store(String),
}

/// Append-only audit store.
///
/// `append` is invoked inside the critical section of the mutation it
/// records; implementations must not reorder or drop writes that were
/// acknowledged.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event.
    async fn append(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// All events for an incident, oldest first.
    async fn for_incident(&self, incident_id: IncidentId) -> Result<Vec<AuditEvent>, AuditError>;

    /// Delete events older than the cutoff; returns how many were removed.
    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditError>;
}

/// In-memory reference sink used by the engines' tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Events whose action matches exactly.
    #[must_use]
    pub fn with_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::debug!(action = %event.action, resource = %event.resource_id, "audit append");
        self.events.write().push(event);
        Ok(())
    }

    async fn for_incident(&self, incident_id: IncidentId) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.incident_id == Some(incident_id))
            .cloned()
            .collect())
    }

    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditError> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|e| e.at >= cutoff);
        Ok(before - events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResourceKind;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn append_and_query_by_incident() {
        let sink = MemoryAuditSink::new();
        let incident = IncidentId::v4();

        sink.append(
            AuditEvent::new("incident.created", ResourceKind::Incident, "i1")
                .on_incident(incident),
        )
        .await
        .unwrap();
        sink.append(AuditEvent::new("service.updated", ResourceKind::Service, "s1"))
            .await
            .unwrap();

        let events = sink.for_incident(incident).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "incident.created");
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_events() {
        let sink = MemoryAuditSink::new();
        let mut old = AuditEvent::new("incident.created", ResourceKind::Incident, "i1");
        old.at = Utc::now() - Duration::days(120);
        sink.append(old).await.unwrap();
        sink.append(AuditEvent::new("incident.resolved", ResourceKind::Incident, "i1"))
            .await
            .unwrap();

        let removed = sink
            .sweep_older_than(Utc::now() - Duration::days(90))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(sink.all().len(), 1);

        // Idempotent: a second sweep at the same cutoff removes nothing.
        let removed = sink
            .sweep_older_than(Utc::now() - Duration::days(90))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
