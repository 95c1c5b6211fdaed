//! Escalation errors.

use vigil_core::{IncidentId, PolicyId};

/// Errors from the escalation engine.
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    /// Policy failed a validation invariant.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Unknown policy.
    #[error("policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// Unknown incident.
    #[error("incident not found: {0}")]
    IncidentNotFound(IncidentId),

    /// The incident carries no escalation policy.
    #[error("incident {0} has no escalation policy")]
    NoPolicy(IncidentId),

    /// Deleting a policy still referenced by active incidents.
    #[error("policy {0} is referenced by open or acknowledged incidents")]
    PolicyInUse(PolicyId),

    /// Another escalation job is already pending for the incident.
    #[error("incident {0} already has a pending escalation job")]
    AlreadyScheduled(IncidentId),

    /// Queue failure.
    #[error(transparent)]
    Queue(#[from] vigil_queue::QueueError),

    /// Incident layer failure.
    #[error(transparent)]
    Incident(#[from] vigil_incident::IncidentError),

    /// Audit failure.
    #[error(transparent)]
    Audit(#[from] vigil_audit::AuditError),

    /// Backing store failure.
    #[error("escalation store failure: {0}")]
    Store(String),
}
