//! Incident errors.

use vigil_core::IncidentId;

use crate::status::IncidentStatus;

/// Errors from the incident layer.
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// The requested transition is not in the legal table.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: IncidentStatus,
        /// Requested status.
        to: IncidentStatus,
    },

    /// Unknown incident.
    #[error("incident not found: {0}")]
    NotFound(IncidentId),

    /// The optimistic version check failed more times than the machine
    /// is willing to retry.
    #[error("version conflict on incident {0} persisted after retries")]
    Conflict(IncidentId),

    /// Backing store failure.
    #[error("incident store failure: {0}")]
    Store(String),

    /// Audit append failure (the transition is rolled back).
    #[error(transparent)]
    Audit(#[from] vigil_audit::AuditError),
}
