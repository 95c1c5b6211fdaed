//! Runbook errors.

use vigil_core::RunbookId;

use crate::runbook::ApprovalStatus;

/// Errors from the runbook engine.
#[derive(Debug, thiserror::Error)]
pub enum RunbookError {
    /// The runbook definition is malformed.
    #[error("invalid runbook: {0}")]
    Invalid(String),

    /// Unknown runbook.
    #[error("runbook not found: {0}")]
    NotFound(RunbookId),

    /// Execution of a non-approved runbook.
    #[error("runbook {id} is {status:?}, only approved runbooks execute")]
    NotApproved {
        /// The runbook.
        id: RunbookId,
        /// Its current approval status.
        status: ApprovalStatus,
    },

    /// An approval transition outside Draft→Approved→Deprecated.
    #[error("approval transition {from:?} -> {to:?} is not allowed")]
    InvalidApprovalTransition {
        /// Current status.
        from: ApprovalStatus,
        /// Requested status.
        to: ApprovalStatus,
    },

    /// The caller's team context does not match a team-scoped runbook.
    #[error("runbook {0} belongs to another team")]
    Forbidden(RunbookId),

    /// Parameters failed schema validation; one reason per field.
    #[error("invalid parameters: {}", format_field_errors(.0))]
    InvalidParameters(Vec<(String, String)>),

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
    #[error("runbook store failure: {0}")]
    Store(String),
}

fn format_field_errors(errors: &[(String, String)]) -> String {
    errors
        .iter()
        .map(|(field, reason)| format!("{field}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}
