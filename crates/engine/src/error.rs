//! Engine errors.

use vigil_core::WorkflowId;

/// Errors from the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown workflow.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// A manual trigger on a disabled workflow.
    #[error("workflow {0} is disabled")]
    WorkflowDisabled(WorkflowId),

    /// Workflow layer failure.
    #[error(transparent)]
    Workflow(#[from] vigil_workflow::WorkflowError),

    /// Execution store failure.
    #[error(transparent)]
    Execution(#[from] vigil_execution::ExecutionError),

    /// Incident layer failure.
    #[error(transparent)]
    Incident(#[from] vigil_incident::IncidentError),

    /// Queue failure.
    #[error(transparent)]
    Queue(#[from] vigil_queue::QueueError),

    /// Audit failure.
    #[error(transparent)]
    Audit(#[from] vigil_audit::AuditError),
}
