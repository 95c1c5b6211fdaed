//! Workflow errors.

use vigil_core::{NodeId, WorkflowId};

/// Errors from the workflow layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The definition failed a structural invariant.
    #[error("invalid workflow definition: {0}")]
    Invalid(String),

    /// A template embedded in the definition failed to parse.
    #[error("template error in node {node_id}: {error}")]
    Template {
        /// The node carrying the bad template.
        node_id: NodeId,
        /// The parse failure.
        error: vigil_template::TemplateError,
    },

    /// The graph contains a cycle.
    #[error("workflow graph contains a cycle through node {0}")]
    Cycle(NodeId),

    /// A settings timeout string failed to parse.
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(String),

    /// Unknown workflow.
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),

    /// Backing store failure.
    #[error("workflow store failure: {0}")]
    Store(String),
}
