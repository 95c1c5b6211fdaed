//! Service layer errors.

use vigil_core::ServiceId;

/// Errors from the service catalog and dependency graph.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Routing key fails the `^[a-z0-9-]{3,64}$` shape.
    #[error("invalid routing key: {0:?}")]
    InvalidRoutingKey(String),

    /// Another service already owns the routing key.
    #[error("routing key already in use: {0:?}")]
    DuplicateRoutingKey(String),

    /// Unknown service.
    #[error("service not found: {0}")]
    NotFound(ServiceId),

    /// A service cannot depend on itself.
    #[error("service {0} cannot depend on itself")]
    SelfDependency(ServiceId),

    /// Archived services cannot join new edges.
    #[error("service {0} is archived")]
    Archived(ServiceId),

    /// The edge would close a dependency cycle.
    #[error("dependency {from} -> {to} would create a cycle")]
    Cycle {
        /// Proposed edge source.
        from: ServiceId,
        /// Proposed edge target.
        to: ServiceId,
    },

    /// Audit append failure.
    #[error(transparent)]
    Audit(#[from] vigil_audit::AuditError),
}
