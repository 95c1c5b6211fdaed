//! # Vigil Core
//!
//! Core types shared by every Vigil crate: strongly-typed identifiers,
//! the incident priority scale, the surface error taxonomy, and process
//! configuration.
//!
//! ## Key components
//!
//! - **Identifiers**: `IncidentId`, `TeamId`, `UserId`, `PolicyId`,
//!   `ScheduleId`, `WorkflowId`, `NodeId`, `ExecutionId`, `RunbookId`,
//!   `ServiceId`, `JobId`
//! - **Priority**: the five-step incident priority scale
//! - **Error taxonomy**: [`ErrorKind`] mapping internal failures to their
//!   surface behavior
//! - **Config**: environment-driven process configuration

pub mod config;
pub mod error;
pub mod id;
pub mod priority;

pub use config::Config;
pub use error::{CoreError, ErrorKind};
pub use id::*;
pub use priority::Priority;

/// Result type used throughout Vigil.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Common prelude for Vigil crates.
pub mod prelude {
    pub use super::{
        Config, CoreError, ErrorKind, ExecutionId, IncidentId, JobId, NodeId, PolicyId, Priority,
        Result, RunbookId, ScheduleId, ServiceId, TeamId, UserId, WorkflowId,
    };
}
