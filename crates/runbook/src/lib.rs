//! Runbook engine.
//!
//! A runbook is a parameterized, approval-gated outbound HTTP call.
//! Only `APPROVED` runbooks execute; parameters are validated against a
//! typed schema (defaults applied, required enforced, enums checked);
//! the worker performs exactly one request and records the outcome.
//! Approval transitions are high-severity audit events.

mod error;
mod execution;
mod runbook;
mod schema;
mod service;
mod store;
mod worker;

pub use error::RunbookError;
pub use execution::{RunbookExecution, RunbookSnapshot, RunbookStatus, TriggeredBy};
pub use runbook::{ApprovalStatus, Runbook, RunbookHttpSpec};
pub use schema::{ParameterSchema, ParameterSpec, ParameterType};
pub use service::RunbookService;
pub use store::{
    MemoryRunbookExecutionStore, MemoryRunbookStore, RunbookExecutionStore, RunbookStore,
};
pub use worker::{RunbookPayload, RunbookWorker};
