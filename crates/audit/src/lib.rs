//! Append-only audit and timeline event stream.
//!
//! Every engine writes here: incident transitions, escalation level
//! triggers, workflow node results, runbook approvals. Events are written
//! in the same critical section as the mutation they record, queried per
//! incident for the timeline view, and swept by a retention job.

mod event;
mod sink;
mod timeline;

pub use event::{AuditEvent, ResourceKind, Severity};
pub use sink::{AuditError, AuditSink, MemoryAuditSink};
pub use timeline::{ExecutionGroupState, TimelineEntry, group_timeline};
