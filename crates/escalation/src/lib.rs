//! Escalation engine.
//!
//! For every OPEN incident bound to a policy: walk the policy's levels on
//! timers, notify each level's targets, and, if nobody acknowledges,
//! repeat the whole ladder up to the policy's repeat count. Notifications
//! leave as directives; delivery belongs to the notification service.

mod directory;
mod error;
mod job;
mod notify;
mod policy;
mod scheduler;
mod store;
mod worker;

pub use directory::{StaticDirectory, TargetDirectory};
pub use error::EscalationError;
pub use job::EscalationJob;
pub use notify::{MemoryNotifySink, NotifyDirective, NotifySink};
pub use policy::{EscalationLevel, EscalationPolicy, LevelTarget};
pub use scheduler::{EscalationScheduler, STALE_GRACE};
pub use store::{EscalationJobStore, MemoryEscalationStore, MemoryPolicyStore, PolicyStore};
pub use worker::{EscalationPayload, EscalationWorker};
