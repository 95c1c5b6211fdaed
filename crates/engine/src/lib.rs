//! The workflow engine.
//!
//! Matches lifecycle events against enabled workflows, snapshots each
//! match into a pending execution, and interprets the node graph on the
//! workflow topic's workers: actions through the shared HTTP layer,
//! conditions as string-equality branches, delays as suspend-and-resume
//! through the queue. A fixed-interval leader-only poller drives age
//! triggers, and the lifecycle bridge wires the event bus into both this
//! engine and the escalation scheduler.

mod actions;
mod age;
mod bridge;
mod engine;
mod error;
mod interpreter;
mod matcher;
mod runtime;

pub use actions::{ActionRunner, IntegrationConfig, JiraIntegration, LinearIntegration};
pub use age::{AGE_POLL_INTERVAL, AgePoller};
pub use bridge::LifecycleBridge;
pub use engine::WorkflowEngine;
pub use error::EngineError;
pub use interpreter::{WorkflowJobPayload, WorkflowWorker};
pub use matcher::event_matches;
pub use runtime::{AutomationCore, CoreDeps};
