//! Workflow entities and the node-graph definition.
//!
//! A workflow is a versioned, immutable-per-version node graph: one
//! trigger, then actions, conditions, and delays joined by edges. The
//! save path validates everything (graph shape, action configuration,
//! template syntax) so the interpreter can trust any definition it is
//! handed.

mod definition;
mod error;
mod node;
mod store;
mod trigger;
mod validate;
mod workflow;

pub use definition::{Edge, EdgeHandle, Settings, WorkflowDefinition, parse_timeout};
pub use error::WorkflowError;
pub use node::{ActionConfig, Node, NodeKind, Position};
pub use store::{MemoryWorkflowStore, WorkflowStore};
pub use trigger::{StateTransition, TriggerCondition, TriggerConfig, TriggerKind};
pub use workflow::{Scope, Workflow, WorkflowExport};
