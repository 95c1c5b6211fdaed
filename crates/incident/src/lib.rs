//! Incident entity and state machine.
//!
//! The incident row is the synchronization point for everything the
//! automation core does: transitions are serialized per incident with an
//! optimistic version check, and each legal transition atomically updates
//! the row, appends the timeline event, and publishes the lifecycle event
//! the escalation and workflow engines react to.

mod error;
mod incident;
mod machine;
mod status;
mod store;
mod transition;

pub use error::IncidentError;
pub use incident::{Incident, NewIncident};
pub use machine::{IncidentMachine, TransitionRequest};
pub use status::IncidentStatus;
pub use store::{IncidentStore, MemoryIncidentStore};
pub use transition::can_transition;
