//! Service catalog and dependency graph.
//!
//! Services form a global directed acyclic graph through their
//! dependency relation. Mutations reject self-edges, archived endpoints,
//! and anything that would close a cycle; queries are bounded in both
//! depth and node count so a pathological graph cannot wedge a request.

mod catalog;
mod error;
mod service;

pub use catalog::{GraphView, ServiceCatalog};
pub use error::ServiceError;
pub use service::{Service, ServiceStatus};
