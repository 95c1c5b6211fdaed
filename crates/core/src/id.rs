//! Unique identifiers for Vigil entities.
//!
//! Strongly-typed UUID identifiers built on [`domain-key`](https://crates.io/crates/domain-key)
//! `Uuid<D>` wrappers. Each identifier type is parameterized by a unique
//! domain marker, so an `IncidentId` can never be passed where a
//! `WorkflowId` is expected.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers: UUID-based, Copy, 16 bytes each
define_uuid!(pub IncidentIdDomain => IncidentId);
define_uuid!(pub TeamIdDomain => TeamId);
define_uuid!(pub UserIdDomain => UserId);
define_uuid!(pub PolicyIdDomain => PolicyId);
define_uuid!(pub ScheduleIdDomain => ScheduleId);
define_uuid!(pub WorkflowIdDomain => WorkflowId);
define_uuid!(pub NodeIdDomain => NodeId);
define_uuid!(pub ExecutionIdDomain => ExecutionId);
define_uuid!(pub RunbookIdDomain => RunbookId);
define_uuid!(pub ServiceIdDomain => ServiceId);
define_uuid!(pub JobIdDomain => JobId);
