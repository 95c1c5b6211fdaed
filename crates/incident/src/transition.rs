//! The legal transition table.

use crate::status::IncidentStatus;

/// Whether `from -> to` is a legal incident transition.
///
/// The table, exhaustively:
///
/// ```text
/// OPEN         -> ACKNOWLEDGED | RESOLVED
/// ACKNOWLEDGED -> RESOLVED
/// RESOLVED     -> CLOSED | OPEN (re-open) | ARCHIVED
/// CLOSED       -> ARCHIVED
/// ARCHIVED     -> (nothing)
/// ```
#[must_use]
pub fn can_transition(from: IncidentStatus, to: IncidentStatus) -> bool {
    use IncidentStatus::{Acknowledged, Archived, Closed, Open, Resolved};
    matches!(
        (from, to),
        (Open, Acknowledged | Resolved)
            | (Acknowledged, Resolved)
            | (Resolved, Closed | Open | Archived)
            | (Closed, Archived)
    )
}
