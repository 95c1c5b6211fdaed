//! Incident status.

use serde::{Deserialize, Serialize};

/// Where an incident is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// Newly created, nobody has taken it.
    #[default]
    Open,
    /// A responder has taken ownership; escalation stops.
    Acknowledged,
    /// The underlying problem is fixed.
    Resolved,
    /// Administratively closed after resolution.
    Closed,
    /// Soft-deleted; terminal.
    Archived,
}

impl IncidentStatus {
    /// Whether escalation and workflows still act on the incident.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Acknowledged)
    }

    /// Whether the incident can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }

    /// The canonical wire form (`"OPEN"`, ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
