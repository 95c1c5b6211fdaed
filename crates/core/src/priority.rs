//! Incident priority scale.

use serde::{Deserialize, Serialize};

/// The five-step priority assigned to every incident.
///
/// Ordered from least to most urgent, so `Priority::Critical > Priority::Low`
/// holds and priorities can be compared directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Informational; no response expected.
    Info,
    /// Low urgency.
    Low,
    /// Default urgency for new incidents.
    #[default]
    Medium,
    /// High urgency.
    High,
    /// All-hands urgency.
    Critical,
}

impl Priority {
    /// The canonical wire form (`"CRITICAL"`, `"LOW"`, ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Self::Info),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(crate::error::CoreError::invalid_request(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}
