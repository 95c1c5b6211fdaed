//! The service entity.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use vigil_core::{ServiceId, TeamId};

use crate::error::ServiceError;

/// Routing keys: lowercase alphanumerics and dashes, 3..=64 chars.
static ROUTING_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{3,64}$").expect("routing key pattern is valid"));

/// Lifecycle status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    /// In service.
    #[default]
    Active,
    /// Still routed, marked for decommission.
    Deprecated,
    /// Out of service; cannot join new dependency edges.
    Archived,
}

/// One service catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Identity.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Unique human-readable key alerts route on.
    pub routing_key: String,
    /// Owning team.
    pub team_id: TeamId,
    /// Lifecycle status.
    pub status: ServiceStatus,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Service {
    /// Create an active service after validating the routing key.
    pub fn create(
        name: impl Into<String>,
        routing_key: impl Into<String>,
        team_id: TeamId,
    ) -> Result<Self, ServiceError> {
        let routing_key = routing_key.into();
        if !ROUTING_KEY.is_match(&routing_key) {
            return Err(ServiceError::InvalidRoutingKey(routing_key));
        }
        Ok(Self {
            id: ServiceId::v4(),
            name: name.into(),
            routing_key,
            team_id,
            status: ServiceStatus::Active,
            tags: Vec::new(),
            created_at: Utc::now(),
        })
    }
}
