//! Incident storage seam.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::{IncidentId, PolicyId, TeamId};

use crate::error::IncidentError;
use crate::incident::Incident;
use crate::status::IncidentStatus;

/// Incident storage.
///
/// `update` is a compare-and-swap on `version`; the state machine retries
/// conflicts. A SQL implementation maps this to
/// `UPDATE ... WHERE id = $1 AND version = $2`.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Insert a new incident.
    async fn insert(&self, incident: Incident) -> Result<(), IncidentError>;

    /// Fetch by id.
    async fn get(&self, id: IncidentId) -> Result<Option<Incident>, IncidentError>;

    /// Compare-and-swap: persist `incident` only if the stored version
    /// equals `expected_version`; the stored row gets `version + 1`.
    /// Returns `false` on version mismatch.
    async fn update(
        &self,
        incident: Incident,
        expected_version: u64,
    ) -> Result<bool, IncidentError>;

    /// OPEN incidents created before `cutoff`, optionally scoped to a
    /// team. Feeds the age poller.
    async fn open_older_than(
        &self,
        cutoff: DateTime<Utc>,
        team_id: Option<TeamId>,
    ) -> Result<Vec<Incident>, IncidentError>;

    /// Whether any OPEN/ACKNOWLEDGED incident references the policy.
    /// Guards policy deletion.
    async fn any_active_with_policy(&self, policy_id: PolicyId) -> Result<bool, IncidentError>;
}

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryIncidentStore {
    incidents: Mutex<HashMap<IncidentId, Incident>>,
}

impl MemoryIncidentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn insert(&self, incident: Incident) -> Result<(), IncidentError> {
        self.incidents.lock().insert(incident.id, incident);
        Ok(())
    }

    async fn get(&self, id: IncidentId) -> Result<Option<Incident>, IncidentError> {
        Ok(self.incidents.lock().get(&id).cloned())
    }

    async fn update(
        &self,
        incident: Incident,
        expected_version: u64,
    ) -> Result<bool, IncidentError> {
        let mut incidents = self.incidents.lock();
        let Some(stored) = incidents.get_mut(&incident.id) else {
            return Err(IncidentError::NotFound(incident.id));
        };
        if stored.version != expected_version {
            return Ok(false);
        }
        let mut next = incident;
        next.version = expected_version + 1;
        *stored = next;
        Ok(true)
    }

    async fn open_older_than(
        &self,
        cutoff: DateTime<Utc>,
        team_id: Option<TeamId>,
    ) -> Result<Vec<Incident>, IncidentError> {
        Ok(self
            .incidents
            .lock()
            .values()
            .filter(|i| i.status == IncidentStatus::Open && i.created_at < cutoff)
            .filter(|i| team_id.is_none_or(|t| i.team_id == t))
            .cloned()
            .collect())
    }

    async fn any_active_with_policy(&self, policy_id: PolicyId) -> Result<bool, IncidentError> {
        Ok(self
            .incidents
            .lock()
            .values()
            .any(|i| i.status.is_active() && i.policy_id == Some(policy_id)))
    }
}
