//! Policy and escalation-job storage seams.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::{IncidentId, JobId, PolicyId, TeamId};

use crate::error::EscalationError;
use crate::job::EscalationJob;
use crate::policy::EscalationPolicy;

/// Policy storage.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert or replace a policy.
    async fn upsert(&self, policy: EscalationPolicy) -> Result<(), EscalationError>;

    /// Fetch by id.
    async fn get(&self, id: PolicyId) -> Result<Option<EscalationPolicy>, EscalationError>;

    /// Delete by id (reference checks happen a layer up).
    async fn delete(&self, id: PolicyId) -> Result<(), EscalationError>;

    /// Mark one policy the team default, clearing any other default of
    /// the same team in the same critical section.
    async fn set_default(&self, team_id: TeamId, id: PolicyId) -> Result<(), EscalationError>;

    /// The team's default policy, if any.
    async fn default_for_team(
        &self,
        team_id: TeamId,
    ) -> Result<Option<EscalationPolicy>, EscalationError>;
}

/// Escalation-job storage. Enforces the one-pending-job-per-incident
/// invariant at insert.
#[async_trait]
pub trait EscalationJobStore: Send + Sync {
    /// Insert a new record; rejects when the incident already has a
    /// non-completed record.
    async fn insert(&self, job: EscalationJob) -> Result<(), EscalationError>;

    /// Fetch by id.
    async fn get(&self, id: JobId) -> Result<Option<EscalationJob>, EscalationError>;

    /// The incident's non-completed record, if any.
    async fn active_for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Option<EscalationJob>, EscalationError>;

    /// Record that a worker picked the step up.
    async fn mark_executed(&self, id: JobId, at: DateTime<Utc>) -> Result<(), EscalationError>;

    /// Record that the step finished.
    async fn mark_completed(&self, id: JobId) -> Result<(), EscalationError>;

    /// Complete-and-detach any active record for the incident (on
    /// acknowledge/resolve/policy change). Returns the detached record.
    async fn cancel_active(
        &self,
        incident_id: IncidentId,
    ) -> Result<Option<EscalationJob>, EscalationError>;
}

/// In-memory policy store.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: Mutex<HashMap<PolicyId, EscalationPolicy>>,
}

impl MemoryPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn upsert(&self, policy: EscalationPolicy) -> Result<(), EscalationError> {
        policy.validate()?;
        self.policies.lock().insert(policy.id, policy);
        Ok(())
    }

    async fn get(&self, id: PolicyId) -> Result<Option<EscalationPolicy>, EscalationError> {
        Ok(self.policies.lock().get(&id).cloned())
    }

    async fn delete(&self, id: PolicyId) -> Result<(), EscalationError> {
        self.policies.lock().remove(&id);
        Ok(())
    }

    async fn set_default(&self, team_id: TeamId, id: PolicyId) -> Result<(), EscalationError> {
        let mut policies = self.policies.lock();
        if !policies.contains_key(&id) {
            return Err(EscalationError::PolicyNotFound(id));
        }
        for policy in policies.values_mut() {
            if policy.team_id == team_id {
                policy.is_default = policy.id == id;
            }
        }
        Ok(())
    }

    async fn default_for_team(
        &self,
        team_id: TeamId,
    ) -> Result<Option<EscalationPolicy>, EscalationError> {
        Ok(self
            .policies
            .lock()
            .values()
            .find(|p| p.team_id == team_id && p.is_default)
            .cloned())
    }
}

/// In-memory escalation-job store.
#[derive(Debug, Default)]
pub struct MemoryEscalationStore {
    jobs: Mutex<HashMap<JobId, EscalationJob>>,
}

impl MemoryEscalationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, for tests.
    #[must_use]
    pub fn all(&self) -> Vec<EscalationJob> {
        self.jobs.lock().values().cloned().collect()
    }
}

#[async_trait]
impl EscalationJobStore for MemoryEscalationStore {
    async fn insert(&self, job: EscalationJob) -> Result<(), EscalationError> {
        let mut jobs = self.jobs.lock();
        if jobs
            .values()
            .any(|j| j.incident_id == job.incident_id && !j.completed)
        {
            return Err(EscalationError::AlreadyScheduled(job.incident_id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<EscalationJob>, EscalationError> {
        Ok(self.jobs.lock().get(&id).cloned())
    }

    async fn active_for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Option<EscalationJob>, EscalationError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .find(|j| j.incident_id == incident_id && !j.completed)
            .cloned())
    }

    async fn mark_executed(&self, id: JobId, at: DateTime<Utc>) -> Result<(), EscalationError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EscalationError::Store(format!("escalation job {id} not found")))?;
        job.executed_at = Some(at);
        Ok(())
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), EscalationError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EscalationError::Store(format!("escalation job {id} not found")))?;
        job.completed = true;
        Ok(())
    }

    async fn cancel_active(
        &self,
        incident_id: IncidentId,
    ) -> Result<Option<EscalationJob>, EscalationError> {
        let mut jobs = self.jobs.lock();
        let active = jobs
            .values_mut()
            .find(|j| j.incident_id == incident_id && !j.completed);
        Ok(active.map(|job| {
            job.completed = true;
            job.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EscalationLevel, LevelTarget};
    use vigil_core::UserId;

    fn policy(team: TeamId) -> EscalationPolicy {
        EscalationPolicy::new(
            team,
            "p",
            0,
            vec![EscalationLevel {
                number: 1,
                target: LevelTarget::User {
                    user_id: UserId::v4(),
                },
                timeout_minutes: 5,
            }],
        )
        .unwrap()
    }

    fn job(incident: IncidentId) -> EscalationJob {
        EscalationJob {
            id: JobId::v4(),
            incident_id: incident,
            level: 1,
            repeat_index: 0,
            queue_job_id: JobId::v4(),
            scheduled_for: Utc::now(),
            executed_at: None,
            completed: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn set_default_clears_other_team_defaults() {
        let store = MemoryPolicyStore::new();
        let team = TeamId::v4();
        let mut a = policy(team);
        a.is_default = true;
        let b = policy(team);
        let other_team = policy(TeamId::v4());
        let (a_id, b_id) = (a.id, b.id);
        let other_id = other_team.id;

        store.upsert(a).await.unwrap();
        store.upsert(b).await.unwrap();
        let mut other = other_team;
        other.is_default = true;
        store.upsert(other).await.unwrap();

        store.set_default(team, b_id).await.unwrap();

        assert!(!store.get(a_id).await.unwrap().unwrap().is_default);
        assert!(store.get(b_id).await.unwrap().unwrap().is_default);
        // Another team's default is untouched.
        assert!(store.get(other_id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn one_pending_job_per_incident() {
        let store = MemoryEscalationStore::new();
        let incident = IncidentId::v4();

        store.insert(job(incident)).await.unwrap();
        let err = store.insert(job(incident)).await.unwrap_err();
        assert!(matches!(err, EscalationError::AlreadyScheduled(_)));

        // Completing the active record frees the slot.
        store.cancel_active(incident).await.unwrap();
        store.insert(job(incident)).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_active_is_none_when_nothing_pending() {
        let store = MemoryEscalationStore::new();
        assert!(store.cancel_active(IncidentId::v4()).await.unwrap().is_none());
    }
}
