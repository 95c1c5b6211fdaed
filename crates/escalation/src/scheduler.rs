//! The level-timer scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{IncidentId, JobId, PolicyId, TeamId, UserId};
use vigil_incident::{Incident, IncidentStore};
use vigil_queue::{EnqueueOptions, Queue, RetryPolicy, Topic};

use crate::error::EscalationError;
use crate::job::EscalationJob;
use crate::policy::EscalationPolicy;
use crate::store::{EscalationJobStore, PolicyStore};
use crate::worker::EscalationPayload;

/// Grace window before an in-flight claim counts as stale.
pub const STALE_GRACE: Duration = Duration::from_secs(300);

/// Worker attempts per escalation step before the step is marked failed.
const STEP_ATTEMPTS: u32 = 3;

/// Schedules escalation steps and manages policies.
pub struct EscalationScheduler {
    queue: Queue,
    jobs: Arc<dyn EscalationJobStore>,
    policies: Arc<dyn PolicyStore>,
    incidents: Arc<dyn IncidentStore>,
    audit: Arc<dyn AuditSink>,
}

impl EscalationScheduler {
    /// Wire the scheduler.
    #[must_use]
    pub fn new(
        queue: Queue,
        jobs: Arc<dyn EscalationJobStore>,
        policies: Arc<dyn PolicyStore>,
        incidents: Arc<dyn IncidentStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            queue,
            jobs,
            policies,
            incidents,
            audit,
        }
    }

    /// Begin escalating an OPEN incident: level 1 fires immediately.
    pub async fn start(&self, incident: &Incident) -> Result<JobId, EscalationError> {
        let policy_id = incident
            .policy_id
            .ok_or(EscalationError::NoPolicy(incident.id))?;
        if self.policies.get(policy_id).await?.is_none() {
            return Err(EscalationError::PolicyNotFound(policy_id));
        }

        let job_id = self
            .schedule_level(incident.id, policy_id, 1, 0, Duration::ZERO)
            .await?;

        self.audit
            .append(
                AuditEvent::new("escalation.started", ResourceKind::Incident, incident.id.to_string())
                    .for_team(incident.team_id)
                    .on_incident(incident.id)
                    .with_meta("policyId", policy_id.to_string()),
            )
            .await?;
        tracing::info!(incident_id = %incident.id, policy_id = %policy_id, "escalation started");
        Ok(job_id)
    }

    /// Schedule one step of the ladder after `delay`.
    ///
    /// Creates the durable [`EscalationJob`] record and the queue job that
    /// drives it. The record store enforces at most one pending step per
    /// incident; on rejection the freshly enqueued queue job is cancelled
    /// so neither side leaks.
    pub async fn schedule_level(
        &self,
        incident_id: IncidentId,
        policy_id: PolicyId,
        level: u32,
        repeat_index: u32,
        delay: Duration,
    ) -> Result<JobId, EscalationError> {
        let record_id = JobId::v4();
        let payload = EscalationPayload {
            escalation_job_id: record_id,
            incident_id,
            policy_id,
            level,
            repeat_index,
        };

        let queue_job_id = self
            .queue
            .enqueue(
                Topic::Escalation,
                serde_json::to_value(&payload)
                    .map_err(|e| EscalationError::Store(e.to_string()))?,
                EnqueueOptions {
                    delay: (delay > Duration::ZERO).then_some(delay),
                    logical_id: Some(EscalationJob::logical_id(incident_id, repeat_index, level)),
                    retry: Some(RetryPolicy {
                        max_attempts: STEP_ATTEMPTS,
                        initial_delay_ms: 1_000,
                        max_delay_ms: 30_000,
                    }),
                },
            )
            .await?;

        let record = EscalationJob {
            id: record_id,
            incident_id,
            level,
            repeat_index,
            queue_job_id,
            scheduled_for: Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero()),
            executed_at: None,
            completed: false,
            created_at: Utc::now(),
        };
        if let Err(error) = self.jobs.insert(record).await {
            self.queue.cancel(queue_job_id).await?;
            return Err(error);
        }

        tracing::debug!(
            incident_id = %incident_id,
            level,
            repeat_index,
            delay_secs = delay.as_secs(),
            "escalation step scheduled"
        );
        Ok(record_id)
    }

    /// Cancel the incident's pending step, if any. Called on
    /// acknowledge, resolve, and policy change. Idempotent.
    pub async fn cancel(&self, incident_id: IncidentId) -> Result<(), EscalationError> {
        if let Some(record) = self.jobs.cancel_active(incident_id).await? {
            self.queue.cancel(record.queue_job_id).await?;
            tracing::info!(incident_id = %incident_id, level = record.level, "escalation cancelled");
        }
        Ok(())
    }

    /// Re-enqueue steps whose claim went stale (worker died mid-step).
    /// Idempotent: a second run finds nothing new.
    pub async fn reconcile_stale(&self) -> Result<Vec<JobId>, EscalationError> {
        let replaced = self.queue.reconcile(Topic::Escalation, STALE_GRACE).await?;
        if !replaced.is_empty() {
            tracing::warn!(count = replaced.len(), "stale escalation steps re-enqueued");
        }
        Ok(replaced)
    }

    // --- policy management -------------------------------------------------

    /// Validate and persist a policy.
    pub async fn save_policy(&self, policy: EscalationPolicy) -> Result<(), EscalationError> {
        policy.validate()?;
        let was_default = policy.is_default;
        let (id, team_id) = (policy.id, policy.team_id);
        self.policies.upsert(policy).await?;
        if was_default {
            self.policies.set_default(team_id, id).await?;
        }
        Ok(())
    }

    /// Make a policy its team's default, clearing any previous default.
    pub async fn set_default_policy(
        &self,
        team_id: TeamId,
        id: PolicyId,
    ) -> Result<(), EscalationError> {
        self.policies.set_default(team_id, id).await
    }

    /// Delete a policy. Rejected while any OPEN/ACKNOWLEDGED incident
    /// references it.
    pub async fn delete_policy(&self, id: PolicyId, user: UserId) -> Result<(), EscalationError> {
        if self.incidents.any_active_with_policy(id).await? {
            return Err(EscalationError::PolicyInUse(id));
        }
        let team_id = self.policies.get(id).await?.map(|p| p.team_id);
        self.policies.delete(id).await?;

        let mut event = AuditEvent::new("policy.deleted", ResourceKind::Policy, id.to_string())
            .by_user(user);
        if let Some(team_id) = team_id {
            event = event.for_team(team_id);
        }
        self.audit.append(event).await?;
        Ok(())
    }
}
