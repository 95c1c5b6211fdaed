//! The escalation queue worker.
//!
//! Executes one step of a ladder: resolve the level's targets, emit
//! notify directives, write the timeline event, bump the incident's
//! level, and schedule the next step (or the next repeat pass). Target
//! lookup failures are logged and the ladder still advances; only
//! infrastructure failures bounce back to the queue for retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{IncidentId, JobId, PolicyId, UserId};
use vigil_eventbus::{EventBus, LifecycleEvent, LifecycleKind};
use vigil_incident::{Incident, IncidentStatus, IncidentStore};
use vigil_queue::{HandlerError, Job, JobHandler};

use crate::directory::TargetDirectory;
use crate::notify::{NotifyDirective, NotifySink};
use crate::policy::{EscalationPolicy, LevelTarget};
use crate::scheduler::EscalationScheduler;
use crate::store::{EscalationJobStore, PolicyStore};

/// Queue payload for one escalation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPayload {
    /// The durable step record.
    pub escalation_job_id: JobId,
    /// The incident.
    pub incident_id: IncidentId,
    /// The policy driving the ladder.
    pub policy_id: PolicyId,
    /// Level to fire (1-based; always within the policy).
    pub level: u32,
    /// Which pass through the ladder (0 = first).
    pub repeat_index: u32,
}

/// The escalation topic's job handler.
pub struct EscalationWorker {
    scheduler: Arc<EscalationScheduler>,
    jobs: Arc<dyn EscalationJobStore>,
    policies: Arc<dyn PolicyStore>,
    incidents: Arc<dyn IncidentStore>,
    directory: Arc<dyn TargetDirectory>,
    notify: Arc<dyn NotifySink>,
    audit: Arc<dyn AuditSink>,
    bus: Arc<EventBus>,
}

impl EscalationWorker {
    /// Wire the worker.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: Arc<EscalationScheduler>,
        jobs: Arc<dyn EscalationJobStore>,
        policies: Arc<dyn PolicyStore>,
        incidents: Arc<dyn IncidentStore>,
        directory: Arc<dyn TargetDirectory>,
        notify: Arc<dyn NotifySink>,
        audit: Arc<dyn AuditSink>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            scheduler,
            jobs,
            policies,
            incidents,
            directory,
            notify,
            audit,
            bus,
        }
    }

    /// Resolve a level's targets at dispatch time. Lookup failures
    /// degrade to an empty target list; the ladder must not stall on
    /// transient directory issues.
    async fn resolve_targets(&self, incident: &Incident, target: LevelTarget) -> Vec<UserId> {
        match target {
            LevelTarget::User { user_id } => vec![user_id],
            LevelTarget::Schedule { schedule_id } => {
                match self.directory.on_call_user(schedule_id).await {
                    Ok(Some(user)) => vec![user],
                    Ok(None) => {
                        tracing::warn!(schedule_id = %schedule_id, "schedule has nobody on call");
                        vec![]
                    }
                    Err(error) => {
                        tracing::error!(schedule_id = %schedule_id, error, "on-call lookup failed");
                        vec![]
                    }
                }
            }
            LevelTarget::EntireTeam => {
                match self.directory.team_responders(incident.team_id).await {
                    Ok(users) => users,
                    Err(error) => {
                        tracing::error!(team_id = %incident.team_id, error, "roster lookup failed");
                        vec![]
                    }
                }
            }
        }
    }

    /// Best-effort bump of `incident.escalation_level`, CAS with retries.
    async fn record_level(&self, incident_id: IncidentId, level: u32) -> Option<Incident> {
        for _ in 0..3 {
            let current = self.incidents.get(incident_id).await.ok()??;
            let expected = current.version;
            let mut next = current;
            next.escalation_level = level;
            match self.incidents.update(next.clone(), expected).await {
                Ok(true) => {
                    next.version = expected + 1;
                    return Some(next);
                }
                Ok(false) => continue,
                Err(error) => {
                    tracing::error!(incident_id = %incident_id, error = %error, "level write failed");
                    return None;
                }
            }
        }
        None
    }

    /// Schedule the step after `level`, honoring the repeat loop.
    async fn schedule_next(
        &self,
        payload: &EscalationPayload,
        policy: &EscalationPolicy,
        fired_timeout_minutes: u32,
    ) -> Result<(), HandlerError> {
        let delay = Duration::from_secs(u64::from(fired_timeout_minutes) * 60);
        let next_level = payload.level + 1;

        let (level, repeat_index) = if policy.level(next_level).is_some() {
            (next_level, payload.repeat_index)
        } else if payload.repeat_index < policy.repeat {
            (1, payload.repeat_index + 1)
        } else {
            tracing::info!(
                incident_id = %payload.incident_id,
                "escalation ladder exhausted without acknowledgement"
            );
            return Ok(());
        };

        self.scheduler
            .schedule_level(payload.incident_id, payload.policy_id, level, repeat_index, delay)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for EscalationWorker {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: EscalationPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| HandlerError::Terminal(format!("malformed escalation payload: {e}")))?;

        // Idempotency: redelivered steps that already completed are no-ops.
        let record = self
            .jobs
            .get(payload.escalation_job_id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        let Some(record) = record else {
            tracing::warn!(job_id = %payload.escalation_job_id, "escalation record vanished");
            return Ok(());
        };
        if record.completed {
            return Ok(());
        }

        // A cancelled or acknowledged incident makes the step a no-op.
        let incident = self
            .incidents
            .get(payload.incident_id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        let Some(incident) = incident else {
            let _ = self.jobs.mark_completed(record.id).await;
            return Ok(());
        };
        if incident.status != IncidentStatus::Open {
            tracing::debug!(
                incident_id = %incident.id,
                status = %incident.status,
                "escalation step skipped: incident no longer open"
            );
            let _ = self.jobs.mark_completed(record.id).await;
            return Ok(());
        }

        // Claim marker goes down before any side effect.
        self.jobs
            .mark_executed(record.id, Utc::now())
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        let policy = self
            .policies
            .get(payload.policy_id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        let Some(policy) = policy else {
            tracing::warn!(policy_id = %payload.policy_id, "policy deleted mid-escalation");
            let _ = self.jobs.mark_completed(record.id).await;
            return Ok(());
        };
        let Some(level_def) = policy.level(payload.level).copied() else {
            tracing::error!(level = payload.level, policy_id = %policy.id, "level out of range");
            let _ = self.jobs.mark_completed(record.id).await;
            return Ok(());
        };

        let targets = self.resolve_targets(&incident, level_def.target).await;
        for &user_id in &targets {
            let directive = NotifyDirective {
                user_id,
                incident_id: incident.id,
                level: payload.level,
                repeat_index: payload.repeat_index,
                at: Utc::now(),
            };
            if let Err(error) = self.notify.notify(directive).await {
                tracing::error!(user_id = %user_id, error, "notify directive send failed");
            }
        }

        self.audit
            .append(
                AuditEvent::new(
                    "escalation.level.triggered",
                    ResourceKind::Incident,
                    incident.id.to_string(),
                )
                .for_team(incident.team_id)
                .on_incident(incident.id)
                .with_meta("level", payload.level)
                .with_meta("repeat", payload.repeat_index)
                .with_meta(
                    "targets",
                    serde_json::Value::Array(
                        targets
                            .iter()
                            .map(|u| serde_json::Value::String(u.to_string()))
                            .collect(),
                    ),
                ),
            )
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        let snapshot = self
            .record_level(incident.id, payload.level)
            .await
            .unwrap_or(incident.clone());
        self.bus.emit(LifecycleEvent::new(
            incident.id,
            incident.team_id,
            LifecycleKind::Escalated {
                level: payload.level,
            },
            snapshot.snapshot(),
        ));

        self.jobs
            .mark_completed(record.id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        self.schedule_next(&payload, &policy, level_def.timeout_minutes)
            .await?;

        tracing::info!(
            incident_id = %incident.id,
            level = payload.level,
            repeat = payload.repeat_index,
            targets = targets.len(),
            "escalation level triggered"
        );
        Ok(())
    }

    async fn on_failed(&self, job: &Job) {
        let Ok(payload) = serde_json::from_value::<EscalationPayload>(job.payload.clone()) else {
            return;
        };
        let event = AuditEvent::new(
            "escalation.level.failed",
            ResourceKind::Incident,
            payload.incident_id.to_string(),
        )
        .on_incident(payload.incident_id)
        .with_meta("level", payload.level)
        .with_meta(
            "error",
            job.last_error.clone().unwrap_or_else(|| "unknown".into()),
        );
        if let Err(error) = self.audit.append(event).await {
            tracing::error!(incident_id = %payload.incident_id, error = %error, "failed-step audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::notify::MemoryNotifySink;
    use crate::policy::EscalationLevel;
    use crate::store::{MemoryEscalationStore, MemoryPolicyStore};
    use pretty_assertions::assert_eq;
    use vigil_audit::MemoryAuditSink;
    use vigil_core::{Priority, ScheduleId, TeamId};
    use vigil_incident::{MemoryIncidentStore, NewIncident};
    use vigil_queue::{JobState, JobStore, MemoryJobStore, Queue, RetryPolicy, Topic};

    struct Fixture {
        worker: EscalationWorker,
        scheduler: Arc<EscalationScheduler>,
        jobs: Arc<MemoryEscalationStore>,
        policies: Arc<MemoryPolicyStore>,
        incidents: Arc<MemoryIncidentStore>,
        directory: Arc<StaticDirectory>,
        notify: Arc<MemoryNotifySink>,
        audit: Arc<MemoryAuditSink>,
        queue_store: Arc<MemoryJobStore>,
        bus: Arc<EventBus>,
    }

    fn fixture() -> Fixture {
        let queue_store = Arc::new(MemoryJobStore::new());
        let jobs = Arc::new(MemoryEscalationStore::new());
        let policies = Arc::new(MemoryPolicyStore::new());
        let incidents = Arc::new(MemoryIncidentStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let directory = Arc::new(StaticDirectory::new());
        let notify = Arc::new(MemoryNotifySink::new());
        let bus = Arc::new(EventBus::new());

        let scheduler = Arc::new(EscalationScheduler::new(
            Queue::new(queue_store.clone()),
            jobs.clone(),
            policies.clone(),
            incidents.clone(),
            audit.clone(),
        ));
        let worker = EscalationWorker::new(
            scheduler.clone(),
            jobs.clone(),
            policies.clone(),
            incidents.clone(),
            directory.clone(),
            notify.clone(),
            audit.clone(),
            bus.clone(),
        );
        Fixture {
            worker,
            scheduler,
            jobs,
            policies,
            incidents,
            directory,
            notify,
            audit,
            queue_store,
            bus,
        }
    }

    async fn seed(
        f: &Fixture,
        levels: Vec<EscalationLevel>,
        repeat: u32,
    ) -> (Incident, EscalationPolicy) {
        let team = TeamId::v4();
        let policy = EscalationPolicy::new(team, "p", repeat, levels).unwrap();
        f.policies.upsert(policy.clone()).await.unwrap();
        let incident = Incident::create(NewIncident {
            title: "t".into(),
            priority: Priority::Critical,
            team_id: team,
            policy_id: Some(policy.id),
            metadata: serde_json::Map::new(),
        });
        f.incidents.insert(incident.clone()).await.unwrap();
        (incident, policy)
    }

    /// Claim the single due queue job and run the worker on it.
    async fn run_step(f: &Fixture) {
        let claimed = f
            .queue_store
            .claim_due(Topic::Escalation, Utc::now() + chrono::Duration::days(30))
            .await
            .unwrap()
            .expect("a due escalation job");
        f.worker.handle(&claimed).await.unwrap();
        f.queue_store.complete(claimed.id).await.unwrap();
    }

    fn user_level(number: u32, user_id: UserId, timeout_minutes: u32) -> EscalationLevel {
        EscalationLevel {
            number,
            target: LevelTarget::User { user_id },
            timeout_minutes,
        }
    }

    #[tokio::test]
    async fn fires_level_one_and_schedules_level_two() {
        let f = fixture();
        let u1 = UserId::v4();
        let u2 = UserId::v4();
        let (incident, _policy) = seed(
            &f,
            vec![user_level(1, u1, 5), user_level(2, u2, 10)],
            0,
        )
        .await;

        f.scheduler.start(&incident).await.unwrap();
        run_step(&f).await;

        // U1 notified.
        let sent = f.notify.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, u1);
        assert_eq!(sent[0].level, 1);

        // Timeline row with targets.
        let triggered = f.audit.with_action("escalation.level.triggered");
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].metadata["level"], 1);

        // Incident level recorded.
        let stored = f.incidents.get(incident.id).await.unwrap().unwrap();
        assert_eq!(stored.escalation_level, 1);

        // Next step waits out level 1's 5-minute timeout.
        let pending: Vec<_> = f
            .queue_store
            .all()
            .into_iter()
            .filter(|j| j.state == JobState::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        let eta = pending[0].scheduled_for - Utc::now();
        assert!(eta > chrono::Duration::minutes(4));
        assert!(eta <= chrono::Duration::minutes(5));

        let records = f.jobs.all();
        assert_eq!(records.iter().filter(|r| r.completed).count(), 1);
        assert_eq!(records.iter().filter(|r| !r.completed).count(), 1);
    }

    #[tokio::test]
    async fn ladder_wraps_into_repeat_pass() {
        let f = fixture();
        let u1 = UserId::v4();
        let (incident, _policy) = seed(&f, vec![user_level(1, u1, 5)], 1).await;

        f.scheduler.start(&incident).await.unwrap();
        run_step(&f).await; // level 1, pass 0
        run_step(&f).await; // wraps: level 1, pass 1

        let sent = f.notify.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[0].level, sent[0].repeat_index), (1, 0));
        assert_eq!((sent[1].level, sent[1].repeat_index), (1, 1));

        // Pass 1 was the last allowed: nothing further scheduled.
        assert!(
            f.queue_store
                .all()
                .iter()
                .all(|j| j.state != JobState::Pending)
        );
    }

    #[tokio::test]
    async fn acknowledged_incident_makes_step_a_noop() {
        let f = fixture();
        let u1 = UserId::v4();
        let (incident, _policy) = seed(&f, vec![user_level(1, u1, 5)], 0).await;
        f.scheduler.start(&incident).await.unwrap();

        // Acknowledge before the step runs.
        let mut acked = f.incidents.get(incident.id).await.unwrap().unwrap();
        acked.status = IncidentStatus::Acknowledged;
        let v = acked.version;
        f.incidents.update(acked, v).await.unwrap();

        run_step(&f).await;

        assert!(f.notify.sent().is_empty());
        assert!(f.audit.with_action("escalation.level.triggered").is_empty());
        assert!(f.jobs.all().iter().all(|r| r.completed));
    }

    #[tokio::test]
    async fn schedule_lookup_resolves_on_call_at_dispatch_time() {
        let f = fixture();
        let schedule = ScheduleId::v4();
        let level = EscalationLevel {
            number: 1,
            target: LevelTarget::Schedule {
                schedule_id: schedule,
            },
            timeout_minutes: 5,
        };
        let (incident, _policy) = seed(&f, vec![level], 0).await;
        f.scheduler.start(&incident).await.unwrap();

        // Rotation handover after scheduling, before dispatch.
        let now_on_call = UserId::v4();
        f.directory.set_on_call(schedule, now_on_call);

        run_step(&f).await;
        assert_eq!(f.notify.sent()[0].user_id, now_on_call);
    }

    #[tokio::test]
    async fn empty_roster_still_advances_the_ladder() {
        let f = fixture();
        let u2 = UserId::v4();
        let team_level = EscalationLevel {
            number: 1,
            target: LevelTarget::EntireTeam,
            timeout_minutes: 3,
        };
        let (incident, _policy) = seed(&f, vec![team_level, user_level(2, u2, 5)], 0).await;
        f.scheduler.start(&incident).await.unwrap();

        run_step(&f).await; // nobody on the roster, but no stall

        assert!(f.notify.sent().is_empty());
        // Level 2 still scheduled.
        assert_eq!(
            f.queue_store
                .all()
                .iter()
                .filter(|j| j.state == JobState::Pending)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn entire_team_notifies_every_responder() {
        let f = fixture();
        let team_level = EscalationLevel {
            number: 1,
            target: LevelTarget::EntireTeam,
            timeout_minutes: 3,
        };
        let (incident, _policy) = seed(&f, vec![team_level], 0).await;
        let roster = vec![UserId::v4(), UserId::v4(), UserId::v4()];
        f.directory.set_roster(incident.team_id, roster.clone());
        f.scheduler.start(&incident).await.unwrap();

        run_step(&f).await;

        let sent: Vec<UserId> = f.notify.sent().iter().map(|d| d.user_id).collect();
        assert_eq!(sent, roster);
    }

    #[tokio::test]
    async fn escalated_event_reaches_the_bus() {
        let f = fixture();
        let u1 = UserId::v4();
        let (incident, _policy) = seed(&f, vec![user_level(1, u1, 5)], 0).await;
        let mut rx = f.bus.subscribe();
        f.scheduler.start(&incident).await.unwrap();

        run_step(&f).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, LifecycleKind::Escalated { level: 1 });
        assert_eq!(event.incident_id, incident.id);
    }

    #[tokio::test]
    async fn redelivered_completed_step_is_idempotent() {
        let f = fixture();
        let u1 = UserId::v4();
        let (incident, _policy) = seed(&f, vec![user_level(1, u1, 5)], 0).await;
        f.scheduler.start(&incident).await.unwrap();

        let claimed = f
            .queue_store
            .claim_due(Topic::Escalation, Utc::now())
            .await
            .unwrap()
            .unwrap();
        f.worker.handle(&claimed).await.unwrap();
        // Queue redelivers the same job after a crash-before-complete.
        f.worker.handle(&claimed).await.unwrap();

        assert_eq!(f.notify.sent().len(), 1);
        assert_eq!(f.audit.with_action("escalation.level.triggered").len(), 1);
    }

    #[tokio::test]
    async fn exhausted_step_writes_failed_timeline_row() {
        let f = fixture();
        let payload = EscalationPayload {
            escalation_job_id: JobId::v4(),
            incident_id: IncidentId::v4(),
            policy_id: PolicyId::v4(),
            level: 2,
            repeat_index: 0,
        };
        let failed_job = Job {
            id: JobId::v4(),
            topic: Topic::Escalation,
            logical_id: None,
            payload: serde_json::to_value(payload).unwrap(),
            state: JobState::Failed,
            scheduled_for: Utc::now(),
            attempts: 3,
            retry: RetryPolicy::standard(),
            executed_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            last_error: Some("boom".into()),
            created_at: Utc::now(),
        };

        f.worker.on_failed(&failed_job).await;

        let failed = f.audit.with_action("escalation.level.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].metadata["error"], "boom");
    }
}
