//! The age-trigger poller.
//!
//! Runs on a fixed interval on exactly one instance (leader-guarded).
//! For each enabled age workflow, fires once per incident that crossed
//! the threshold and has no execution of that workflow inside the
//! threshold window, so an incident is not re-triggered every tick
//! while it stays open.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use vigil_execution::{ExecutionStore, TriggerOrigin};
use vigil_incident::IncidentStore;
use vigil_queue::LeaderLock;
use vigil_workflow::{Scope, TriggerKind, Workflow, WorkflowStore};

use crate::engine::WorkflowEngine;
use crate::matcher::conditions_match;

/// The fixed polling interval.
pub const AGE_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// The leadership slot the poller claims each tick.
const LEADER_SLOT: &str = "age-poller";

/// The poller. `start`/`stop` bound its lifetime; `stop` is safe to call
/// while a tick is in flight and never races the poll callback.
pub struct AgePoller {
    engine: Arc<WorkflowEngine>,
    workflows: Arc<dyn WorkflowStore>,
    incidents: Arc<dyn IncidentStore>,
    executions: Arc<dyn ExecutionStore>,
    leader: LeaderLock,
    interval: Duration,
    cancel: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AgePoller {
    /// Create a stopped poller with the production interval.
    #[must_use]
    pub fn new(
        engine: Arc<WorkflowEngine>,
        workflows: Arc<dyn WorkflowStore>,
        incidents: Arc<dyn IncidentStore>,
        executions: Arc<dyn ExecutionStore>,
        leader: LeaderLock,
    ) -> Self {
        Self::with_interval(engine, workflows, incidents, executions, leader, AGE_POLL_INTERVAL)
    }

    /// Create a stopped poller with an explicit interval (tests).
    #[must_use]
    pub fn with_interval(
        engine: Arc<WorkflowEngine>,
        workflows: Arc<dyn WorkflowStore>,
        incidents: Arc<dyn IncidentStore>,
        executions: Arc<dyn ExecutionStore>,
        leader: LeaderLock,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            workflows,
            incidents,
            executions,
            leader,
            interval,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Start the poll loop. A second call is a no-op.
    pub fn start(self: Arc<Self>) {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            return;
        }
        let poller = Arc::clone(&self);
        let cancel = self.cancel.clone();
        let interval = self.interval;
        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                poller.tick().await;
            }
        }));
        tracing::info!(interval_secs = self.interval.as_secs(), "age poller started");
    }

    /// Stop the loop and wait for any in-flight tick. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("age poller stopped");
    }

    /// One polling pass. Public so tests (and a manual admin endpoint)
    /// can drive it without the timer.
    pub async fn tick(&self) {
        // Exactly one instance polls; losing the slot is normal.
        let Some(_guard) = self.leader.try_acquire(LEADER_SLOT) else {
            return;
        };

        let workflows = match self.workflows.list_enabled().await {
            Ok(workflows) => workflows,
            Err(error) => {
                tracing::error!(error = %error, "age poll: workflow listing failed");
                return;
            }
        };

        for workflow in workflows {
            if workflow.definition.trigger.kind != TriggerKind::Age {
                continue;
            }
            self.poll_workflow(&workflow).await;
        }
    }

    async fn poll_workflow(&self, workflow: &Workflow) {
        let Some(threshold_minutes) = workflow.definition.trigger.age_threshold_minutes else {
            tracing::error!(workflow_id = %workflow.id, "age workflow without threshold");
            return;
        };
        let threshold = Utc::now() - chrono::Duration::minutes(i64::from(threshold_minutes));
        let team = match workflow.scope {
            Scope::Global => None,
            Scope::Team { team_id } => Some(team_id),
        };

        let incidents = match self.incidents.open_older_than(threshold, team).await {
            Ok(incidents) => incidents,
            Err(error) => {
                tracing::error!(workflow_id = %workflow.id, error = %error, "age poll: incident scan failed");
                return;
            }
        };

        for incident in incidents {
            // Once per threshold crossing: skip incidents with an
            // execution of this workflow inside the window.
            match self
                .executions
                .exists_since(workflow.id, incident.id, threshold)
                .await
            {
                Ok(true) => continue,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(incident_id = %incident.id, error = %error, "age poll: execution lookup failed");
                    continue;
                }
            }

            let snapshot = incident.snapshot();
            if !conditions_match(&workflow.definition.trigger.conditions, &snapshot) {
                continue;
            }

            if let Err(error) = self
                .engine
                .fire(
                    workflow,
                    incident.id,
                    snapshot,
                    TriggerOrigin::Event,
                    Some("age".to_owned()),
                    &[],
                )
                .await
            {
                tracing::error!(
                    workflow_id = %workflow.id,
                    incident_id = %incident.id,
                    error = %error,
                    "age trigger fire failed"
                );
            }
        }
    }
}
