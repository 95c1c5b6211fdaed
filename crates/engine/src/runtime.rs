//! Process wiring.
//!
//! `AutomationCore` assembles the queue workers, the lifecycle bridge,
//! and the age poller behind one explicit `start`/`shutdown` lifecycle.
//! Shutdown order matters: pollers stop first, then the bridge, then
//! the worker pools drain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vigil_audit::AuditSink;
use vigil_escalation::{EscalationScheduler, EscalationWorker, STALE_GRACE};
use vigil_queue::{
    EnqueueOptions, HandlerError, Job, JobHandler, Queue, Topic, WorkerConfig, WorkerPool,
};

use crate::age::AgePoller;
use crate::bridge::LifecycleBridge;
use crate::error::EngineError;
use crate::interpreter::WorkflowWorker;

/// How long between audit retention sweeps.
const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Payload of the self-perpetuating maintenance job.
#[derive(Debug, Serialize, Deserialize)]
struct SweepPayload {
    task: String,
}

/// System-topic handler: audit retention sweep, rescheduling itself
/// daily. The queue's logical-id dedup makes the schedule singleton
/// across instances.
struct SystemWorker {
    audit: Arc<dyn AuditSink>,
    queue: Queue,
    retention_days: u32,
}

#[async_trait]
impl JobHandler for SystemWorker {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: SweepPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| HandlerError::Terminal(format!("malformed system payload: {e}")))?;
        if payload.task != "audit_sweep" {
            return Err(HandlerError::Terminal(format!(
                "unknown system task {:?}",
                payload.task
            )));
        }

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.retention_days));
        let removed = self
            .audit
            .sweep_older_than(cutoff)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        tracing::info!(removed, retention_days = self.retention_days, "audit retention sweep");

        match self
            .queue
            .enqueue(
                Topic::System,
                serde_json::json!({"task": "audit_sweep"}),
                EnqueueOptions::delayed(SWEEP_PERIOD).with_logical_id("audit-sweep"),
            )
            .await
        {
            Ok(_) | Err(vigil_queue::QueueError::Duplicate { .. }) => Ok(()),
            Err(error) => Err(HandlerError::Transient(error.to_string())),
        }
    }
}

/// Everything `AutomationCore` composes.
pub struct CoreDeps {
    /// The shared queue.
    pub queue: Queue,
    /// The workflow interpreter.
    pub workflow_worker: Arc<WorkflowWorker>,
    /// The escalation scheduler.
    pub escalation: Arc<EscalationScheduler>,
    /// The escalation worker.
    pub escalation_worker: Arc<EscalationWorker>,
    /// The runbook topic's handler, mounted opaquely so the engine does
    /// not depend on the runbook crate.
    pub runbook_worker: Arc<dyn JobHandler>,
    /// The age poller.
    pub poller: Arc<AgePoller>,
    /// The lifecycle bridge.
    pub bridge: Arc<LifecycleBridge>,
    /// The audit sink (for the retention sweep).
    pub audit: Arc<dyn AuditSink>,
    /// Audit retention in days.
    pub audit_retention_days: u32,
    /// Per-topic worker tuning.
    pub worker_config: WorkerConfig,
}

/// The assembled automation core.
pub struct AutomationCore {
    deps: CoreDeps,
    pools: parking_lot::Mutex<Vec<Arc<WorkerPool>>>,
}

impl AutomationCore {
    /// Assemble a stopped core.
    #[must_use]
    pub fn new(deps: CoreDeps) -> Self {
        Self {
            deps,
            pools: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Reconcile stale claims, start worker pools on every topic, the
    /// lifecycle bridge, and the age poller, and seed the maintenance
    /// schedule.
    pub async fn start(&self) -> Result<(), EngineError> {
        // Startup reconciliation: re-enqueue work interrupted by the
        // previous process, before workers start claiming.
        self.deps
            .escalation
            .reconcile_stale()
            .await
            .map_err(|e| vigil_queue::QueueError::Store(e.to_string()))?;
        for topic in [Topic::Workflow, Topic::Runbook, Topic::System] {
            self.deps.queue.reconcile(topic, STALE_GRACE).await?;
        }

        let system_worker: Arc<dyn JobHandler> = Arc::new(SystemWorker {
            audit: Arc::clone(&self.deps.audit),
            queue: self.deps.queue.clone(),
            retention_days: self.deps.audit_retention_days,
        });
        let escalation_handler: Arc<dyn JobHandler> = self.deps.escalation_worker.clone();
        let workflow_handler: Arc<dyn JobHandler> = self.deps.workflow_worker.clone();
        let handlers: Vec<(Topic, Arc<dyn JobHandler>)> = vec![
            (Topic::Escalation, escalation_handler),
            (Topic::Workflow, workflow_handler),
            (Topic::Runbook, self.deps.runbook_worker.clone()),
            (Topic::System, system_worker),
        ];
        let store = self.deps.queue.store();
        *self.pools.lock() = vigil_queue::start_all(&store, handlers, &self.deps.worker_config);

        Arc::clone(&self.deps.bridge).start();
        Arc::clone(&self.deps.poller).start();

        // Seed the daily sweep; a live schedule means Duplicate, which
        // is exactly the singleton behavior wanted.
        match self
            .deps
            .queue
            .enqueue(
                Topic::System,
                serde_json::json!({"task": "audit_sweep"}),
                EnqueueOptions::delayed(SWEEP_PERIOD).with_logical_id("audit-sweep"),
            )
            .await
        {
            Ok(_) | Err(vigil_queue::QueueError::Duplicate { .. }) => {}
            Err(error) => return Err(error.into()),
        }

        tracing::info!("automation core started");
        Ok(())
    }

    /// Stop everything in reverse dependency order. Idempotent.
    pub async fn shutdown(&self) {
        self.deps.poller.stop().await;
        self.deps.bridge.stop().await;
        let pools = std::mem::take(&mut *self.pools.lock());
        for pool in pools {
            pool.shutdown().await;
        }
        tracing::info!("automation core stopped");
    }
}
