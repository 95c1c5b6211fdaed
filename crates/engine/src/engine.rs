//! Matching, snapshotting, and enqueueing.

use std::sync::Arc;

use vigil_core::{ExecutionId, IncidentId, WorkflowId};
use vigil_eventbus::LifecycleEvent;
use vigil_execution::{ExecutionStore, TriggerOrigin, WorkflowExecution};
use vigil_incident::IncidentStore;
use vigil_queue::{EnqueueOptions, Queue, RetryPolicy, Topic};
use vigil_workflow::{Workflow, WorkflowStore};

use crate::error::EngineError;
use crate::interpreter::WorkflowJobPayload;
use crate::matcher::event_matches;

/// The matching half of the workflow engine: turns events (and manual
/// calls) into pending executions on the workflow topic.
pub struct WorkflowEngine {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    incidents: Arc<dyn IncidentStore>,
    queue: Queue,
}

impl WorkflowEngine {
    /// Wire the engine.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        incidents: Arc<dyn IncidentStore>,
        queue: Queue,
    ) -> Self {
        Self {
            workflows,
            executions,
            incidents,
            queue,
        }
    }

    /// Match a lifecycle event against every enabled workflow; snapshot
    /// and enqueue one execution per match. Returns the executions fired.
    pub async fn on_event(&self, event: &LifecycleEvent) -> Result<Vec<ExecutionId>, EngineError> {
        let workflows = self.workflows.list_enabled().await?;
        let mut fired = Vec::new();

        for workflow in workflows {
            if !event_matches(&workflow, event) {
                continue;
            }
            let execution_id = self
                .fire(
                    &workflow,
                    event.incident_id,
                    event.incident.clone(),
                    TriggerOrigin::Event,
                    Some(event.kind.action().to_owned()),
                    &event.chain,
                )
                .await?;
            fired.push(execution_id);
        }

        if !fired.is_empty() {
            tracing::info!(
                incident_id = %event.incident_id,
                event = event.kind.action(),
                count = fired.len(),
                "workflows fired"
            );
        }
        Ok(fired)
    }

    /// Explicit manual trigger: requires an enabled workflow and starts
    /// a fresh cascade chain.
    pub async fn manual_trigger(
        &self,
        workflow_id: WorkflowId,
        incident_id: IncidentId,
    ) -> Result<ExecutionId, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        if !workflow.enabled {
            return Err(EngineError::WorkflowDisabled(workflow_id));
        }
        let incident = self
            .incidents
            .get(incident_id)
            .await?
            .ok_or(vigil_incident::IncidentError::NotFound(incident_id))?;

        self.fire(
            &workflow,
            incident_id,
            incident.snapshot(),
            TriggerOrigin::Manual,
            None,
            &[],
        )
        .await
    }

    /// Snapshot `workflow` into a pending execution and enqueue its
    /// first session.
    pub(crate) async fn fire(
        &self,
        workflow: &Workflow,
        incident_id: IncidentId,
        incident_snapshot: serde_json::Value,
        origin: TriggerOrigin,
        trigger_event: Option<String>,
        prior_chain: &[WorkflowId],
    ) -> Result<ExecutionId, EngineError> {
        let execution = WorkflowExecution::create(
            workflow.id,
            workflow.version,
            workflow.definition.clone(),
            incident_id,
            incident_snapshot,
            origin,
            trigger_event,
            prior_chain,
        );
        let execution_id = execution.id;
        self.executions.insert(execution).await?;

        self.queue
            .enqueue(
                Topic::Workflow,
                serde_json::to_value(WorkflowJobPayload { execution_id })
                    .map_err(|e| vigil_queue::QueueError::Store(e.to_string()))?,
                EnqueueOptions::default()
                    .with_logical_id(WorkflowJobPayload::logical_id(execution_id, 0))
                    .with_retry(RetryPolicy::standard()),
            )
            .await?;

        tracing::debug!(
            execution_id = %execution_id,
            workflow_id = %workflow.id,
            workflow_version = workflow.version,
            incident_id = %incident_id,
            "execution enqueued"
        );
        Ok(execution_id)
    }
}
