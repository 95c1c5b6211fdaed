//! The node interpreter.
//!
//! One queue job per execution session: the worker walks the snapshot
//! from the cursor (or the trigger's successor), executing actions,
//! branching at conditions, and suspending at delays by re-enqueuing
//! itself. Redelivered jobs consult the completed-node set, so the
//! at-least-once queue cannot double-fire an action that already ran.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{ExecutionId, NodeId};
use vigil_execution::{ExecutionStore, WorkflowExecution};
use vigil_queue::{EnqueueOptions, HandlerError, Job, JobHandler, Queue, RetryPolicy, Topic};
use vigil_template::RenderContext;
use vigil_workflow::{EdgeHandle, NodeKind, WorkflowDefinition};

use crate::actions::ActionRunner;

/// Fallback non-delay work budget when the snapshot's timeout fails to
/// parse (it was validated at save; this guards corrupt rows).
const DEFAULT_BUDGET: Duration = Duration::from_secs(300);

/// Queue payload for one execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowJobPayload {
    /// The execution to advance.
    pub execution_id: ExecutionId,
}

impl WorkflowJobPayload {
    /// Queue dedup key for a session. `sequence` distinguishes the
    /// initial session from delay resumptions, so a resume can be
    /// enqueued while the suspending session's job is still in flight.
    #[must_use]
    pub fn logical_id(execution_id: ExecutionId, sequence: usize) -> String {
        format!("wfexec:{execution_id}:{sequence}")
    }
}

/// The workflow topic's job handler.
pub struct WorkflowWorker {
    executions: Arc<dyn ExecutionStore>,
    actions: Arc<ActionRunner>,
    queue: Queue,
    audit: Arc<dyn AuditSink>,
}

enum Step {
    Next(Option<NodeId>),
    Suspended,
    Finished,
}

impl WorkflowWorker {
    /// Wire the worker.
    #[must_use]
    pub fn new(
        executions: Arc<dyn ExecutionStore>,
        actions: Arc<ActionRunner>,
        queue: Queue,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            executions,
            actions,
            queue,
            audit,
        }
    }

    fn context(exec: &WorkflowExecution) -> RenderContext {
        RenderContext::new(exec.incident_snapshot.clone()).with_workflow(serde_json::json!({
            "id": exec.workflow_id.to_string(),
            "version": exec.workflow_version,
        }))
    }

    fn timeline_event(exec: &WorkflowExecution, action: &str) -> AuditEvent {
        AuditEvent::new(action, ResourceKind::Execution, exec.id.to_string())
            .on_incident(exec.incident_id)
            .with_meta("executionId", exec.id.to_string())
            .with_meta("workflowId", exec.workflow_id.to_string())
    }

    async fn append(&self, event: AuditEvent) -> Result<(), HandlerError> {
        self.audit
            .append(event)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))
    }

    async fn persist(&self, exec: &WorkflowExecution) -> Result<(), HandlerError> {
        self.executions
            .update(exec.clone())
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))
    }

    async fn fail_execution(
        &self,
        exec: &mut WorkflowExecution,
        reason: String,
    ) -> Result<(), HandlerError> {
        tracing::warn!(
            execution_id = %exec.id,
            workflow_id = %exec.workflow_id,
            incident_id = %exec.incident_id,
            error = %reason,
            "workflow execution failed"
        );
        exec.mark_failed(reason.clone());
        self.persist(exec).await?;
        self.append(Self::timeline_event(exec, "workflow.execution.failed").with_meta("error", reason))
            .await
    }

    /// Process one node; returns how to continue.
    async fn step(
        &self,
        exec: &mut WorkflowExecution,
        snapshot: &WorkflowDefinition,
        node_id: NodeId,
        ctx: &RenderContext,
        session_start: Instant,
    ) -> Result<Step, HandlerError> {
        let index = snapshot.node_index();
        let Some(node) = index.get(&node_id) else {
            self.fail_execution(exec, format!("snapshot references unknown node {node_id}"))
                .await?;
            return Ok(Step::Finished);
        };

        match &node.kind {
            NodeKind::Trigger { .. } => Ok(Step::Next(snapshot.successor(node_id))),

            NodeKind::Condition { field, value, .. } => {
                let observed = vigil_template::value_to_display(vigil_template::lookup_path(
                    &exec.incident_snapshot,
                    field,
                ));
                let handle = if observed == *value {
                    EdgeHandle::True
                } else {
                    EdgeHandle::False
                };
                exec.completed_nodes.insert(node_id);
                tracing::debug!(
                    execution_id = %exec.id,
                    field,
                    observed = %observed,
                    expected = %value,
                    branch = ?handle,
                    "condition evaluated"
                );
                Ok(Step::Next(snapshot.branch_successor(node_id, handle)))
            }

            NodeKind::Delay {
                duration_minutes, ..
            } => {
                if exec.completed_nodes.contains(&node_id) {
                    // Resumed (or redelivered) past this delay already.
                    return Ok(Step::Next(snapshot.successor(node_id)));
                }
                exec.completed_nodes.insert(node_id);
                exec.cursor = snapshot.successor(node_id);
                exec.work_ms += session_start.elapsed().as_millis() as u64;
                self.persist(exec).await?;

                let delay = Duration::from_secs(u64::from(*duration_minutes) * 60);
                self.queue
                    .enqueue(
                        Topic::Workflow,
                        serde_json::to_value(WorkflowJobPayload { execution_id: exec.id })
                            .map_err(|e| HandlerError::Terminal(e.to_string()))?,
                        EnqueueOptions::delayed(delay)
                            .with_logical_id(WorkflowJobPayload::logical_id(
                                exec.id,
                                exec.completed_nodes.len(),
                            ))
                            .with_retry(RetryPolicy::standard()),
                    )
                    .await
                    .map_err(|e| HandlerError::Transient(e.to_string()))?;
                tracing::debug!(
                    execution_id = %exec.id,
                    minutes = duration_minutes,
                    "execution suspended at delay"
                );
                Ok(Step::Suspended)
            }

            NodeKind::Action { name, config } => {
                if exec.completed_nodes.contains(&node_id) {
                    return Ok(Step::Next(snapshot.successor(node_id)));
                }

                self.append(
                    Self::timeline_event(exec, "workflow.action.started")
                        .with_meta("node", name.as_str())
                        .with_meta("actionType", config.action_str()),
                )
                .await?;

                let outcome = self.actions.run(config, ctx).await;
                exec.node_results.insert(node_id, outcome.clone());

                if let Some(error) = &outcome.error {
                    self.append(
                        Self::timeline_event(exec, "workflow.action.failed")
                            .with_meta("node", name.as_str())
                            .with_meta("actionType", config.action_str())
                            .with_meta("error", error.as_str()),
                    )
                    .await?;
                    self.fail_execution(exec, format!("action {name:?} failed: {error}"))
                        .await?;
                    return Ok(Step::Finished);
                }

                exec.completed_nodes.insert(node_id);
                let mut completed = Self::timeline_event(exec, "workflow.action.completed")
                    .with_meta("node", name.as_str())
                    .with_meta("actionType", config.action_str());
                if let Some(status) = outcome.status_code {
                    completed = completed.with_meta("status", status);
                }
                if let Some(ticket) = &outcome.ticket_id {
                    completed = completed.with_meta("ticketId", ticket.as_str());
                }
                self.append(completed).await?;
                self.persist(exec).await?;
                Ok(Step::Next(snapshot.successor(node_id)))
            }
        }
    }
}

#[async_trait]
impl JobHandler for WorkflowWorker {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: WorkflowJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| HandlerError::Terminal(format!("malformed workflow payload: {e}")))?;

        let exec = self
            .executions
            .get(payload.execution_id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        let Some(mut exec) = exec else {
            tracing::warn!(execution_id = %payload.execution_id, "execution vanished");
            return Ok(());
        };
        if exec.status.is_terminal() {
            return Ok(());
        }

        let started_fresh = exec.started_at.is_none();
        exec.mark_running();
        self.persist(&exec).await?;
        if started_fresh {
            tracing::info!(
                execution_id = %exec.id,
                workflow_id = %exec.workflow_id,
                incident_id = %exec.incident_id,
                "workflow execution started"
            );
        }

        let snapshot = exec.snapshot.clone();
        let budget = snapshot.timeout().unwrap_or(DEFAULT_BUDGET);
        let ctx = Self::context(&exec);
        let session_start = Instant::now();

        let mut current = match exec.cursor.take() {
            Some(cursor) => Some(cursor),
            None => match snapshot.trigger_node() {
                Some(trigger) => snapshot.successor(trigger.id),
                None => {
                    self.fail_execution(&mut exec, "snapshot has no trigger node".into())
                        .await?;
                    return Ok(());
                }
            },
        };

        while let Some(node_id) = current {
            let consumed = exec.work_ms + session_start.elapsed().as_millis() as u64;
            if consumed > budget.as_millis() as u64 {
                self.fail_execution(
                    &mut exec,
                    format!("time budget exhausted after {consumed}ms"),
                )
                .await?;
                return Ok(());
            }

            match self
                .step(&mut exec, &snapshot, node_id, &ctx, session_start)
                .await?
            {
                Step::Next(next) => current = next,
                Step::Suspended | Step::Finished => return Ok(()),
            }
        }

        exec.mark_completed();
        self.persist(&exec).await?;
        self.append(Self::timeline_event(&exec, "workflow.execution.completed"))
            .await?;
        tracing::info!(execution_id = %exec.id, "workflow execution completed");
        Ok(())
    }

    async fn on_failed(&self, job: &Job) {
        // Exhausted queue retries (repeated transient failures): the
        // execution itself must end up FAILED and visible.
        let Ok(payload) = serde_json::from_value::<WorkflowJobPayload>(job.payload.clone()) else {
            return;
        };
        let Ok(Some(mut exec)) = self.executions.get(payload.execution_id).await else {
            return;
        };
        if exec.status.is_terminal() {
            return;
        }
        exec.mark_failed(
            job.last_error
                .clone()
                .unwrap_or_else(|| "worker retries exhausted".into()),
        );
        if let Err(error) = self.executions.update(exec.clone()).await {
            tracing::error!(execution_id = %exec.id, error = %error, "failed-state write failed");
            return;
        }
        let _ = self
            .audit
            .append(
                Self::timeline_event(&exec, "workflow.execution.failed")
                    .with_meta("error", exec.error.clone().unwrap_or_default()),
            )
            .await;
    }
}
