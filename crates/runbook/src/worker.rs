//! The runbook queue worker: one request, one result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::ExecutionId;
use vigil_http::{HttpClient, RequestSpec};
use vigil_queue::{HandlerError, Job, JobHandler};
use vigil_template::{RenderContext, Template};

use crate::execution::{RunbookExecution, RunbookStatus};
use crate::store::RunbookExecutionStore;

/// Queue payload for one runbook execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunbookPayload {
    /// The execution to perform.
    pub execution_id: ExecutionId,
}

/// The runbook topic's job handler.
pub struct RunbookWorker {
    executions: Arc<dyn RunbookExecutionStore>,
    http: Arc<HttpClient>,
    audit: Arc<dyn AuditSink>,
}

impl RunbookWorker {
    /// Wire the worker.
    #[must_use]
    pub fn new(
        executions: Arc<dyn RunbookExecutionStore>,
        http: Arc<HttpClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            executions,
            http,
            audit,
        }
    }

    fn context(execution: &RunbookExecution) -> RenderContext {
        let mut ctx = RenderContext::new(
            execution
                .incident_snapshot
                .clone()
                .unwrap_or(serde_json::Value::Null),
        );
        ctx = ctx.with_params(serde_json::Value::Object(execution.params.clone()));
        ctx
    }

    fn render(template: &str, ctx: &RenderContext) -> Result<String, String> {
        Template::parse(template)
            .and_then(|t| t.render(ctx))
            .map_err(|e| format!("template error: {e}"))
    }

    async fn finish(
        &self,
        mut execution: RunbookExecution,
        status: RunbookStatus,
        error: Option<String>,
    ) -> Result<(), HandlerError> {
        execution.status = status;
        execution.completed_at = Some(Utc::now());
        execution.error = error.clone();
        self.executions
            .update(execution.clone())
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        let action = if status == RunbookStatus::Success {
            "runbook.execution.completed"
        } else {
            "runbook.execution.failed"
        };
        let mut event = AuditEvent::new(action, ResourceKind::Runbook, execution.runbook_id.to_string())
            .with_meta("executionId", execution.id.to_string());
        if let Some(incident_id) = execution.incident_id {
            event = event.on_incident(incident_id);
        }
        if let Some(status_code) = execution.status_code {
            event = event.with_meta("status", status_code);
        }
        if let Some(error) = error {
            event = event.with_meta("error", error);
        }
        self.audit
            .append(event)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        tracing::info!(
            execution_id = %execution.id,
            runbook_id = %execution.runbook_id,
            status = ?status,
            "runbook execution finished"
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RunbookWorker {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: RunbookPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| HandlerError::Terminal(format!("malformed runbook payload: {e}")))?;

        let execution = self
            .executions
            .get(payload.execution_id)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        let Some(mut execution) = execution else {
            tracing::warn!(execution_id = %payload.execution_id, "runbook execution vanished");
            return Ok(());
        };
        if execution.status.is_terminal() {
            return Ok(());
        }

        execution.status = RunbookStatus::Running;
        execution.started_at = Some(Utc::now());
        self.executions
            .update(execution.clone())
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        let ctx = Self::context(&execution);
        let snapshot = execution.snapshot.clone();

        let url = match Self::render(&snapshot.http.url, &ctx) {
            Ok(url) => url,
            Err(error) => return self.finish(execution, RunbookStatus::Failed, Some(error)).await,
        };
        let mut headers = indexmap::IndexMap::new();
        for (name, value) in &snapshot.http.headers {
            match Self::render(value, &ctx) {
                Ok(value) => {
                    headers.insert(name.clone(), value);
                }
                Err(error) => {
                    return self.finish(execution, RunbookStatus::Failed, Some(error)).await;
                }
            }
        }
        let body = match Self::render(&snapshot.payload_template, &ctx) {
            Ok(body) => body,
            Err(error) => return self.finish(execution, RunbookStatus::Failed, Some(error)).await,
        };

        let spec = RequestSpec {
            url,
            method: snapshot.http.method,
            headers,
            body: (!body.is_empty()).then_some(body),
            auth: snapshot.http.auth.clone(),
            timeout: Duration::from_secs(u64::from(snapshot.timeout_seconds)),
            retry: snapshot.retry,
        };

        match self.http.execute(&spec).await {
            Ok(captured) => {
                execution.status_code = Some(captured.status);
                execution.response_preview = Some(captured.body_preview.clone());
                let status = if captured.is_success() {
                    RunbookStatus::Success
                } else {
                    RunbookStatus::Failed
                };
                let error =
                    (!captured.is_success()).then(|| format!("upstream returned {}", captured.status));
                self.finish(execution, status, error).await
            }
            Err(error) => {
                self.finish(execution, RunbookStatus::Failed, Some(error.to_string()))
                    .await
            }
        }
    }

    async fn on_failed(&self, job: &Job) {
        let Ok(payload) = serde_json::from_value::<RunbookPayload>(job.payload.clone()) else {
            return;
        };
        let Ok(Some(mut execution)) = self.executions.get(payload.execution_id).await else {
            return;
        };
        if execution.status.is_terminal() {
            return;
        }
        execution.status = RunbookStatus::Failed;
        execution.completed_at = Some(Utc::now());
        execution.error = job.last_error.clone();
        if let Err(error) = self.executions.update(execution).await {
            tracing::error!(execution_id = %payload.execution_id, error = %error, "failed-state write failed");
        }
    }
}
