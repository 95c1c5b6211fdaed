//! The runbook service: approvals and the execute entry point.

use std::sync::Arc;

use serde_json::{Map, Value};
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{ExecutionId, IncidentId, RunbookId, TeamId, UserId};
use vigil_incident::IncidentStore;
use vigil_queue::{EnqueueOptions, Queue, RetryPolicy, Topic};

use crate::error::RunbookError;
use crate::execution::{RunbookExecution, TriggeredBy};
use crate::runbook::{ApprovalStatus, Runbook};
use crate::store::{RunbookExecutionStore, RunbookStore};
use crate::worker::RunbookPayload;

/// Approvals, edits, and execution.
pub struct RunbookService {
    runbooks: Arc<dyn RunbookStore>,
    executions: Arc<dyn RunbookExecutionStore>,
    incidents: Arc<dyn IncidentStore>,
    queue: Queue,
    audit: Arc<dyn AuditSink>,
}

impl RunbookService {
    /// Wire the service.
    #[must_use]
    pub fn new(
        runbooks: Arc<dyn RunbookStore>,
        executions: Arc<dyn RunbookExecutionStore>,
        incidents: Arc<dyn IncidentStore>,
        queue: Queue,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            runbooks,
            executions,
            incidents,
            queue,
            audit,
        }
    }

    /// Persist a new or edited runbook; edits bump the version.
    pub async fn save(&self, mut runbook: Runbook) -> Result<Runbook, RunbookError> {
        runbook.validate()?;
        if let Some(existing) = self.runbooks.get(runbook.id).await? {
            runbook.version = existing.version + 1;
        }
        self.runbooks.upsert(runbook.clone()).await?;
        Ok(runbook)
    }

    /// Move a runbook through its approval lifecycle. Only
    /// Draft→Approved and Approved→Deprecated are legal, and both are
    /// audited at high severity.
    pub async fn set_approval(
        &self,
        id: RunbookId,
        to: ApprovalStatus,
        user: UserId,
    ) -> Result<Runbook, RunbookError> {
        let mut runbook = self
            .runbooks
            .get(id)
            .await?
            .ok_or(RunbookError::NotFound(id))?;

        let legal = matches!(
            (runbook.approval, to),
            (ApprovalStatus::Draft, ApprovalStatus::Approved)
                | (ApprovalStatus::Approved, ApprovalStatus::Deprecated)
        );
        if !legal {
            return Err(RunbookError::InvalidApprovalTransition {
                from: runbook.approval,
                to,
            });
        }
        let from = runbook.approval;
        runbook.approval = to;
        self.runbooks.upsert(runbook.clone()).await?;

        let action = match to {
            ApprovalStatus::Approved => "runbook.approved",
            ApprovalStatus::Deprecated => "runbook.deprecated",
            ApprovalStatus::Draft => unreachable!("draft is never a transition target"),
        };
        let mut event = AuditEvent::new(action, ResourceKind::Runbook, id.to_string())
            .by_user(user)
            .high_severity()
            .with_meta("from", format!("{from:?}"));
        if let Some(team_id) = runbook.team_id {
            event = event.for_team(team_id);
        }
        self.audit.append(event).await?;

        tracing::info!(runbook_id = %id, from = ?from, to = ?to, "runbook approval changed");
        Ok(runbook)
    }

    /// Execute a runbook: gate on approval and team, validate the
    /// parameters, snapshot, and enqueue.
    pub async fn execute(
        &self,
        id: RunbookId,
        incident_id: Option<IncidentId>,
        params: Map<String, Value>,
        triggered_by: TriggeredBy,
        user: Option<UserId>,
        caller_team: Option<TeamId>,
    ) -> Result<ExecutionId, RunbookError> {
        let runbook = self
            .runbooks
            .get(id)
            .await?
            .ok_or(RunbookError::NotFound(id))?;

        // The approval gate comes first: a draft runbook must not even
        // validate parameters, let alone enqueue.
        if runbook.approval != ApprovalStatus::Approved {
            return Err(RunbookError::NotApproved {
                id,
                status: runbook.approval,
            });
        }

        // Team-scoped runbooks require matching team context.
        let incident = match incident_id {
            Some(incident_id) => Some(
                self.incidents
                    .get(incident_id)
                    .await?
                    .ok_or(vigil_incident::IncidentError::NotFound(incident_id))?,
            ),
            None => None,
        };
        if let Some(own_team) = runbook.team_id {
            let context_team = incident.as_ref().map(|i| i.team_id).or(caller_team);
            if context_team != Some(own_team) {
                return Err(RunbookError::Forbidden(id));
            }
        }

        let normalized = runbook
            .parameters
            .validate(&params)
            .map_err(RunbookError::InvalidParameters)?;

        let execution = RunbookExecution::create(
            &runbook,
            incident.as_ref().map(|i| i.id),
            incident.as_ref().map(vigil_incident::Incident::snapshot),
            normalized,
            triggered_by,
            user,
        );
        let execution_id = execution.id;
        self.executions.insert(execution).await?;

        self.queue
            .enqueue(
                Topic::Runbook,
                serde_json::to_value(RunbookPayload { execution_id })
                    .map_err(|e| RunbookError::Store(e.to_string()))?,
                EnqueueOptions::default()
                    .with_logical_id(format!("runbook:{execution_id}"))
                    .with_retry(RetryPolicy::none()),
            )
            .await?;

        tracing::info!(
            runbook_id = %id,
            execution_id = %execution_id,
            triggered_by = ?triggered_by,
            "runbook execution enqueued"
        );
        Ok(execution_id)
    }
}
