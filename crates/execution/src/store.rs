//! Execution storage seam.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::{ExecutionId, IncidentId, WorkflowId};

use crate::execution::WorkflowExecution;

/// Errors from execution storage.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Unknown execution.
    #[error("execution not found: {0}")]
    NotFound(ExecutionId),

    /// Backing store failure.
    #[error("execution store failure: {0}")]
    Store(String),
}

/// Execution storage. Only one worker holds an execution at a time (the
/// queue serializes per-execution jobs), so updates are plain overwrites.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution.
    async fn insert(&self, execution: WorkflowExecution) -> Result<(), ExecutionError>;

    /// Fetch by id.
    async fn get(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>, ExecutionError>;

    /// Overwrite an existing execution.
    async fn update(&self, execution: WorkflowExecution) -> Result<(), ExecutionError>;

    /// Whether the workflow has any execution for this incident created
    /// after `after`. The age poller's re-trigger guard.
    async fn exists_since(
        &self,
        workflow_id: WorkflowId,
        incident_id: IncidentId,
        after: DateTime<Utc>,
    ) -> Result<bool, ExecutionError>;

    /// Every execution for an incident, oldest first.
    async fn for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<WorkflowExecution>, ExecutionError>;
}

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    executions: Mutex<HashMap<ExecutionId, WorkflowExecution>>,
}

impl MemoryExecutionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, for tests.
    #[must_use]
    pub fn all(&self) -> Vec<WorkflowExecution> {
        self.executions.lock().values().cloned().collect()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn insert(&self, execution: WorkflowExecution) -> Result<(), ExecutionError> {
        self.executions.lock().insert(execution.id, execution);
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>, ExecutionError> {
        Ok(self.executions.lock().get(&id).cloned())
    }

    async fn update(&self, execution: WorkflowExecution) -> Result<(), ExecutionError> {
        let mut executions = self.executions.lock();
        if !executions.contains_key(&execution.id) {
            return Err(ExecutionError::NotFound(execution.id));
        }
        executions.insert(execution.id, execution);
        Ok(())
    }

    async fn exists_since(
        &self,
        workflow_id: WorkflowId,
        incident_id: IncidentId,
        after: DateTime<Utc>,
    ) -> Result<bool, ExecutionError> {
        Ok(self.executions.lock().values().any(|e| {
            e.workflow_id == workflow_id && e.incident_id == incident_id && e.created_at > after
        }))
    }

    async fn for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<WorkflowExecution>, ExecutionError> {
        let mut hits: Vec<WorkflowExecution> = self
            .executions
            .lock()
            .values()
            .filter(|e| e.incident_id == incident_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(hits)
    }
}
