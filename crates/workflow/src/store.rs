//! Workflow storage seam.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use vigil_core::WorkflowId;

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Workflow storage. Stores hold the *current* version of each workflow;
/// executions carry their own snapshots, so history does not need to be
/// queryable here.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert or replace the current version.
    async fn save(&self, workflow: Workflow) -> Result<(), WorkflowError>;

    /// Fetch the current version.
    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, WorkflowError>;

    /// Every enabled workflow.
    async fn list_enabled(&self) -> Result<Vec<Workflow>, WorkflowError>;

    /// Delete a workflow. In-flight executions are unaffected: they own
    /// their definition snapshots.
    async fn delete(&self, id: WorkflowId) -> Result<(), WorkflowError>;

    /// Flip the enabled flag without creating a new version.
    async fn set_enabled(&self, id: WorkflowId, enabled: bool) -> Result<(), WorkflowError>;
}

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
}

impl MemoryWorkflowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn save(&self, workflow: Workflow) -> Result<(), WorkflowError> {
        self.workflows.lock().insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, WorkflowError> {
        Ok(self.workflows.lock().get(&id).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<Workflow>, WorkflowError> {
        let mut enabled: Vec<Workflow> = self
            .workflows
            .lock()
            .values()
            .filter(|w| w.enabled)
            .cloned()
            .collect();
        enabled.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enabled)
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), WorkflowError> {
        self.workflows.lock().remove(&id);
        Ok(())
    }

    async fn set_enabled(&self, id: WorkflowId, enabled: bool) -> Result<(), WorkflowError> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(&id)
            .ok_or(WorkflowError::NotFound(id))?;
        workflow.enabled = enabled;
        Ok(())
    }
}
