//! Runbook storage seams.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use vigil_core::{ExecutionId, RunbookId};

use crate::error::RunbookError;
use crate::execution::RunbookExecution;
use crate::runbook::Runbook;

/// Runbook storage.
#[async_trait]
pub trait RunbookStore: Send + Sync {
    /// Insert or replace a runbook.
    async fn upsert(&self, runbook: Runbook) -> Result<(), RunbookError>;

    /// Fetch by id.
    async fn get(&self, id: RunbookId) -> Result<Option<Runbook>, RunbookError>;
}

/// Runbook execution storage.
#[async_trait]
pub trait RunbookExecutionStore: Send + Sync {
    /// Insert a new execution.
    async fn insert(&self, execution: RunbookExecution) -> Result<(), RunbookError>;

    /// Fetch by id.
    async fn get(&self, id: ExecutionId) -> Result<Option<RunbookExecution>, RunbookError>;

    /// Overwrite an existing execution.
    async fn update(&self, execution: RunbookExecution) -> Result<(), RunbookError>;
}

/// In-memory runbook store.
#[derive(Debug, Default)]
pub struct MemoryRunbookStore {
    runbooks: Mutex<HashMap<RunbookId, Runbook>>,
}

impl MemoryRunbookStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunbookStore for MemoryRunbookStore {
    async fn upsert(&self, runbook: Runbook) -> Result<(), RunbookError> {
        self.runbooks.lock().insert(runbook.id, runbook);
        Ok(())
    }

    async fn get(&self, id: RunbookId) -> Result<Option<Runbook>, RunbookError> {
        Ok(self.runbooks.lock().get(&id).cloned())
    }
}

/// In-memory execution store.
#[derive(Debug, Default)]
pub struct MemoryRunbookExecutionStore {
    executions: Mutex<HashMap<ExecutionId, RunbookExecution>>,
}

impl MemoryRunbookExecutionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, for tests.
    #[must_use]
    pub fn all(&self) -> Vec<RunbookExecution> {
        self.executions.lock().values().cloned().collect()
    }
}

#[async_trait]
impl RunbookExecutionStore for MemoryRunbookExecutionStore {
    async fn insert(&self, execution: RunbookExecution) -> Result<(), RunbookError> {
        self.executions.lock().insert(execution.id, execution);
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<RunbookExecution>, RunbookError> {
        Ok(self.executions.lock().get(&id).cloned())
    }

    async fn update(&self, execution: RunbookExecution) -> Result<(), RunbookError> {
        let mut executions = self.executions.lock();
        if !executions.contains_key(&execution.id) {
            return Err(RunbookError::Store(format!(
                "execution {} not found",
                execution.id
            )));
        }
        executions.insert(execution.id, execution);
        Ok(())
    }
}
