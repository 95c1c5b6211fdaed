//! The job store seam and its in-memory reference implementation.
//!
//! Storage shape is a deployment choice; the workers only ever talk to
//! [`JobStore`]. The in-memory store keeps claim semantics atomic under a
//! single mutex, which is exactly the contract a SQL store provides with
//! `SELECT ... FOR UPDATE SKIP LOCKED`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::JobId;

use crate::error::QueueError;
use crate::job::{Job, JobState};
use crate::topic::Topic;

/// Durable job storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job row.
    async fn insert(&self, job: Job) -> Result<(), QueueError>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError>;

    /// The non-terminal job with this logical id on this topic, if any.
    async fn find_active_by_logical(
        &self,
        topic: Topic,
        logical_id: &str,
    ) -> Result<Option<Job>, QueueError>;

    /// Atomically claim one due pending job: mark it `Running`, set
    /// `executed_at`, increment `attempts`. Returns `None` when nothing
    /// is due.
    async fn claim_due(&self, topic: Topic, now: DateTime<Utc>) -> Result<Option<Job>, QueueError>;

    /// Mark a claimed job completed.
    async fn complete(&self, id: JobId) -> Result<(), QueueError>;

    /// Push a claimed job back to `Pending` for a retry at `next_at`.
    async fn retry_at(
        &self,
        id: JobId,
        next_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), QueueError>;

    /// Mark a claimed job failed terminally.
    async fn fail(&self, id: JobId, error: &str) -> Result<(), QueueError>;

    /// Cancel a job if it is not terminal; idempotent.
    async fn cancel(&self, id: JobId) -> Result<(), QueueError>;

    /// Mark a stale claimed row superseded (reconciliation took over).
    async fn supersede(&self, id: JobId) -> Result<(), QueueError>;

    /// Rows claimed before `cutoff` that never completed.
    async fn stale_jobs(
        &self,
        topic: Topic,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, QueueError>;
}

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, for tests and inspection.
    #[must_use]
    pub fn all(&self) -> Vec<Job> {
        self.jobs.lock().values().cloned().collect()
    }

    fn update<F>(&self, id: JobId, f: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        f(job);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), QueueError> {
        self.jobs.lock().insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.jobs.lock().get(&id).cloned())
    }

    async fn find_active_by_logical(
        &self,
        topic: Topic,
        logical_id: &str,
    ) -> Result<Option<Job>, QueueError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .find(|j| {
                j.topic == topic
                    && !j.state.is_terminal()
                    && j.logical_id.as_deref() == Some(logical_id)
            })
            .cloned())
    }

    async fn claim_due(&self, topic: Topic, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        let mut jobs = self.jobs.lock();
        // Oldest due first keeps per-topic claims fair across incidents.
        let candidate = jobs
            .values()
            .filter(|j| j.topic == topic && j.state == JobState::Pending && j.scheduled_for <= now)
            .min_by_key(|j| j.scheduled_for)
            .map(|j| j.id);
        let Some(id) = candidate else {
            return Ok(None);
        };
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        job.state = JobState::Running;
        job.executed_at = Some(now);
        job.attempts += 1;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.update(id, |job| {
            job.state = JobState::Completed;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn retry_at(
        &self,
        id: JobId,
        next_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), QueueError> {
        self.update(id, |job| {
            job.state = JobState::Pending;
            job.scheduled_for = next_at;
            job.executed_at = None;
            job.last_error = Some(error.to_owned());
        })
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), QueueError> {
        self.update(id, |job| {
            job.state = JobState::Failed;
            job.completed_at = Some(Utc::now());
            job.last_error = Some(error.to_owned());
        })
    }

    async fn cancel(&self, id: JobId) -> Result<(), QueueError> {
        self.update(id, |job| {
            if !job.state.is_terminal() {
                job.state = JobState::Cancelled;
                job.completed_at = Some(Utc::now());
            }
        })
    }

    async fn supersede(&self, id: JobId) -> Result<(), QueueError> {
        self.update(id, |job| {
            if !job.state.is_terminal() {
                job.state = JobState::Superseded;
                job.completed_at = Some(Utc::now());
            }
        })
    }

    async fn stale_jobs(
        &self,
        topic: Topic,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, QueueError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|j| j.topic == topic && j.is_stale(cutoff))
            .cloned()
            .collect())
    }
}
