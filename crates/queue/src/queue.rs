//! The queue façade: enqueue, cancel, reconcile.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vigil_core::JobId;

use crate::error::QueueError;
use crate::job::{Job, JobState, RetryPolicy};
use crate::store::JobStore;
use crate::topic::Topic;

/// Options accepted at enqueue.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Delay before the job becomes due.
    pub delay: Option<Duration>,
    /// Dedup/supersede key; at most one non-terminal job per key per topic.
    pub logical_id: Option<String>,
    /// Retry policy; defaults to [`RetryPolicy::standard`].
    pub retry: Option<RetryPolicy>,
}

impl EnqueueOptions {
    /// Delay the job by `delay`.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Set the logical dedup key.
    #[must_use]
    pub fn with_logical_id(mut self, logical_id: impl Into<String>) -> Self {
        self.logical_id = Some(logical_id.into());
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Handle to the shared queue.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn JobStore>,
}

impl Queue {
    /// Wrap a job store.
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// The underlying store, shared with worker pools.
    #[must_use]
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Push a job. Rejects with [`QueueError::Duplicate`] when a
    /// non-terminal job with the same logical id already exists on the
    /// topic.
    pub async fn enqueue(
        &self,
        topic: Topic,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError> {
        if let Some(logical_id) = &options.logical_id
            && let Some(existing) = self
                .store
                .find_active_by_logical(topic, logical_id)
                .await?
        {
            tracing::debug!(
                topic = %topic,
                logical_id = %logical_id,
                existing_job_id = %existing.id,
                "enqueue rejected: active job exists"
            );
            return Err(QueueError::Duplicate {
                logical_id: logical_id.clone(),
            });
        }

        let now = Utc::now();
        let scheduled_for = options
            .delay
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map_or(now, |d| now + d);

        let job = Job {
            id: JobId::v4(),
            topic,
            logical_id: options.logical_id,
            payload,
            state: JobState::Pending,
            scheduled_for,
            attempts: 0,
            retry: options.retry.unwrap_or_default(),
            executed_at: None,
            completed_at: None,
            last_error: None,
            created_at: now,
        };
        let id = job.id;
        self.store.insert(job).await?;
        tracing::debug!(topic = %topic, job_id = %id, "job enqueued");
        Ok(id)
    }

    /// Cancel a job; it becomes a no-op at dequeue. Idempotent.
    pub async fn cancel(&self, id: JobId) -> Result<(), QueueError> {
        self.store.cancel(id).await
    }

    /// Re-enqueue stale in-flight jobs on a topic.
    ///
    /// A stale job was claimed (side effects may have started) but never
    /// completed and its claim is older than `stale_after`. Each is
    /// superseded and re-inserted under the same logical id, so running
    /// reconciliation twice reschedules nothing new the second time.
    ///
    /// Returns the ids of the replacement jobs.
    pub async fn reconcile(
        &self,
        topic: Topic,
        stale_after: Duration,
    ) -> Result<Vec<JobId>, QueueError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let stale = self.store.stale_jobs(topic, cutoff).await?;

        let mut replacements = Vec::with_capacity(stale.len());
        for job in stale {
            self.store.supersede(job.id).await?;
            let replacement = Job {
                id: JobId::v4(),
                state: JobState::Pending,
                scheduled_for: Utc::now(),
                executed_at: None,
                completed_at: None,
                created_at: Utc::now(),
                ..job.clone()
            };
            let new_id = replacement.id;
            self.store.insert(replacement).await?;
            tracing::warn!(
                topic = %topic,
                stale_job_id = %job.id,
                job_id = %new_id,
                attempts = job.attempts,
                "stale in-flight job re-enqueued"
            );
            replacements.push(new_id);
        }
        Ok(replacements)
    }
}
