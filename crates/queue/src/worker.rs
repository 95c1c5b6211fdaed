//! Per-topic worker pools.
//!
//! A pool polls its topic, claims due jobs, and runs them on spawned
//! tasks bounded by a semaphore and a per-minute start budget. Handler
//! failures split into transient (retried per the job's policy) and
//! terminal (the job fails now); the owner observes exhaustion through
//! `on_failed`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::job::Job;
use crate::store::JobStore;
use crate::topic::Topic;

/// How a job handler failed.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Infrastructure blip; the queue retries per the job's policy.
    #[error("transient: {0}")]
    Transient(String),
    /// The work itself failed; no retry, the job fails now.
    #[error("terminal: {0}")]
    Terminal(String),
}

/// A topic's job handler.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one claimed job. Must be idempotent: the queue is
    /// at-least-once and redelivers after crashes.
    async fn handle(&self, job: &Job) -> Result<(), HandlerError>;

    /// Called once when a job fails terminally (exhausted retries or a
    /// terminal error). Default: nothing.
    async fn on_failed(&self, _job: &Job) {}
}

/// Worker pool tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent handlers per topic.
    pub concurrency: usize,
    /// Job starts allowed per rolling minute (safety limiter).
    pub max_per_minute: u32,
    /// Poll interval when the topic is idle.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_per_minute: 100,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Rolling one-minute start budget.
#[derive(Debug)]
struct MinuteBudget {
    window_start: Instant,
    started: u32,
    limit: u32,
}

impl MinuteBudget {
    fn new(limit: u32) -> Self {
        Self {
            window_start: Instant::now(),
            started: 0,
            limit,
        }
    }

    fn try_start(&mut self) -> bool {
        if self.window_start.elapsed() >= Duration::from_secs(60) {
            self.window_start = Instant::now();
            self.started = 0;
        }
        if self.started >= self.limit {
            return false;
        }
        self.started += 1;
        true
    }
}

/// A running worker pool for one topic.
pub struct WorkerPool {
    topic: Topic,
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    cancel: CancellationToken,
    loop_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a stopped pool.
    #[must_use]
    pub fn new(
        topic: Topic,
        store: Arc<dyn JobStore>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            topic,
            store,
            handler,
            config,
            cancel: CancellationToken::new(),
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the poll loop. A second call is a no-op.
    pub fn start(&self) {
        let mut guard = self.loop_handle.lock();
        if guard.is_some() {
            return;
        }

        let topic = self.topic;
        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        let config = self.config.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            run_loop(topic, store, handler, config, cancel).await;
        });
        *guard = Some(handle);
        tracing::info!(topic = %self.topic, "worker pool started");
    }

    /// Stop polling, wait for in-flight handlers to drain. Idempotent and
    /// safe to call while a poll tick is running.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!(topic = %self.topic, "worker pool stopped");
    }
}

async fn run_loop(
    topic: Topic,
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut budget = MinuteBudget::new(config.max_per_minute);
    let mut inflight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(config.poll_interval) => {}
        }

        // Reap finished handler tasks without blocking the poll.
        while inflight.try_join_next().is_some() {}

        // Claim as many due jobs as budget and permits allow this tick.
        loop {
            if cancel.is_cancelled() || !budget.try_start() {
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                break;
            };
            let claimed = match store.claim_due(topic, Utc::now()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(error) => {
                    tracing::error!(topic = %topic, error = %error, "claim failed");
                    break;
                }
            };

            let store = Arc::clone(&store);
            let handler = Arc::clone(&handler);
            inflight.spawn(async move {
                let _permit = permit;
                run_job(topic, &*store, &*handler, claimed).await;
            });
        }
    }

    // Drain in-flight handlers before reporting stopped.
    while inflight.join_next().await.is_some() {}
}

async fn run_job(topic: Topic, store: &dyn JobStore, handler: &dyn JobHandler, job: Job) {
    tracing::debug!(topic = %topic, job_id = %job.id, attempt = job.attempts, "job started");

    let failure = match handler.handle(&job).await {
        Ok(()) => {
            if let Err(error) = store.complete(job.id).await {
                tracing::error!(job_id = %job.id, error = %error, "completion write failed");
            }
            tracing::debug!(topic = %topic, job_id = %job.id, "job completed");
            return;
        }
        Err(failure) => failure,
    };

    match &failure {
        HandlerError::Transient(reason) if job.attempts < job.retry.max_attempts => {
            let delay = job.retry.delay_for(job.attempts);
            let next_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(1));
            tracing::warn!(
                topic = %topic,
                job_id = %job.id,
                attempt = job.attempts,
                error = %reason,
                retry_in_ms = delay.as_millis() as u64,
                "job retrying"
            );
            if let Err(error) = store.retry_at(job.id, next_at, reason).await {
                tracing::error!(job_id = %job.id, error = %error, "retry write failed");
            }
        }
        HandlerError::Transient(reason) | HandlerError::Terminal(reason) => {
            tracing::error!(
                topic = %topic,
                job_id = %job.id,
                attempt = job.attempts,
                error = %reason,
                "job failed"
            );
            if let Err(error) = store.fail(job.id, reason).await {
                tracing::error!(job_id = %job.id, error = %error, "failure write failed");
            }
            let mut failed = job.clone();
            failed.last_error = Some(reason.clone());
            handler.on_failed(&failed).await;
        }
    }
}

/// Convenience: build, start, and hand back pools for every topic.
pub fn start_all(
    store: &Arc<dyn JobStore>,
    handlers: impl IntoIterator<Item = (Topic, Arc<dyn JobHandler>)>,
    config: &WorkerConfig,
) -> Vec<Arc<WorkerPool>> {
    handlers
        .into_iter()
        .map(|(topic, handler)| {
            let pool = Arc::new(WorkerPool::new(
                topic,
                Arc::clone(store),
                handler,
                config.clone(),
            ));
            pool.start();
            pool
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RetryPolicy;
    use crate::queue::{EnqueueOptions, Queue};
    use crate::store::MemoryJobStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHandler {
        calls: AtomicU32,
        failures_before_success: u32,
        terminal: bool,
        failed_jobs: AtomicU32,
    }

    impl CountingHandler {
        fn succeeding() -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success: 0,
                terminal: false,
                failed_jobs: AtomicU32::new(0),
            }
        }

        fn flaky(failures: u32) -> Self {
            Self {
                failures_before_success: failures,
                ..Self::succeeding()
            }
        }

        fn terminal() -> Self {
            Self {
                terminal: true,
                ..Self::succeeding()
            }
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &Job) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.terminal {
                return Err(HandlerError::Terminal("nope".into()));
            }
            if call < self.failures_before_success {
                return Err(HandlerError::Transient("blip".into()));
            }
            Ok(())
        }

        async fn on_failed(&self, _job: &Job) {
            self.failed_jobs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            concurrency: 2,
            max_per_minute: 100,
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never satisfied");
    }

    #[tokio::test]
    async fn pool_runs_job_to_completion() {
        let store: Arc<MemoryJobStore> = Arc::new(MemoryJobStore::new());
        let dyn_store: Arc<dyn JobStore> = store.clone();
        let queue = Queue::new(dyn_store.clone());
        let handler = Arc::new(CountingHandler::succeeding());

        let id = queue
            .enqueue(Topic::Workflow, serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let pool = WorkerPool::new(Topic::Workflow, dyn_store, handler.clone(), fast_config());
        pool.start();
        wait_until(|| handler.calls.load(Ordering::SeqCst) >= 1).await;
        pool.shutdown().await;

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, crate::job::JobState::Completed);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let store: Arc<MemoryJobStore> = Arc::new(MemoryJobStore::new());
        let dyn_store: Arc<dyn JobStore> = store.clone();
        let queue = Queue::new(dyn_store.clone());
        let handler = Arc::new(CountingHandler::flaky(2));

        let id = queue
            .enqueue(
                Topic::Workflow,
                serde_json::json!({}),
                EnqueueOptions::default().with_retry(RetryPolicy {
                    max_attempts: 5,
                    initial_delay_ms: 1,
                    max_delay_ms: 10,
                }),
            )
            .await
            .unwrap();

        let pool = WorkerPool::new(Topic::Workflow, dyn_store, handler.clone(), fast_config());
        pool.start();
        wait_until(|| handler.calls.load(Ordering::SeqCst) >= 3).await;
        wait_until(|| {
            store
                .all()
                .iter()
                .any(|j| j.id == id && j.state == crate::job::JobState::Completed)
        })
        .await;
        pool.shutdown().await;

        assert_eq!(handler.failed_jobs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminal_failure_fails_without_retry() {
        let store: Arc<MemoryJobStore> = Arc::new(MemoryJobStore::new());
        let dyn_store: Arc<dyn JobStore> = store.clone();
        let queue = Queue::new(dyn_store.clone());
        let handler = Arc::new(CountingHandler::terminal());

        let id = queue
            .enqueue(Topic::Runbook, serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let pool = WorkerPool::new(Topic::Runbook, dyn_store, handler.clone(), fast_config());
        pool.start();
        wait_until(|| handler.failed_jobs.load(Ordering::SeqCst) == 1).await;
        pool.shutdown().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, crate::job::JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let pool = WorkerPool::new(
            Topic::System,
            store,
            Arc::new(CountingHandler::succeeding()),
            fast_config(),
        );
        pool.start();
        pool.shutdown().await;
        pool.shutdown().await;
    }
}
