//! Durable delayed job queue.
//!
//! The single queue behind all three engines: named topics, delayed
//! delivery, retry with exponential backoff, logical-id dedup, stale-job
//! reconciliation, and per-topic worker pools with bounded concurrency.
//!
//! Delivery is at-least-once; handlers must be idempotent. A worker claim
//! records `executed_at` **before** the handler runs its side effects and
//! `completed` only after, so a crash between the two leaves a stale row
//! that [`Queue::reconcile`] re-enqueues under the same logical id.

mod error;
mod job;
mod leader;
mod queue;
mod store;
mod topic;
mod worker;

pub use error::QueueError;
pub use job::{Job, JobState, RetryPolicy};
pub use leader::{LeaderGuard, LeaderLock};
pub use queue::{EnqueueOptions, Queue};
pub use store::{JobStore, MemoryJobStore};
pub use topic::Topic;
pub use worker::{HandlerError, JobHandler, WorkerConfig, WorkerPool, start_all};
