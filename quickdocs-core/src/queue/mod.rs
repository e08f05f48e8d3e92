//! Job queue port and the worker runtime that drains it.
//!
//! The broker contract is small on purpose: enqueue, blocking dequeue, ack,
//! and nack-with-retry, with retry bookkeeping carried on the task itself.

mod redis_queue;
mod worker;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quickdocs_model::IndexJob;

use crate::error::{IndexError, Result};

pub use redis_queue::RedisQueue;
pub use worker::{JobHandler, WorkerPool};

/// Queue defaults for `repo:index` tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const COMPLETED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Wire format of a queued task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: IndexJob,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub enqueued_at: DateTime<Utc>,
}

/// A dequeued task plus the retry bookkeeping terminal evaluation consults.
#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub id: String,
    pub job: IndexJob,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl LeasedTask {
    fn from_envelope(envelope: TaskEnvelope) -> Self {
        Self {
            id: envelope.id,
            job: envelope.payload,
            retry_count: envelope.retry_count,
            max_retries: envelope.max_retries,
            timeout: Duration::from_secs(envelope.timeout_secs),
        }
    }
}

/// Receipt returned to the enqueue API.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueuedTask {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub queue: String,
}

/// How a handled job ended, and therefore what the worker tells the queue.
#[derive(Debug)]
pub enum JobOutcome {
    /// Documentation persisted; ack.
    Completed,
    /// Another worker holds the indexing lock; the job is a no-op ack.
    Skipped,
    /// Non-final failure; nack so the queue redelivers later.
    Retry(IndexError),
    /// Terminal failure; ack so the queue never redelivers.
    Failed(IndexError),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues an indexing job with the default retry/timeout policy.
    async fn enqueue(&self, job: &IndexJob) -> Result<EnqueuedTask>;

    /// Blocks up to `wait` for a task. `Ok(None)` means the wait elapsed.
    async fn dequeue(&self, wait: Duration) -> Result<Option<LeasedTask>>;

    /// Marks a task done (successfully or terminally).
    async fn ack(&self, task: &LeasedTask) -> Result<()>;

    /// Schedules the task for redelivery with `retry_count + 1`.
    async fn nack_retry(&self, task: &LeasedTask) -> Result<()>;

    /// Moves due delayed tasks back to the pending queue; returns how many.
    async fn promote_due(&self) -> Result<usize>;
}
