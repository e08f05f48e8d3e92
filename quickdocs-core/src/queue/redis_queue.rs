//! Redis-backed job queue: a pending list, a delayed sorted set with a
//! promoter, a retention-trimmed completed set, and a dead list.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};
use uuid::Uuid;

use quickdocs_model::{IndexJob, TASK_TYPE_INDEX_REPO};

use crate::error::Result;

use super::{
    COMPLETED_RETENTION, DEFAULT_MAX_RETRIES, DEFAULT_TASK_TIMEOUT, EnqueuedTask, JobQueue,
    LeasedTask, TaskEnvelope,
};

const PENDING_KEY: &str = "quickdocs:queue:pending";
const DELAYED_KEY: &str = "quickdocs:queue:delayed";
const COMPLETED_KEY: &str = "quickdocs:queue:completed";
const DEAD_KEY: &str = "quickdocs:queue:dead";

const QUEUE_NAME: &str = "default";
const PROMOTE_BATCH: usize = 100;

const NACK_BASE_DELAY: Duration = Duration::from_secs(10);
const NACK_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQueue")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: &IndexJob) -> Result<EnqueuedTask> {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4().to_string(),
            task_type: TASK_TYPE_INDEX_REPO.to_string(),
            payload: job.clone(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TASK_TIMEOUT.as_secs(),
            enqueued_at: chrono::Utc::now(),
        };
        let body = serde_json::to_string(&envelope)?;

        redis::cmd("LPUSH")
            .arg(PENDING_KEY)
            .arg(body)
            .query_async::<()>(&mut self.connection())
            .await?;

        debug!("enqueued task {} for {}", envelope.id, job.full_name());
        Ok(EnqueuedTask {
            task_id: envelope.id,
            queue: QUEUE_NAME.to_string(),
        })
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<LeasedTask>> {
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(PENDING_KEY)
            .arg(wait.as_secs_f64())
            .query_async(&mut self.connection())
            .await?;

        let Some((_, body)) = popped else {
            return Ok(None);
        };

        match serde_json::from_str::<TaskEnvelope>(&body) {
            Ok(envelope) => Ok(Some(LeasedTask::from_envelope(envelope))),
            Err(e) => {
                // A malformed envelope would wedge the queue if requeued.
                warn!("dropping undecodable task from {PENDING_KEY}: {e}");
                Ok(None)
            }
        }
    }

    async fn ack(&self, task: &LeasedTask) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let horizon = now - COMPLETED_RETENTION.as_secs() as i64;

        let mut conn = self.connection();
        redis::cmd("ZADD")
            .arg(COMPLETED_KEY)
            .arg(now)
            .arg(&task.id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("ZREMRANGEBYSCORE")
            .arg(COMPLETED_KEY)
            .arg("-inf")
            .arg(horizon)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn nack_retry(&self, task: &LeasedTask) -> Result<()> {
        let mut envelope = TaskEnvelope {
            id: task.id.clone(),
            task_type: TASK_TYPE_INDEX_REPO.to_string(),
            payload: task.job.clone(),
            retry_count: task.retry_count + 1,
            max_retries: task.max_retries,
            timeout_secs: task.timeout.as_secs(),
            enqueued_at: chrono::Utc::now(),
        };

        if envelope.retry_count > envelope.max_retries {
            // The handler should have gone terminal before this point; park
            // the task for inspection instead of looping.
            warn!("task {} exceeded its retry budget, moving to dead list", task.id);
            envelope.retry_count = task.retry_count;
            let body = serde_json::to_string(&envelope)?;
            redis::cmd("LPUSH")
                .arg(DEAD_KEY)
                .arg(body)
                .query_async::<()>(&mut self.connection())
                .await?;
            return Ok(());
        }

        let delay = nack_delay(task.retry_count);
        let due = chrono::Utc::now().timestamp() + delay.as_secs() as i64;
        let body = serde_json::to_string(&envelope)?;

        redis::cmd("ZADD")
            .arg(DELAYED_KEY)
            .arg(due)
            .arg(body)
            .query_async::<()>(&mut self.connection())
            .await?;

        debug!(
            "task {} scheduled for retry {} in {:?}",
            task.id, envelope.retry_count, delay
        );
        Ok(())
    }

    async fn promote_due(&self) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.connection();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(DELAYED_KEY)
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(PROMOTE_BATCH)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0usize;
        for body in due {
            // ZREM gates the handoff so concurrent promoters never double
            // deliver.
            let removed: i64 = redis::cmd("ZREM")
                .arg(DELAYED_KEY)
                .arg(&body)
                .query_async(&mut conn)
                .await?;
            if removed == 0 {
                continue;
            }
            redis::cmd("LPUSH")
                .arg(PENDING_KEY)
                .arg(&body)
                .query_async::<()>(&mut conn)
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!("promoted {promoted} delayed task(s)");
        }
        Ok(promoted)
    }
}

/// Redelivery delay: exponential from the base with a little jitter so a
/// burst of failures does not come back as a burst of retries.
fn nack_delay(retry_count: u32) -> Duration {
    let base = NACK_BASE_DELAY * (1 << retry_count.min(5));
    let capped = base.min(NACK_MAX_DELAY);
    let jitter = rand::rng().random_range(0..5);
    capped + Duration::from_secs(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nack_delay_grows_and_caps() {
        assert!(nack_delay(0) >= Duration::from_secs(10));
        assert!(nack_delay(0) < Duration::from_secs(20));
        assert!(nack_delay(3) >= Duration::from_secs(80));
        assert!(nack_delay(10) <= NACK_MAX_DELAY + Duration::from_secs(5));
    }
}
