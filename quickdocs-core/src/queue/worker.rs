//! The worker pool: N dequeue loops plus one delayed-task promoter, all
//! supervised under a single cancellation token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{JobOutcome, JobQueue, LeasedTask};

const DEQUEUE_WAIT: Duration = Duration::from_secs(5);
const PROMOTE_INTERVAL: Duration = Duration::from_secs(5);
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Something that can process one leased task to an outcome. The handler owns
/// terminal evaluation; the worker only maps the outcome onto the queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, task: &LeasedTask, cancel: &CancellationToken) -> JobOutcome;
}

/// Drains the queue with a fixed number of concurrent workers.
#[derive(Debug)]
pub struct WorkerPool<Q, H> {
    queue: Arc<Q>,
    handler: Arc<H>,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl<Q, H> WorkerPool<Q, H>
where
    Q: JobQueue + 'static,
    H: JobHandler + 'static,
{
    pub fn new(
        queue: Arc<Q>,
        handler: Arc<H>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            handler,
            concurrency: concurrency.max(1),
            shutdown,
        }
    }

    /// Spawns the worker and promoter loops. The returned handles finish once
    /// the shutdown token fires and in-flight jobs have unwound.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        info!("starting worker pool with concurrency={}", self.concurrency);

        let mut handles = Vec::with_capacity(self.concurrency + 1);
        for worker_id in 0..self.concurrency {
            let queue = self.queue.clone();
            let handler = self.handler.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, handler, shutdown).await;
            }));
        }

        let queue = self.queue.clone();
        let shutdown = self.shutdown.clone();
        handles.push(tokio::spawn(async move {
            promoter_loop(queue, shutdown).await;
        }));

        handles
    }

    /// Runs until shutdown, awaiting every loop.
    pub async fn run(&self) {
        for handle in self.spawn() {
            if let Err(e) = handle.await {
                error!("worker task aborted: {e}");
            }
        }
    }
}

/// One dequeue loop. Stops taking new work the moment shutdown fires;
/// an already-leased job keeps running and unwinds through its handler.
async fn worker_loop<Q: JobQueue, H: JobHandler>(
    worker_id: usize,
    queue: Arc<Q>,
    handler: Arc<H>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let task = tokio::select! {
            _ = shutdown.cancelled() => break,
            dequeued = queue.dequeue(DEQUEUE_WAIT) => match dequeued {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    warn!("worker {worker_id}: dequeue failed: {e}");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_PAUSE) => continue,
                    }
                }
            },
        };

        process_task(worker_id, queue.as_ref(), handler.as_ref(), task, &shutdown).await;
    }

    info!("worker {worker_id} stopped");
}

/// Runs one task under its timeout and maps the outcome onto the queue.
async fn process_task<Q: JobQueue, H: JobHandler>(
    worker_id: usize,
    queue: &Q,
    handler: &H,
    task: LeasedTask,
    shutdown: &CancellationToken,
) {
    // The task timeout is delivered as cancellation so the handler unwinds
    // through its own terminal evaluation, exactly like an external shutdown.
    let job_cancel = shutdown.child_token();
    let watchdog = {
        let token = job_cancel.clone();
        let timeout = task.timeout;
        let task_id = task.id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!("task {task_id} hit its {timeout:?} timeout, cancelling");
                    token.cancel();
                }
            }
        })
    };

    let outcome = handler.handle(&task, &job_cancel).await;
    job_cancel.cancel();
    watchdog.abort();

    match outcome {
        JobOutcome::Completed | JobOutcome::Skipped => {
            if let Err(e) = queue.ack(&task).await {
                warn!("worker {worker_id}: ack of task {} failed: {e}", task.id);
            }
        }
        JobOutcome::Failed(err) => {
            error!(
                "worker {worker_id}: task {} failed terminally: {err}",
                task.id
            );
            if let Err(e) = queue.ack(&task).await {
                warn!("worker {worker_id}: ack of task {} failed: {e}", task.id);
            }
        }
        JobOutcome::Retry(err) => {
            warn!(
                "worker {worker_id}: task {} will be retried: {err}",
                task.id
            );
            if let Err(e) = queue.nack_retry(&task).await {
                error!(
                    "worker {worker_id}: nack of task {} failed, task is lost until lock expiry: {e}",
                    task.id
                );
            }
        }
    }
}

/// Periodically moves due delayed tasks back into the pending queue.
async fn promoter_loop<Q: JobQueue>(queue: Arc<Q>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(PROMOTE_INTERVAL) => {}
        }

        if let Err(e) = queue.promote_due().await {
            warn!("promoting delayed tasks failed: {e}");
        }
    }

    info!("promoter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IndexError, Result};
    use crate::queue::EnqueuedTask;
    use quickdocs_model::IndexJob;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct InMemoryQueue {
        pending: Mutex<VecDeque<LeasedTask>>,
        acked: AtomicUsize,
        nacked: AtomicUsize,
    }

    impl InMemoryQueue {
        fn push(&self, task: LeasedTask) {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(task);
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryQueue {
        async fn enqueue(&self, _job: &IndexJob) -> Result<EnqueuedTask> {
            unimplemented!("not used by the pool tests")
        }

        async fn dequeue(&self, wait: Duration) -> Result<Option<LeasedTask>> {
            let task = self
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();
            if task.is_none() {
                tokio::time::sleep(wait).await;
            }
            Ok(task)
        }

        async fn ack(&self, _task: &LeasedTask) -> Result<()> {
            self.acked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn nack_retry(&self, task: &LeasedTask) -> Result<()> {
            self.nacked.fetch_add(1, Ordering::SeqCst);
            let mut redelivered = task.clone();
            redelivered.retry_count += 1;
            self.push(redelivered);
            Ok(())
        }

        async fn promote_due(&self) -> Result<usize> {
            Ok(0)
        }
    }

    struct FlakyHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, task: &LeasedTask, _cancel: &CancellationToken) -> JobOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if task.retry_count == 0 {
                JobOutcome::Retry(IndexError::Internal("first attempt fails".to_string()))
            } else {
                JobOutcome::Completed
            }
        }
    }

    struct HangingHandler;

    #[async_trait]
    impl JobHandler for HangingHandler {
        async fn handle(&self, _task: &LeasedTask, cancel: &CancellationToken) -> JobOutcome {
            cancel.cancelled().await;
            JobOutcome::Retry(IndexError::Cancelled("unwound".to_string()))
        }
    }

    fn task(timeout: Duration) -> LeasedTask {
        LeasedTask {
            id: "t1".to_string(),
            job: IndexJob {
                repo_id: "r1".to_string(),
                owner: "alice".to_string(),
                repo: "repo1".to_string(),
                access_token: None,
            },
            retry_count: 0,
            max_retries: 5,
            timeout,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retried_task_is_redelivered_then_acked() {
        let queue = Arc::new(InMemoryQueue::default());
        let handler = Arc::new(FlakyHandler {
            calls: AtomicUsize::new(0),
        });
        queue.push(task(Duration::from_secs(60)));

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(queue.clone(), handler.clone(), 1, shutdown.clone());
        let handles = pool.spawn();

        while handler.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        shutdown.cancel();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.nacked.load(Ordering::SeqCst), 1);
        assert_eq!(queue.acked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_the_handler_and_nacks() {
        let queue = Arc::new(InMemoryQueue::default());
        queue.push(task(Duration::from_secs(10)));

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(
            queue.clone(),
            Arc::new(HangingHandler),
            1,
            shutdown.clone(),
        );
        let handles = pool.spawn();

        while queue.nacked.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        shutdown.cancel();
        for handle in handles {
            let _ = handle.await;
        }

        assert!(queue.nacked.load(Ordering::SeqCst) >= 1);
    }
}
