//! Queue worker: claims queued executions and runs the Step Executor.
//!
//! Polls the execution queue every `poll_interval` and runs up to
//! `concurrency` executions at once. Claims are exclusive, and the
//! executor's `PENDING -> IN_PROGRESS` compare-and-set stops a redelivered
//! entry from running a job twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use inquiry_db::{ExecutionQueue, QueuedExecution, StoreError};
use inquiry_pipeline::StepExecutor;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Worker settings loaded from the environment.
///
/// | Env Var                   | Default        |
/// |---------------------------|----------------|
/// | `WORKER_NAME`             | `worker-<pid>` |
/// | `WORKER_CONCURRENCY`      | `4`            |
/// | `WORKER_POLL_INTERVAL_MS` | `1000`         |
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Recorded on every claim.
    pub name: String,
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: format!("worker-{}", std::process::id()),
            concurrency: 4,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Panics on malformed numbers.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let name = std::env::var("WORKER_NAME").unwrap_or(defaults.name);

        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .map(|v| v.parse().expect("WORKER_CONCURRENCY must be a valid usize"))
            .unwrap_or(defaults.concurrency);

        let poll_interval = std::env::var("WORKER_POLL_INTERVAL_MS")
            .map(|v| {
                Duration::from_millis(v.parse().expect("WORKER_POLL_INTERVAL_MS must be a valid u64"))
            })
            .unwrap_or(defaults.poll_interval);

        Self {
            name,
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }
}

/// Long-lived consumer of the execution queue.
pub struct QueueWorker {
    queue: Arc<dyn ExecutionQueue>,
    executor: Arc<StepExecutor>,
    config: WorkerConfig,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn ExecutionQueue>,
        executor: Arc<StepExecutor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.concurrency)),
            queue,
            executor,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Run the poll loop until the cancellation token is triggered, then
    /// wait for running executions to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        tracing::info!(
            worker = %self.config.name,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Queue worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker = %self.config.name, "Queue worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Queue poll failed");
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!(worker = %self.config.name, "Queue worker stopped");
    }

    /// Claim and start as many executions as there are free slots.
    ///
    /// Returns the number of executions started.
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        let mut started = 0;
        while let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            let Some(entry) = self.queue.claim_next(&self.config.name, Utc::now()).await? else {
                break;
            };
            tracing::info!(
                worker = %self.config.name,
                job_id = %entry.job_id,
                entry_id = entry.id,
                "Execution claimed",
            );

            let queue = Arc::clone(&self.queue);
            let executor = Arc::clone(&self.executor);
            self.tracker.spawn(async move {
                let _permit = permit;
                run_entry(queue.as_ref(), &executor, entry).await;
            });
            started += 1;
        }
        Ok(started)
    }

    /// Executions currently running.
    pub fn running(&self) -> usize {
        self.config.concurrency - self.permits.available_permits()
    }
}

async fn run_entry(queue: &dyn ExecutionQueue, executor: &StepExecutor, entry: QueuedExecution) {
    executor.execute(entry.job_id).await;
    if let Err(e) = queue.finish(entry.id, Utc::now()).await {
        tracing::error!(
            entry_id = entry.id,
            job_id = %entry.job_id,
            error = %e,
            "Failed to mark queue entry finished",
        );
    }
}
