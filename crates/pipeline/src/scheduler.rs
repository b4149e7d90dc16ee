//! Scheduling strategies: how the dispatcher gets one execution running.
//!
//! Both strategies guarantee at most one scheduled execution per job id.
//! The executor's `PENDING -> IN_PROGRESS` compare-and-set backs that up
//! across processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use inquiry_core::error::CoreError;
use inquiry_core::types::JobId;
use inquiry_db::ExecutionQueue;
use tokio_util::task::TaskTracker;

use crate::executor::StepExecutor;

/// Schedules exactly one execution of the Step Executor for a job.
#[async_trait]
pub trait ExecutionScheduler: Send + Sync {
    /// Fails with [`CoreError::Conflict`] if an execution is already
    /// scheduled for `job_id`.
    async fn schedule(&self, job_id: JobId) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Runs executions as background tasks of the current process.
pub struct InlineScheduler {
    executor: Arc<StepExecutor>,
    in_flight: Arc<Mutex<HashSet<JobId>>>,
    tracker: TaskTracker,
}

impl InlineScheduler {
    pub fn new(executor: Arc<StepExecutor>) -> Self {
        Self {
            executor,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of executions currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting work and wait for running executions to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        tracing::info!(in_flight = self.in_flight(), "Draining inline executions");
        self.tracker.wait().await;
    }
}

/// Removes a job id from the in-flight set when its task ends, even if the
/// execution panicked.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<JobId>>>,
    job_id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

#[async_trait]
impl ExecutionScheduler for InlineScheduler {
    async fn schedule(&self, job_id: JobId) -> Result<(), CoreError> {
        if self.tracker.is_closed() {
            return Err(CoreError::Internal("scheduler is shutting down".into()));
        }

        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id);
        if !inserted {
            return Err(CoreError::Conflict(format!(
                "execution of research job {job_id} is already scheduled"
            )));
        }

        let guard = InFlightGuard {
            set: Arc::clone(&self.in_flight),
            job_id,
        };
        let executor = Arc::clone(&self.executor);
        self.tracker.spawn(async move {
            let _guard = guard;
            executor.execute(job_id).await;
        });

        tracing::debug!(job_id = %job_id, "Execution scheduled inline");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Enqueues executions for out-of-process workers.
pub struct QueueScheduler {
    queue: Arc<dyn ExecutionQueue>,
}

impl QueueScheduler {
    pub fn new(queue: Arc<dyn ExecutionQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ExecutionScheduler for QueueScheduler {
    async fn schedule(&self, job_id: JobId) -> Result<(), CoreError> {
        if !self.queue.enqueue(job_id, Utc::now()).await? {
            return Err(CoreError::Conflict(format!(
                "execution of research job {job_id} is already queued"
            )));
        }
        tracing::debug!(job_id = %job_id, "Execution enqueued");
        Ok(())
    }
}
