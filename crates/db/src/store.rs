//! Storage contracts shared by the embedded and client/server backends.

use async_trait::async_trait;
use inquiry_core::research::{JobSummary, ResearchJob};
use inquiry_core::types::{JobId, Timestamp};
use serde::Serialize;

use crate::error::StoreError;

/// Durable home of every [`ResearchJob`].
///
/// The store is the single shared mutable resource of the system. Writers
/// hand it a full working copy; the store serializes writes per job id and
/// refuses any write that would move a job's status backwards.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with [`StoreError::Conflict`] if the id exists.
    async fn create(&self, job: &ResearchJob) -> Result<(), StoreError>;

    /// Persist the working copy of a job.
    ///
    /// Step records are upserted by `(job_id, name)`, so repeating an update
    /// never duplicates a step, and finished steps are never reopened.
    async fn update(&self, job: &ResearchJob) -> Result<(), StoreError>;

    async fn get(&self, id: JobId) -> Result<ResearchJob, StoreError>;

    /// All jobs, most recently created first.
    async fn list(&self) -> Result<Vec<JobSummary>, StoreError>;

    async fn delete(&self, id: JobId) -> Result<(), StoreError>;

    /// Delete every job. Returns the number of jobs removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;

    /// Atomically move a job from `PENDING` to `IN_PROGRESS`.
    ///
    /// Returns `false` when the job exists but is no longer pending, which
    /// tells a duplicate execution to stand down.
    async fn mark_started(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError>;

    /// Ids of `IN_PROGRESS` jobs not updated since `cutoff`, oldest first.
    async fn list_stale(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError>;

    /// Ids of `PENDING` jobs not updated since `cutoff` that no queue entry
    /// is still waiting to run, oldest first.
    ///
    /// These jobs lost their execution before it started: the process died
    /// between submit and start, or the worker that claimed them went away.
    async fn list_orphaned(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError>;

    /// Verify the backing database answers queries.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// An entry in the execution queue.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct QueuedExecution {
    pub id: i64,
    pub job_id: JobId,
    pub enqueued_at: Timestamp,
}

/// Durable queue of pending executions, consumed by worker processes.
#[async_trait]
pub trait ExecutionQueue: Send + Sync {
    /// Queue one execution for `job_id`. Returns `false` if one was
    /// already queued; each job is queued at most once.
    async fn enqueue(&self, job_id: JobId, at: Timestamp) -> Result<bool, StoreError>;

    /// Claim the oldest unclaimed entry for `worker`.
    ///
    /// Claims are exclusive: concurrent callers never receive the same entry.
    async fn claim_next(
        &self,
        worker: &str,
        at: Timestamp,
    ) -> Result<Option<QueuedExecution>, StoreError>;

    /// Record that the claimed entry has finished executing.
    async fn finish(&self, entry_id: i64, at: Timestamp) -> Result<(), StoreError>;

    /// Return claims taken before `cutoff` to the queue when their job never
    /// started. Returns the number of entries released.
    async fn release_stale_claims(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Number of entries not yet claimed.
    async fn pending_count(&self) -> Result<i64, StoreError>;
}
