//! Reconciliation sweep: recover jobs whose execution was lost.
//!
//! Each pass, in order:
//! 1. Queue claims older than the cutoff whose job is still `PENDING` go
//!    back to the queue. The claiming worker died before starting the job,
//!    so no step has run and another worker may pick it up.
//! 2. `PENDING` jobs older than the cutoff with nothing left to run them
//!    are failed.
//! 3. `IN_PROGRESS` jobs with no update since the cutoff are failed. They
//!    are never resumed; step logic is not idempotent, so the user submits
//!    again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use inquiry_core::research::JobStatus;
use inquiry_core::types::JobId;
use inquiry_db::{ExecutionQueue, JobStore, StoreError};
use tokio_util::sync::CancellationToken;

/// Fail `job_id` with `cause` if it has not finished.
///
/// A `PENDING` job is first moved to `IN_PROGRESS` through the same
/// compare-and-set an execution uses, so no execution can start it
/// afterwards. Returns `false` when an execution started it first, or when
/// the job already reached a terminal state.
pub async fn abandon_job(
    store: &dyn JobStore,
    job_id: JobId,
    cause: &str,
) -> Result<bool, StoreError> {
    let mut job = store.get(job_id).await?;
    if job.status == JobStatus::Pending {
        if !store.mark_started(job_id, Utc::now()).await? {
            return Ok(false);
        }
        job = store.get(job_id).await?;
    }
    if job.abandon(cause, Utc::now()).is_err() {
        return Ok(false);
    }
    match store.update(&job).await {
        Ok(()) => Ok(true),
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Queue claims returned to the queue.
    pub requeued: u64,
    /// `PENDING` jobs failed because nothing would ever run them.
    pub orphaned: usize,
    /// `IN_PROGRESS` jobs failed for lack of progress.
    pub stale: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Run one sweep pass over jobs idle for longer than `stale_after`.
pub async fn sweep_stale_jobs(
    store: &dyn JobStore,
    queue: &dyn ExecutionQueue,
    stale_after: Duration,
) -> Result<SweepReport, StoreError> {
    let Some(cutoff) = TimeDelta::from_std(stale_after)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age))
    else {
        return Ok(SweepReport::default());
    };
    let secs = stale_after.as_secs();

    let requeued = queue.release_stale_claims(cutoff).await?;
    if requeued > 0 {
        tracing::warn!(requeued, "Released queue claims of workers that never started");
    }

    let cause = format!("abandoned: not started within {secs} seconds");
    let orphaned = abandon_all(store, store.list_orphaned(cutoff).await?, &cause).await?;

    let cause = format!("abandoned: no progress for {secs} seconds");
    let stale = abandon_all(store, store.list_stale(cutoff).await?, &cause).await?;

    Ok(SweepReport {
        requeued,
        orphaned,
        stale,
    })
}

async fn abandon_all(
    store: &dyn JobStore,
    ids: Vec<JobId>,
    cause: &str,
) -> Result<usize, StoreError> {
    let mut failed = 0;
    for job_id in ids {
        match abandon_job(store, job_id, cause).await {
            Ok(true) => {
                tracing::warn!(job_id = %job_id, %cause, "Research job abandoned");
                failed += 1;
            }
            Ok(false) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(failed)
}

/// Run the sweep every `interval` until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn JobStore>,
    queue: Arc<dyn ExecutionQueue>,
    stale_after: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        stale_after_secs = stale_after.as_secs(),
        interval_secs = interval.as_secs(),
        "Reconciliation sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconciliation sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_stale_jobs(store.as_ref(), queue.as_ref(), stale_after).await {
                    Ok(report) if report.is_empty() => {
                        tracing::debug!("Reconciliation sweep: nothing to recover")
                    }
                    Ok(report) => tracing::info!(
                        requeued = report.requeued,
                        orphaned = report.orphaned,
                        stale = report.stale,
                        "Reconciliation sweep: recovered jobs",
                    ),
                    Err(e) => tracing::error!(error = %e, "Reconciliation sweep failed"),
                }
            }
        }
    }
}
