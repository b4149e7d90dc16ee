//! Job Dispatcher: validates a submission, creates the job record, and
//! schedules its single execution.

use std::sync::Arc;

use chrono::Utc;
use inquiry_core::error::CoreError;
use inquiry_core::research::ResearchJob;
use inquiry_core::types::JobId;
use inquiry_db::JobStore;

use crate::scheduler::ExecutionScheduler;

pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    scheduler: Arc<dyn ExecutionScheduler>,
    max_topic_length: usize,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        scheduler: Arc<dyn ExecutionScheduler>,
        max_topic_length: usize,
    ) -> Self {
        Self {
            store,
            scheduler,
            max_topic_length,
        }
    }

    /// Create a `PENDING` job for `topic` and schedule its execution.
    ///
    /// Returns as soon as the execution is scheduled. Invalid topics fail
    /// with [`CoreError::Validation`] before anything is written. If
    /// scheduling fails the new record is removed again, so every job in
    /// the store has exactly one scheduled execution.
    pub async fn submit(&self, topic: &str) -> Result<JobId, CoreError> {
        let topic = validate_topic(topic, self.max_topic_length)?;
        let job = ResearchJob::new(topic, Utc::now());
        self.store.create(&job).await?;

        if let Err(e) = self.scheduler.schedule(job.id).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to schedule execution");
            if let Err(cleanup) = self.store.delete(job.id).await {
                tracing::error!(
                    job_id = %job.id,
                    error = %cleanup,
                    "Failed to remove unscheduled job",
                );
            }
            return Err(e);
        }

        tracing::info!(job_id = %job.id, topic = %job.topic, "Research job submitted");
        Ok(job.id)
    }
}

/// Trim `topic` and check it is non-empty and within `max_length` characters.
pub fn validate_topic(topic: &str, max_length: usize) -> Result<String, CoreError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("topic must not be empty".into()));
    }
    let length = trimmed.chars().count();
    if length > max_length {
        return Err(CoreError::Validation(format!(
            "topic must be at most {max_length} characters (got {length})"
        )));
    }
    Ok(trimmed.to_string())
}
