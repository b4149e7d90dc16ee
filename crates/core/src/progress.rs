//! Status snapshots for polling clients.
//!
//! A [`StatusSnapshot`] is derived purely from a [`ResearchJob`], so every
//! reader of the same persisted record sees the same message and counters.

use serde::{Deserialize, Serialize};

use crate::research::{JobStatus, ResearchJob, StepStatus};
use crate::types::JobId;

/// `current` of `total` steps completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

/// Normalized status view returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub research_id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub progress: Progress,
}

impl StatusSnapshot {
    pub fn from_job(job: &ResearchJob) -> Self {
        Self {
            research_id: job.id,
            status: job.status,
            message: status_message(job),
            progress: Progress {
                current: job.current_step_index,
                total: job.total_steps,
            },
        }
    }
}

/// Human-readable message for the job's latest state.
///
/// Failed jobs report their stored error; otherwise the message describes
/// the most recent step record.
pub fn status_message(job: &ResearchJob) -> String {
    if job.status == JobStatus::Failed {
        return job
            .error
            .clone()
            .unwrap_or_else(|| "research failed".to_string());
    }

    match job.current_step() {
        None if job.status == JobStatus::Pending => "waiting to start".to_string(),
        None => "starting research workflow".to_string(),
        Some(step) => match step.status {
            StepStatus::Started => format!("running step {}: {}", step.name.number(), step.name),
            StepStatus::Succeeded => {
                format!("completed step {}: {}", step.name.number(), step.name)
            }
            StepStatus::Failed => step.detail.clone(),
        },
    }
}
