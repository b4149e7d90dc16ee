//! Row types for the `research_jobs` and `research_steps` tables.
//!
//! The same row structs decode from both backends; conversion onto the
//! domain types in `inquiry_core::research` happens here.

use inquiry_core::research::{JobSummary, ResearchJob, StepRecord};
use inquiry_core::types::{JobId, Timestamp};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use crate::error::StoreError;

/// Column list for `research_jobs` queries.
pub const JOB_COLUMNS: &str = "\
    id, topic, status, current_step_index, total_steps, \
    result, error, created_at, updated_at";

/// Column list for job listings (no result payload).
pub const SUMMARY_COLUMNS: &str = "\
    id, topic, status, current_step_index, total_steps, \
    error, created_at, updated_at";

/// Column list for `research_steps` queries.
pub const STEP_COLUMNS: &str = "name, status, started_at, finished_at, detail, output";

/// A row from the `research_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub topic: String,
    pub status: String,
    pub current_step_index: i32,
    pub total_steps: i32,
    pub result: Option<Json<Value>>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `research_steps` table.
#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub name: String,
    pub status: String,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub detail: String,
    pub output: Option<Json<Value>>,
}

/// A listing row from `research_jobs`.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub id: JobId,
    pub topic: String,
    pub status: String,
    pub current_step_index: i32,
    pub total_steps: i32,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StepRow {
    pub fn into_record(self) -> Result<StepRecord, StoreError> {
        Ok(StepRecord {
            name: self.name.parse().map_err(StoreError::Corrupt)?,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            detail: self.detail,
            output: self.output.map(|Json(v)| v),
        })
    }
}

impl JobRow {
    pub fn into_job(self, steps: Vec<StepRow>) -> Result<ResearchJob, StoreError> {
        let steps = steps
            .into_iter()
            .map(StepRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResearchJob {
            id: self.id,
            topic: self.topic,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            current_step_index: to_count(self.current_step_index)?,
            total_steps: to_count(self.total_steps)?,
            steps,
            result: self.result.map(|Json(v)| v),
            error: self.error,
        })
    }
}

impl SummaryRow {
    pub fn into_summary(self) -> Result<JobSummary, StoreError> {
        Ok(JobSummary {
            id: self.id,
            topic: self.topic,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            current_step_index: to_count(self.current_step_index)?,
            total_steps: to_count(self.total_steps)?,
            error: self.error,
        })
    }
}

/// Convert a stored counter to `u32`.
fn to_count(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative step counter {value}")))
}

/// Convert a domain counter to the stored `INTEGER` width.
pub fn from_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
