//! Research job model and its state machine.
//!
//! A [`ResearchJob`] moves `Pending -> InProgress -> Completed | Failed` and
//! never goes back. Its `steps` are appended in the fixed [`StepName::ALL`]
//! order, one record per step, each record finishing exactly once. All
//! mutation goes through the methods here so the invariants hold no matter
//! which process (API server or queue worker) drives the job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_job_id, JobId, Timestamp};

/// Number of steps in the research pipeline.
pub const TOTAL_STEPS: u32 = 5;

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle status of a research job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Stable string form, used both on the wire and in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses a record may hold before being written with `self`.
    ///
    /// Includes `self`, since rewriting the same status is an idempotent
    /// update rather than a transition. Always two entries so stores can
    /// bind a fixed-size `IN (..)` list.
    pub fn allowed_predecessors(self) -> [JobStatus; 2] {
        match self {
            Self::Pending => [Self::Pending, Self::Pending],
            Self::InProgress => [Self::Pending, Self::InProgress],
            Self::Completed => [Self::InProgress, Self::Completed],
            Self::Failed => [Self::InProgress, Self::Failed],
        }
    }

    /// Whether `self -> to` is a valid forward transition.
    pub fn can_transition(self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    /// Validate a transition, returning a [`CoreError::Conflict`] for invalid ones.
    pub fn validate_transition(self, to: JobStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid transition: {self} -> {to}"
            )))
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The five fixed pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    InputParsing,
    DataGathering,
    Processing,
    Persistence,
    FrontendPreparation,
}

impl StepName {
    pub const ALL: [StepName; TOTAL_STEPS as usize] = [
        Self::InputParsing,
        Self::DataGathering,
        Self::Processing,
        Self::Persistence,
        Self::FrontendPreparation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputParsing => "input_parsing",
            Self::DataGathering => "data_gathering",
            Self::Processing => "processing",
            Self::Persistence => "persistence",
            Self::FrontendPreparation => "frontend_preparation",
        }
    }

    /// Zero-based position in the pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based step number, as shown to users.
    pub fn number(self) -> u32 {
        self.index() as u32 + 1
    }

    pub fn is_last(self) -> bool {
        self.index() + 1 == Self::ALL.len()
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown step name '{s}'"))
    }
}

/// Outcome status of a single step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Started,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(Self::Started),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown step status '{other}'")),
        }
    }
}

/// One pipeline step execution, kept for the trace/audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub detail: String,
    /// Structured payload handed to later steps and to result assembly.
    pub output: Option<serde_json::Value>,
}

impl StepRecord {
    fn started(name: StepName, now: Timestamp) -> Self {
        Self {
            name,
            status: StepStatus::Started,
            started_at: now,
            finished_at: None,
            detail: format!("running step {}: {name}", name.number()),
            output: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One end-to-end research request and its execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchJob {
    pub id: JobId,
    pub topic: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub current_step_index: u32,
    pub total_steps: u32,
    pub steps: Vec<StepRecord>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Lightweight listing row for the history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub topic: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub current_step_index: u32,
    pub total_steps: u32,
    pub error: Option<String>,
}

impl ResearchJob {
    /// Create a new pending job with a fresh id.
    pub fn new(topic: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: new_job_id(),
            topic: topic.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            current_step_index: 0,
            total_steps: TOTAL_STEPS,
            steps: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// The most recent step record, if any step has started.
    pub fn current_step(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    pub fn step(&self, name: StepName) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn succeeded_steps(&self) -> u32 {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Succeeded)
            .count() as u32
    }

    /// The step that must start next, or `None` once all have been attempted.
    pub fn next_step(&self) -> Option<StepName> {
        StepName::ALL.get(self.steps.len()).copied()
    }

    /// `Pending -> InProgress`.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::InProgress, now)
    }

    /// Append a `Started` record for `name`.
    ///
    /// The job must be in progress, `name` must be the next step in pipeline
    /// order, and every earlier step must have succeeded.
    pub fn begin_step(&mut self, name: StepName, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_in_progress()?;
        if let Some(last) = self.current_step() {
            if last.status != StepStatus::Succeeded {
                return Err(CoreError::Conflict(format!(
                    "cannot start {name}: {} is {}",
                    last.name, last.status
                )));
            }
        }
        match self.next_step() {
            Some(expected) if expected == name => {}
            Some(expected) => {
                return Err(CoreError::Conflict(format!(
                    "cannot start {name}: next step is {expected}"
                )))
            }
            None => {
                return Err(CoreError::Conflict(format!(
                    "cannot start {name}: all steps already attempted"
                )))
            }
        }

        self.steps.push(StepRecord::started(name, now));
        self.updated_at = now;
        Ok(())
    }

    /// Mark the running step `name` as succeeded with its output.
    pub fn succeed_step(
        &mut self,
        name: StepName,
        output: serde_json::Value,
        detail: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        self.ensure_in_progress()?;
        let record = self.running_step_mut(name)?;
        record.status = StepStatus::Succeeded;
        record.finished_at = Some(now);
        record.detail = detail.into();
        record.output = Some(output);

        self.current_step_index = self.succeeded_steps();
        self.updated_at = now;
        Ok(())
    }

    /// Mark the running step `name` as failed and fail the job with `cause`.
    pub fn fail_step(
        &mut self,
        name: StepName,
        cause: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        self.ensure_in_progress()?;
        let cause = cause.into();
        let record = self.running_step_mut(name)?;
        record.status = StepStatus::Failed;
        record.finished_at = Some(now);
        record.detail = cause.clone();

        self.error = Some(cause);
        self.transition(JobStatus::Failed, now)
    }

    /// `InProgress -> Completed`, attaching the final result.
    ///
    /// Requires every step to have succeeded.
    pub fn complete(&mut self, result: serde_json::Value, now: Timestamp) -> Result<(), CoreError> {
        let all_succeeded = self.steps.len() == StepName::ALL.len()
            && self.succeeded_steps() == TOTAL_STEPS;
        if !all_succeeded {
            return Err(CoreError::Conflict(format!(
                "cannot complete job {}: only {} of {TOTAL_STEPS} steps succeeded",
                self.id,
                self.succeeded_steps()
            )));
        }
        self.transition(JobStatus::Completed, now)?;
        self.result = Some(result);
        self.current_step_index = TOTAL_STEPS;
        Ok(())
    }

    /// Fail an in-progress job from outside the step loop (timeouts, sweeps).
    ///
    /// The running step is marked failed; when the job sits between steps
    /// the next step is recorded as failed at `now`, so a failed job always
    /// ends in exactly one failed step.
    pub fn abandon(&mut self, cause: impl Into<String>, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_in_progress()?;
        let cause = cause.into();

        let running = self
            .current_step()
            .filter(|s| s.status == StepStatus::Started)
            .map(|s| s.name);

        let name = match running {
            Some(name) => name,
            None => {
                let next = self.next_step().ok_or_else(|| {
                    CoreError::Conflict(format!(
                        "job {} has no step left to fail",
                        self.id
                    ))
                })?;
                self.begin_step(next, now)?;
                next
            }
        };

        self.fail_step(name, cause, now)
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            topic: self.topic.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            current_step_index: self.current_step_index,
            total_steps: self.total_steps,
            error: self.error.clone(),
        }
    }

    fn transition(&mut self, to: JobStatus, now: Timestamp) -> Result<(), CoreError> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), CoreError> {
        if self.status == JobStatus::InProgress {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "job {} is {}, not IN_PROGRESS",
                self.id, self.status
            )))
        }
    }

    fn running_step_mut(&mut self, name: StepName) -> Result<&mut StepRecord, CoreError> {
        match self.steps.last_mut() {
            Some(record) if record.name == name && record.status == StepStatus::Started => {
                Ok(record)
            }
            _ => Err(CoreError::Conflict(format!("step {name} is not running"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
