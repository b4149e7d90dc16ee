use std::time::Duration;

use inquiry_core::collaborators::{AnalysisError, FetchError};
use inquiry_core::error::CoreError;
use inquiry_core::research::StepName;
use inquiry_db::StoreError;

/// Why a single pipeline step failed. The display text becomes the step's
/// `detail` and the job's `error`.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Local validation or transformation failed.
    #[error("{0}")]
    Invalid(String),

    #[error("missing output from {0}")]
    MissingInput(StepName),

    #[error("data fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("pipeline exceeded soft time limit of {} during {step}", format_limit(.limit))]
    Timeout { step: StepName, limit: Duration },

    #[error("could not encode step output: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StepError {
    /// Collaborator failures may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Analysis(_))
    }
}

/// An execution that could not record its outcome.
///
/// Step failures never surface here; they become a `FAILED` job. These
/// errors mean the store rejected or lost a write, leaving the job for the
/// reconciliation sweep.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] CoreError),
}

/// Render a time limit as whole seconds, or milliseconds below a second.
pub fn format_limit(limit: &Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_keeps_cause() {
        let err = StepError::from(FetchError::new("network down"));
        assert_eq!(err.to_string(), "data fetch failed: network down");
        assert!(err.is_transient());
    }

    #[test]
    fn timeout_names_step_and_limit() {
        let err = StepError::Timeout {
            step: StepName::DataGathering,
            limit: Duration::from_secs(240),
        };
        assert_eq!(
            err.to_string(),
            "pipeline exceeded soft time limit of 240s during data_gathering"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn sub_second_limits_render_in_millis() {
        assert_eq!(format_limit(&Duration::from_millis(150)), "150ms");
    }
}
