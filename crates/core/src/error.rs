use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The job record store could not be reached or rejected the operation.
    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing research job.
    pub fn job_not_found(id: JobId) -> Self {
        Self::NotFound {
            entity: "ResearchJob",
            id,
        }
    }
}
