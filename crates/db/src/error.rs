use inquiry_core::error::CoreError;
use inquiry_core::types::JobId;

/// Errors from the job record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Research job {0} not found")]
    NotFound(JobId),

    /// A write would move a job backwards or duplicate an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A persisted value could not be mapped back onto the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Unsupported database URL '{0}' (expected sqlite: or postgres://)")]
    UnsupportedUrl(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Classify a sqlx error, turning unique violations into conflicts.
    pub(crate) fn from_write(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(what())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::job_not_found(id),
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::Store(other.to_string()),
        }
    }
}
