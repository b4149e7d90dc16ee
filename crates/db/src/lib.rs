//! Durable storage for research jobs.
//!
//! Two interchangeable backends implement [`JobStore`] and
//! [`ExecutionQueue`]: an embedded single-file SQLite store and a
//! client/server PostgreSQL store. [`connect`] picks one from the URL scheme.

use std::sync::Arc;

pub mod error;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use postgres::PgJobStore;
pub use sqlite::SqliteJobStore;
pub use store::{ExecutionQueue, JobStore, QueuedExecution};

/// Default pool size for file and client/server backends.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// A connected backend, exposed through both storage contracts.
#[derive(Clone)]
pub struct Backend {
    pub jobs: Arc<dyn JobStore>,
    pub queue: Arc<dyn ExecutionQueue>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    fn from_store<S>(store: S) -> Self
    where
        S: JobStore + ExecutionQueue + 'static,
    {
        let store = Arc::new(store);
        Self {
            jobs: store.clone(),
            queue: store,
        }
    }
}

/// Connect to `database_url`, run pending migrations, and return the backend.
///
/// `sqlite:` URLs select the embedded store, `postgres://` and
/// `postgresql://` the client/server store.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Backend, StoreError> {
    if database_url.starts_with("sqlite:") {
        let store = SqliteJobStore::connect(database_url, max_connections).await?;
        store.run_migrations().await?;
        tracing::info!(backend = "sqlite", "Job store connected");
        Ok(Backend::from_store(store))
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        let store = PgJobStore::connect(database_url, max_connections).await?;
        store.run_migrations().await?;
        tracing::info!(backend = "postgres", "Job store connected");
        Ok(Backend::from_store(store))
    } else {
        Err(StoreError::UnsupportedUrl(database_url.to_string()))
    }
}
