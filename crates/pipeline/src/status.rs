//! Status/Progress Reporter.

use std::sync::Arc;

use inquiry_core::error::CoreError;
use inquiry_core::progress::StatusSnapshot;
use inquiry_core::types::JobId;
use inquiry_db::JobStore;

/// Read-only view over the store for polling clients.
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Snapshot of the job's latest persisted state.
    pub async fn get_status(&self, job_id: JobId) -> Result<StatusSnapshot, CoreError> {
        let job = self.store.get(job_id).await?;
        Ok(StatusSnapshot::from_job(&job))
    }
}
