//! Facade wiring the dispatcher, reporter, and store together for the
//! outer layers (HTTP handlers, CLI tools).

use std::sync::Arc;

use inquiry_core::collaborators::{Analyzer, DataFetcher};
use inquiry_core::error::CoreError;
use inquiry_core::progress::StatusSnapshot;
use inquiry_core::research::{JobSummary, ResearchJob};
use inquiry_core::types::JobId;
use inquiry_db::{ExecutionQueue, JobStore};

use crate::config::{ExecutionMode, PipelineConfig};
use crate::dispatcher::JobDispatcher;
use crate::executor::StepExecutor;
use crate::scheduler::{ExecutionScheduler, InlineScheduler, QueueScheduler};
use crate::status::StatusReporter;

/// Every research operation the system exposes.
#[derive(Clone)]
pub struct ResearchService {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<JobDispatcher>,
    reporter: Arc<StatusReporter>,
    inline: Option<Arc<InlineScheduler>>,
}

impl ResearchService {
    /// Build the service with the scheduling strategy selected by
    /// `config.execution_mode`.
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn ExecutionQueue>,
        fetcher: Arc<dyn DataFetcher>,
        analyzer: Arc<dyn Analyzer>,
        config: PipelineConfig,
    ) -> Self {
        let max_topic_length = config.max_topic_length;
        match config.execution_mode {
            ExecutionMode::Inline => {
                let executor = Arc::new(StepExecutor::new(
                    Arc::clone(&store),
                    fetcher,
                    analyzer,
                    config,
                ));
                let inline = Arc::new(InlineScheduler::new(executor));
                let scheduler: Arc<dyn ExecutionScheduler> = inline.clone();
                let mut service = Self::with_scheduler(store, scheduler, max_topic_length);
                service.inline = Some(inline);
                service
            }
            ExecutionMode::Queue => Self::with_scheduler(
                store,
                Arc::new(QueueScheduler::new(queue)),
                max_topic_length,
            ),
        }
    }

    /// Build the service around an explicit scheduler.
    pub fn with_scheduler(
        store: Arc<dyn JobStore>,
        scheduler: Arc<dyn ExecutionScheduler>,
        max_topic_length: usize,
    ) -> Self {
        Self {
            dispatcher: Arc::new(JobDispatcher::new(
                Arc::clone(&store),
                scheduler,
                max_topic_length,
            )),
            reporter: Arc::new(StatusReporter::new(Arc::clone(&store))),
            store,
            inline: None,
        }
    }

    pub async fn submit_job(&self, topic: &str) -> Result<JobId, CoreError> {
        self.dispatcher.submit(topic).await
    }

    pub async fn get_status(&self, id: JobId) -> Result<StatusSnapshot, CoreError> {
        self.reporter.get_status(id).await
    }

    pub async fn get_job(&self, id: JobId) -> Result<ResearchJob, CoreError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, CoreError> {
        Ok(self.store.list().await?)
    }

    /// Remove a job record. A running execution for it fails on its next
    /// write and stops.
    pub async fn delete_job(&self, id: JobId) -> Result<(), CoreError> {
        self.store.delete(id).await?;
        tracing::info!(job_id = %id, "Research job deleted");
        Ok(())
    }

    pub async fn delete_all_jobs(&self) -> Result<u64, CoreError> {
        let deleted = self.store.delete_all().await?;
        tracing::info!(deleted, "All research jobs deleted");
        Ok(deleted)
    }

    /// Whether the backing store answers queries.
    pub async fn store_healthy(&self) -> bool {
        match self.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Job store health check failed");
                false
            }
        }
    }

    /// The shared store handle, for background tasks such as the sweep.
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Wait for inline executions to finish. A no-op in queue mode.
    pub async fn shutdown(&self) {
        if let Some(inline) = &self.inline {
            inline.shutdown().await;
        }
    }
}
