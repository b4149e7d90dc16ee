//! Step Executor: drives one research job through the five pipeline steps.
//!
//! Lifecycle of one execution:
//! 1. Load the job and win the `PENDING -> IN_PROGRESS` compare-and-set.
//!    A loser (duplicate schedule, redelivered queue entry) stands down.
//! 2. For each step in order: persist a `STARTED` record, run the step
//!    under the soft deadline (retrying transient collaborator errors per
//!    the retry policy), then persist `SUCCEEDED` with its output or
//!    `FAILED` with the cause.
//! 3. The last step's success and the `COMPLETED` transition with the
//!    assembled result are written together.
//!
//! The whole execution runs under the hard timeout; on expiry the job is
//! failed from the outside.

use std::sync::Arc;

use chrono::Utc;
use inquiry_core::collaborators::{Analysis, Analyzer, DataFetcher};
use inquiry_core::research::{JobStatus, ResearchJob, StepName};
use inquiry_core::types::JobId;
use inquiry_db::JobStore;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::PipelineConfig;
use crate::error::{format_limit, ExecutionError, StepError};
use crate::reconcile;
use crate::steps::{
    self, FrontendView, GatheredSources, ParsedTopic, PersistenceRecord, ResearchResult,
};

/// How an execution ended, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// Another execution owns the job, or it was no longer pending.
    Skipped,
}

// ---------------------------------------------------------------------------
// Step products
// ---------------------------------------------------------------------------

/// Typed output of one step, before it is recorded.
#[derive(Debug)]
enum StepProduct {
    Parsed(ParsedTopic),
    Gathered(GatheredSources),
    Analyzed(Analysis),
    Persisted(PersistenceRecord),
    Prepared(FrontendView),
}

impl StepProduct {
    fn detail(&self) -> String {
        match self {
            Self::Parsed(p) => format!(
                "validated topic '{}' ({} chars), {} search queries",
                p.validated_topic,
                p.topic_length,
                p.queries.len()
            ),
            Self::Gathered(g) => format!(
                "gathered {} source records from {} sources",
                g.total_sources,
                g.by_source.len()
            ),
            Self::Analyzed(a) => format!(
                "analyzed {} articles, extracted {} key terms",
                a.ranked_articles.len(),
                a.key_terms.len()
            ),
            Self::Persisted(p) => format!(
                "recorded {} articles and {} key terms ({})",
                p.articles_processed, p.key_terms_count, p.workflow_version
            ),
            Self::Prepared(v) => format!("prepared {} article cards", v.cards.len()),
        }
    }
}

/// Outputs accumulated over one execution.
#[derive(Debug)]
struct PipelineState {
    topic: String,
    parsed: Option<ParsedTopic>,
    gathered: Option<GatheredSources>,
    analysis: Option<Analysis>,
}

impl PipelineState {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            parsed: None,
            gathered: None,
            analysis: None,
        }
    }

    fn parsed(&self) -> Result<&ParsedTopic, StepError> {
        self.parsed
            .as_ref()
            .ok_or(StepError::MissingInput(StepName::InputParsing))
    }

    fn gathered(&self) -> Result<&GatheredSources, StepError> {
        self.gathered
            .as_ref()
            .ok_or(StepError::MissingInput(StepName::DataGathering))
    }

    fn analysis(&self) -> Result<&Analysis, StepError> {
        self.analysis
            .as_ref()
            .ok_or(StepError::MissingInput(StepName::Processing))
    }

    /// Keep the product for later steps and return its serialized output.
    fn record(&mut self, product: StepProduct) -> Result<serde_json::Value, StepError> {
        let output = match product {
            StepProduct::Parsed(p) => {
                let output = to_output(&p)?;
                self.parsed = Some(p);
                output
            }
            StepProduct::Gathered(g) => {
                let output = to_output(&g)?;
                self.gathered = Some(g);
                output
            }
            StepProduct::Analyzed(a) => {
                let output = to_output(&a)?;
                self.analysis = Some(a);
                output
            }
            StepProduct::Persisted(p) => to_output(&p)?,
            StepProduct::Prepared(v) => to_output(&v)?,
        };
        Ok(output)
    }

    fn result(&self) -> Result<ResearchResult, StepError> {
        Ok(steps::assemble_result(
            self.parsed()?,
            self.gathered()?,
            self.analysis()?,
        ))
    }
}

fn to_output(value: &impl Serialize) -> Result<serde_json::Value, StepError> {
    Ok(serde_json::to_value(value)?)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs the research pipeline for one job at a time.
///
/// Holds no per-job state between calls; one executor is shared by every
/// execution in the process.
pub struct StepExecutor {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn DataFetcher>,
    analyzer: Arc<dyn Analyzer>,
    config: PipelineConfig,
}

impl StepExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn DataFetcher>,
        analyzer: Arc<dyn Analyzer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            analyzer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for `job_id` to completion or failure.
    ///
    /// Outcomes are observable only through the persisted job. Store
    /// failures are logged; the job is then left for the reconciliation
    /// sweep.
    pub async fn execute(&self, job_id: JobId) {
        let _ = self.execute_with_outcome(job_id).await;
    }

    /// [`execute`](Self::execute), reporting how the run ended.
    pub async fn execute_with_outcome(&self, job_id: JobId) -> Option<RunOutcome> {
        let hard = self.config.hard_timeout;
        match tokio::time::timeout(hard, self.run(job_id)).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(e)) => {
                tracing::error!(
                    job_id = %job_id,
                    error = %e,
                    "Pipeline execution aborted; job left for reconciliation",
                );
                None
            }
            Err(_) => {
                let cause = format!("pipeline exceeded hard time limit of {}", format_limit(&hard));
                tracing::warn!(job_id = %job_id, %cause, "Pipeline hit hard timeout");
                match reconcile::abandon_job(self.store.as_ref(), job_id, &cause).await {
                    Ok(true) => Some(RunOutcome::Failed),
                    Ok(false) => Some(RunOutcome::Skipped),
                    Err(e) => {
                        tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            "Failed to record hard timeout",
                        );
                        None
                    }
                }
            }
        }
    }

    async fn run(&self, job_id: JobId) -> Result<RunOutcome, ExecutionError> {
        let mut job = self.store.get(job_id).await?;
        if job.status != JobStatus::Pending {
            tracing::warn!(job_id = %job_id, status = %job.status, "Job is not pending; skipping");
            return Ok(RunOutcome::Skipped);
        }

        let started_at = Utc::now();
        if !self.store.mark_started(job_id, started_at).await? {
            tracing::warn!(job_id = %job_id, "Job claimed by another execution; skipping");
            return Ok(RunOutcome::Skipped);
        }
        job.start(started_at)?;
        tracing::info!(job_id = %job_id, topic = %job.topic, "Research job started");

        let deadline = Instant::now() + self.config.soft_timeout;
        let mut state = PipelineState::new(&job.topic);

        for name in StepName::ALL {
            job.begin_step(name, Utc::now())?;
            self.store.update(&job).await?;
            tracing::debug!(job_id = %job_id, step = %name, "Step started");

            match self.run_step_with_policy(name, &state, deadline).await {
                Ok((product, retries)) => {
                    if let Err(e) = self.record_success(&mut job, &mut state, name, product, retries) {
                        return self.record_failure(&mut job, name, e).await;
                    }
                    self.store.update(&job).await?;
                    tracing::debug!(job_id = %job_id, step = %name, retries, "Step succeeded");
                }
                Err(e) => return self.record_failure(&mut job, name, e).await,
            }
        }

        tracing::info!(job_id = %job_id, "Research job completed");
        Ok(RunOutcome::Completed)
    }

    /// Apply a successful step to the working copy. The last step also
    /// completes the job with the assembled result.
    fn record_success(
        &self,
        job: &mut ResearchJob,
        state: &mut PipelineState,
        name: StepName,
        product: StepProduct,
        retries: u32,
    ) -> Result<(), StepError> {
        let mut detail = product.detail();
        if retries > 0 {
            detail.push_str(&format!(" after {retries} retries"));
        }
        let output = state.record(product)?;
        let result = if name.is_last() {
            Some(to_output(&state.result()?)?)
        } else {
            None
        };

        let now = Utc::now();
        job.succeed_step(name, output, detail, now)
            .map_err(|e| StepError::Invalid(e.to_string()))?;
        if let Some(result) = result {
            job.complete(result, now)
                .map_err(|e| StepError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        job: &mut ResearchJob,
        name: StepName,
        error: StepError,
    ) -> Result<RunOutcome, ExecutionError> {
        let cause = error.to_string();
        job.fail_step(name, cause.as_str(), Utc::now())?;
        self.store.update(job).await?;
        tracing::warn!(job_id = %job.id, step = %name, error = %cause, "Research job failed");
        Ok(RunOutcome::Failed)
    }

    /// Run one step under the soft deadline, retrying transient failures.
    ///
    /// Returns the product and the number of retries it took.
    async fn run_step_with_policy(
        &self,
        name: StepName,
        state: &PipelineState,
        deadline: Instant,
    ) -> Result<(StepProduct, u32), StepError> {
        let timed_out = || StepError::Timeout {
            step: name,
            limit: self.config.soft_timeout,
        };
        let policy = self.config.retry;
        let mut attempt = 0;

        loop {
            if Instant::now() >= deadline {
                return Err(timed_out());
            }
            let outcome = tokio::time::timeout_at(deadline, self.run_step(name, state))
                .await
                .map_err(|_| timed_out())?;

            match outcome {
                Ok(product) => return Ok((product, attempt)),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    if Instant::now() + delay >= deadline {
                        return Err(e);
                    }
                    tracing::warn!(
                        step = %name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient step failure; retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_step(&self, name: StepName, state: &PipelineState) -> Result<StepProduct, StepError> {
        match name {
            StepName::InputParsing => Ok(StepProduct::Parsed(steps::parse_input(
                &state.topic,
                self.config.max_topic_length,
                self.config.max_search_queries,
            )?)),
            StepName::DataGathering => {
                let parsed = state.parsed()?;
                let sources = self
                    .fetcher
                    .fetch(&parsed.validated_topic, &parsed.queries)
                    .await?;
                Ok(StepProduct::Gathered(steps::summarize_sources(sources)))
            }
            StepName::Processing => {
                let gathered = state.gathered()?;
                steps::ensure_analyzable(gathered)?;
                let analysis = self.analyzer.analyze(&gathered.sources).await?;
                Ok(StepProduct::Analyzed(analysis))
            }
            StepName::Persistence => Ok(StepProduct::Persisted(steps::persistence_record(
                state.analysis()?,
            ))),
            StepName::FrontendPreparation => {
                Ok(StepProduct::Prepared(steps::frontend_view(state.analysis()?)))
            }
        }
    }
}
