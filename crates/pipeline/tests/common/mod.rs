//! Shared fixtures for pipeline integration tests: an in-memory store,
//! scripted collaborators, and polling helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use inquiry_core::collaborators::{
    Analysis, AnalysisError, Analyzer, DataFetcher, FetchError, RankedArticle, SourceRecord,
};
use inquiry_core::research::{JobSummary, ResearchJob};
use inquiry_core::types::{JobId, Timestamp};
use inquiry_db::{JobStore, SqliteJobStore, StoreError};
use inquiry_pipeline::{PipelineConfig, StepExecutor, StepRetryPolicy};
use tokio::sync::Notify;

pub async fn store() -> Arc<SqliteJobStore> {
    Arc::new(SqliteJobStore::in_memory().await.unwrap())
}

/// Short limits so timeout tests finish quickly.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        hard_timeout: Duration::from_secs(5),
        soft_timeout: Duration::from_secs(4),
        retry: StepRetryPolicy::NONE,
        ..PipelineConfig::default()
    }
}

pub fn record(topic: &str, n: usize) -> SourceRecord {
    SourceRecord {
        title: format!("{topic} article {n}"),
        url: format!("https://example.org/{}/{n}", topic.replace(' ', "-").to_lowercase()),
        snippet: format!("An overview of {topic}."),
        source: "Wikipedia".to_string(),
        relevance_score: 0.9 - n as f64 * 0.1,
    }
}

/// Build a pending job in `store`.
pub async fn pending_job(store: &dyn JobStore, topic: &str) -> ResearchJob {
    let job = ResearchJob::new(topic, Utc::now());
    store.create(&job).await.unwrap();
    job
}

pub fn executor(
    store: Arc<dyn JobStore>,
    fetcher: impl DataFetcher + 'static,
    analyzer: impl Analyzer + 'static,
    config: PipelineConfig,
) -> StepExecutor {
    StepExecutor::new(store, Arc::new(fetcher), Arc::new(analyzer), config)
}

/// Poll until the job reaches a terminal status.
pub async fn wait_for_terminal(store: &dyn JobStore, id: JobId) -> ResearchJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = store.get(id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} still {} after 10s",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Fetchers
// ---------------------------------------------------------------------------

/// Returns `count` records derived from the topic.
pub struct StaticFetcher {
    pub count: usize,
}

#[async_trait]
impl DataFetcher for StaticFetcher {
    async fn fetch(&self, topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        Ok((0..self.count).map(|n| record(topic, n)).collect())
    }
}

/// Always fails with the given message.
pub struct FailingFetcher(pub &'static str);

#[async_trait]
impl DataFetcher for FailingFetcher {
    async fn fetch(&self, _topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        Err(FetchError::new(self.0))
    }
}

/// Sleeps before answering.
pub struct SlowFetcher(pub Duration);

#[async_trait]
impl DataFetcher for SlowFetcher {
    async fn fetch(&self, topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        tokio::time::sleep(self.0).await;
        Ok(vec![record(topic, 0)])
    }
}

/// Signals `entered` once called, then parks until `release` is notified.
#[derive(Default)]
pub struct GatedFetcher {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl DataFetcher for GatedFetcher {
    async fn fetch(&self, topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![record(topic, 0), record(topic, 1)])
    }
}

/// Fails the first `failures` calls, then succeeds.
pub struct FlakyFetcher {
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyFetcher {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataFetcher for FlakyFetcher {
    async fn fetch(&self, topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(FetchError::new("connection reset"));
        }
        Ok(vec![record(topic, 0), record(topic, 1)])
    }
}

// ---------------------------------------------------------------------------
// Analyzers
// ---------------------------------------------------------------------------

/// Returns fixed key terms and ranks the input in order.
pub struct ScriptedAnalyzer {
    pub key_terms: Vec<&'static str>,
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, sources: &[SourceRecord]) -> Result<Analysis, AnalysisError> {
        Ok(Analysis {
            summary: format!("Summary of {} articles.", sources.len()),
            key_terms: self.key_terms.iter().map(|t| t.to_string()).collect(),
            ranked_articles: sources
                .iter()
                .enumerate()
                .map(|(i, s)| RankedArticle {
                    rank: i as u32 + 1,
                    title: s.title.clone(),
                    url: s.url.clone(),
                    source: s.source.clone(),
                    relevance_score: s.relevance_score,
                    summary: s.snippet.clone(),
                    keywords: Vec::new(),
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Delegating store that stalls one chosen `update` call.
pub struct StallingStore {
    pub inner: Arc<SqliteJobStore>,
    /// Zero-based index of the update call to stall.
    pub stall_on: usize,
    pub stall_for: Duration,
    pub updates: AtomicUsize,
}

#[async_trait]
impl JobStore for StallingStore {
    async fn create(&self, job: &ResearchJob) -> Result<(), StoreError> {
        self.inner.create(job).await
    }

    async fn update(&self, job: &ResearchJob) -> Result<(), StoreError> {
        if self.updates.fetch_add(1, Ordering::SeqCst) == self.stall_on {
            tokio::time::sleep(self.stall_for).await;
        }
        self.inner.update(job).await
    }

    async fn get(&self, id: JobId) -> Result<ResearchJob, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<JobSummary>, StoreError> {
        self.inner.list().await
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        self.inner.delete_all().await
    }

    async fn mark_started(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        self.inner.mark_started(id, at).await
    }

    async fn list_stale(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError> {
        self.inner.list_stale(cutoff).await
    }

    async fn list_orphaned(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError> {
        self.inner.list_orphaned(cutoff).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}
