//! Contracts for the external collaborators the pipeline calls.
//!
//! [`DataFetcher`] backs the `data_gathering` step and [`Analyzer`] backs
//! `processing`. Concrete HTTP adapters live in the `sources` crate; tests
//! substitute scripted implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A raw article returned by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Data source label, e.g. `"Wikipedia"`.
    pub source: String,
    /// Adapter-assigned relevance in `[0, 1]`, used for ranking.
    #[serde(default)]
    pub relevance_score: f64,
}

/// An article selected and summarized by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    /// One-based rank.
    pub rank: u32,
    pub title: String,
    pub url: String,
    pub source: String,
    pub relevance_score: f64,
    pub summary: String,
    pub keywords: Vec<String>,
}

/// Output of [`Analyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    /// Key terms, most significant first.
    pub key_terms: Vec<String>,
    pub ranked_articles: Vec<RankedArticle>,
}

/// A data source could not be queried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The analyzer rejected or failed to process its input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AnalysisError {
    pub message: String,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fetches raw source records for a topic.
///
/// Failures are transient from the caller's point of view; the pipeline
/// turns them into a failed `data_gathering` step.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, topic: &str, queries: &[String]) -> Result<Vec<SourceRecord>, FetchError>;
}

/// Summarizes and ranks source records.
///
/// Implementations must be deterministic for a given input.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, sources: &[SourceRecord]) -> Result<Analysis, AnalysisError>;
}
