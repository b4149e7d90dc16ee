//! Per-step logic and the typed outputs passed between steps.
//!
//! `input_parsing`, `persistence` and `frontend_preparation` are pure
//! transformations defined here. `data_gathering` and `processing` call the
//! external collaborators from the executor and hand their results to
//! [`summarize_sources`] and [`ensure_analyzable`].

use std::collections::BTreeMap;

use inquiry_core::collaborators::{Analysis, RankedArticle, SourceRecord};
use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Identifies the step layout that produced a result.
pub const WORKFLOW_VERSION: &str = "5-step-v1";

/// Search terms at or below this length are not used as extra queries.
const MIN_QUERY_TERM_LEN: usize = 3;

// ---------------------------------------------------------------------------
// input_parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTopic {
    pub validated_topic: String,
    pub topic_length: usize,
    /// Search queries for the data fetcher, the full topic first.
    pub queries: Vec<String>,
}

/// Normalize the topic and derive up to `max_queries` search queries.
pub fn parse_input(
    topic: &str,
    max_topic_length: usize,
    max_queries: usize,
) -> Result<ParsedTopic, StepError> {
    let normalized = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(StepError::Invalid("topic must not be empty".into()));
    }
    let topic_length = normalized.chars().count();
    if topic_length > max_topic_length {
        return Err(StepError::Invalid(format!(
            "topic is {topic_length} characters, limit is {max_topic_length}"
        )));
    }

    let mut queries = vec![normalized.clone()];
    for term in normalized.split(' ') {
        if queries.len() >= max_queries {
            break;
        }
        let term = term
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if term.chars().count() > MIN_QUERY_TERM_LEN
            && !queries.iter().any(|q| q.eq_ignore_ascii_case(&term))
        {
            queries.push(term);
        }
    }
    queries.truncate(max_queries.max(1));

    Ok(ParsedTopic {
        validated_topic: normalized,
        topic_length,
        queries,
    })
}

// ---------------------------------------------------------------------------
// data_gathering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatheredSources {
    pub total_sources: usize,
    /// Record count per source label.
    pub by_source: BTreeMap<String, usize>,
    pub sources: Vec<SourceRecord>,
}

pub fn summarize_sources(sources: Vec<SourceRecord>) -> GatheredSources {
    let mut by_source = BTreeMap::new();
    for record in &sources {
        *by_source.entry(record.source.clone()).or_insert(0) += 1;
    }
    GatheredSources {
        total_sources: sources.len(),
        by_source,
        sources,
    }
}

// ---------------------------------------------------------------------------
// processing
// ---------------------------------------------------------------------------

/// Refuse to analyze an empty gathering result.
pub fn ensure_analyzable(gathered: &GatheredSources) -> Result<(), StepError> {
    if gathered.sources.is_empty() {
        return Err(StepError::Invalid("no source records to analyze".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceRecord {
    pub articles_processed: usize,
    pub key_terms_count: usize,
    pub workflow_version: String,
}

pub fn persistence_record(analysis: &Analysis) -> PersistenceRecord {
    PersistenceRecord {
        articles_processed: analysis.ranked_articles.len(),
        key_terms_count: analysis.key_terms.len(),
        workflow_version: WORKFLOW_VERSION.to_string(),
    }
}

// ---------------------------------------------------------------------------
// frontend_preparation
// ---------------------------------------------------------------------------

/// Display-ready article card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleCard {
    pub rank: u32,
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendView {
    pub cards: Vec<ArticleCard>,
    pub key_terms: Vec<String>,
}

pub fn frontend_view(analysis: &Analysis) -> FrontendView {
    FrontendView {
        cards: analysis.ranked_articles.iter().map(card).collect(),
        key_terms: analysis.key_terms.clone(),
    }
}

fn card(article: &RankedArticle) -> ArticleCard {
    ArticleCard {
        rank: article.rank,
        title: article.title.clone(),
        url: article.url.clone(),
        source: article.source.clone(),
        summary: article.summary.clone(),
    }
}

// ---------------------------------------------------------------------------
// Result assembly
// ---------------------------------------------------------------------------

/// Final payload stored on a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub topic: String,
    pub summary: String,
    pub key_terms: Vec<String>,
    pub ranked_articles: Vec<RankedArticle>,
    pub total_sources: usize,
    pub by_source: BTreeMap<String, usize>,
    pub workflow_version: String,
}

pub fn assemble_result(
    parsed: &ParsedTopic,
    gathered: &GatheredSources,
    analysis: &Analysis,
) -> ResearchResult {
    ResearchResult {
        topic: parsed.validated_topic.clone(),
        summary: analysis.summary.clone(),
        key_terms: analysis.key_terms.clone(),
        ranked_articles: analysis.ranked_articles.clone(),
        total_sources: gathered.total_sources,
        by_source: gathered.by_source.clone(),
        workflow_version: WORKFLOW_VERSION.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
