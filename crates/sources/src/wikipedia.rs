//! Wikipedia adapter.
//!
//! Tries the REST page summary for the exact query first; when no page
//! matches, falls back to the MediaWiki full-text search API.

use async_trait::async_trait;
use inquiry_core::collaborators::SourceRecord;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::{ensure_success, SourceError};
use crate::text::{strip_html, truncate_snippet};
use crate::SourceAdapter;

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

const SOURCE_NAME: &str = "Wikipedia";

/// Relevance assigned to an exact page match.
const SUMMARY_SCORE: f64 = 0.9;

/// Relevance assigned to full-text search hits.
const SEARCH_SCORE: f64 = 0.8;

const SEARCH_LIMIT: u32 = 3;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(rename = "type", default)]
    kind: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct WikipediaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SourceError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Url(self.base_url.clone()))?
            .extend(segments);
        Ok(url)
    }

    async fn fetch_summary(&self, query: &str) -> Result<Option<SourceRecord>, SourceError> {
        let title = query.replace(' ', "_");
        let url = self.url(&["api", "rest_v1", "page", "summary", &title])?;

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let summary: PageSummary = ensure_success(SOURCE_NAME, response).await?.json().await?;
        Ok(self.summary_record(summary))
    }

    async fn fetch_search(&self, query: &str) -> Result<Vec<SourceRecord>, SourceError> {
        let url = self.url(&["w", "api.php"])?;
        let limit = SEARCH_LIMIT.to_string();

        let response = self
            .client
            .get(url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?;
        let body: SearchResponse = ensure_success(SOURCE_NAME, response).await?.json().await?;
        Ok(self.search_records(body))
    }

    /// Map a page summary, skipping disambiguation pages and empty extracts.
    fn summary_record(&self, summary: PageSummary) -> Option<SourceRecord> {
        if summary.kind == "disambiguation" || summary.extract.trim().is_empty() {
            return None;
        }
        let url = summary
            .content_urls
            .and_then(|urls| urls.desktop)
            .map(|desktop| desktop.page)
            .unwrap_or_else(|| self.article_url(&summary.title));

        Some(SourceRecord {
            url,
            snippet: truncate_snippet(summary.extract.trim()),
            title: summary.title,
            source: SOURCE_NAME.to_string(),
            relevance_score: SUMMARY_SCORE,
        })
    }

    fn search_records(&self, body: SearchResponse) -> Vec<SourceRecord> {
        body.query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .take(SEARCH_LIMIT as usize)
            .map(|hit| SourceRecord {
                url: self.article_url(&hit.title),
                snippet: truncate_snippet(&strip_html(&hit.snippet)),
                title: hit.title,
                source: SOURCE_NAME.to_string(),
                relevance_score: SEARCH_SCORE,
            })
            .collect()
    }

    fn article_url(&self, title: &str) -> String {
        let page = title.replace(' ', "_");
        self.url(&["wiki", &page])
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/wiki/{page}", self.base_url))
    }
}

#[async_trait]
impl SourceAdapter for WikipediaAdapter {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>, SourceError> {
        if let Some(record) = self.fetch_summary(query).await? {
            return Ok(vec![record]);
        }
        self.fetch_search(query).await
    }
}
