//! NewsAPI `everything` adapter. Enabled only when an API key is configured.

use async_trait::async_trait;
use inquiry_core::collaborators::SourceRecord;
use serde::Deserialize;

use crate::error::{ensure_success, SourceError};
use crate::text::truncate_snippet;
use crate::SourceAdapter;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";

const SOURCE_NAME: &str = "NewsAPI";

const RELEVANCE_SCORE: f64 = 0.85;

const PAGE_SIZE: u32 = 5;

/// Title NewsAPI substitutes for articles pulled by the publisher.
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    content: Option<String>,
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

pub struct NewsApiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewsApiAdapter {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn article_records(body: EverythingResponse) -> Vec<SourceRecord> {
    body.articles
        .into_iter()
        .filter_map(|article| {
            let title = article
                .title
                .filter(|t| !t.trim().is_empty() && t != REMOVED_MARKER)?;
            let url = article.url.filter(|u| !u.is_empty())?;
            let snippet = article
                .description
                .filter(|d| !d.trim().is_empty())
                .or(article.content)
                .map(|text| truncate_snippet(text.trim()))
                .unwrap_or_default();
            let source = article
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| SOURCE_NAME.to_string());
            Some(SourceRecord {
                title,
                url,
                snippet,
                source,
                relevance_score: RELEVANCE_SCORE,
            })
        })
        .take(PAGE_SIZE as usize)
        .collect()
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>, SourceError> {
        let page_size = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("sortBy", "relevancy"),
            ])
            .send()
            .await?;
        let body: EverythingResponse = ensure_success(SOURCE_NAME, response).await?.json().await?;
        Ok(article_records(body))
    }
}
