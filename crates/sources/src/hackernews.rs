//! Hacker News adapter over the Algolia search API.

use async_trait::async_trait;
use inquiry_core::collaborators::SourceRecord;
use serde::Deserialize;

use crate::error::{ensure_success, SourceError};
use crate::text::{strip_html, truncate_snippet};
use crate::SourceAdapter;

pub const DEFAULT_BASE_URL: &str = "https://hn.algolia.com";

const SOURCE_NAME: &str = "HackerNews";

const RELEVANCE_SCORE: f64 = 0.7;

const HITS_PER_PAGE: u32 = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    story_text: Option<String>,
}

pub struct HackerNewsAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HackerNewsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Stories without a title are dropped; self posts link to the HN thread.
fn hit_records(body: SearchResponse) -> Vec<SourceRecord> {
    body.hits
        .into_iter()
        .filter_map(|hit| {
            let title = hit.title.filter(|t| !t.trim().is_empty())?;
            let url = hit
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", hit.object_id));
            let snippet = hit
                .story_text
                .map(|text| truncate_snippet(&strip_html(&text)))
                .unwrap_or_default();
            Some(SourceRecord {
                title,
                url,
                snippet,
                source: SOURCE_NAME.to_string(),
                relevance_score: RELEVANCE_SCORE,
            })
        })
        .take(HITS_PER_PAGE as usize)
        .collect()
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>, SourceError> {
        let hits = HITS_PER_PAGE.to_string();
        let response = self
            .client
            .get(format!("{}/api/v1/search", self.base_url))
            .query(&[("query", query), ("tags", "story"), ("hitsPerPage", hits.as_str())])
            .send()
            .await?;
        let body: SearchResponse = ensure_success(SOURCE_NAME, response).await?.json().await?;
        Ok(hit_records(body))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn maps_hits_and_links_self_posts_to_thread() {
        let body: SearchResponse = serde_json::from_value(json!({
            "hits": [
                { "objectID": "1", "title": "Rust 2.0", "url": "https://blog.rust-lang.org/x" },
                { "objectID": "2", "title": "Ask HN: Rust?", "url": null, "story_text": "<p>Is it <i>good</i>?</p>" },
                { "objectID": "3", "title": null, "url": "https://example.org" }
            ]
        }))
        .unwrap();

        let records = hit_records(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://blog.rust-lang.org/x");
        assert_eq!(records[1].url, "https://news.ycombinator.com/item?id=2");
        assert_eq!(records[1].snippet, "Is it good?");
        assert_eq!(records[1].source, "HackerNews");
    }

    #[test]
    fn empty_response_has_no_records() {
        let body: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert!(hit_records(body).is_empty());
    }
}
