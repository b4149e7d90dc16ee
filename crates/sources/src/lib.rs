//! HTTP data sources backing the `data_gathering` step.
//!
//! Each [`SourceAdapter`] queries one public API and maps its response onto
//! [`SourceRecord`]s. [`CompositeFetcher`] fans the search queries out over
//! every configured adapter and implements the pipeline's
//! [`DataFetcher`](inquiry_core::collaborators::DataFetcher) contract.

use async_trait::async_trait;
use inquiry_core::collaborators::SourceRecord;

pub mod composite;
pub mod config;
pub mod error;
pub mod hackernews;
pub mod newsapi;
pub mod text;
pub mod wikipedia;

pub use composite::CompositeFetcher;
pub use config::SourcesConfig;
pub use error::SourceError;
pub use hackernews::HackerNewsAdapter;
pub use newsapi::NewsApiAdapter;
pub use wikipedia::WikipediaAdapter;

/// One external source of articles.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Label stored in [`SourceRecord::source`] and used in logs.
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>, SourceError>;
}

/// Build the fetcher for the adapters enabled by `config`.
///
/// Wikipedia and Hacker News are always on; NewsAPI joins when an API key
/// is configured.
pub fn build_fetcher(config: &SourcesConfig) -> Result<CompositeFetcher, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .build()?;

    let mut fetcher = CompositeFetcher::new(config.max_records)
        .with_adapter(WikipediaAdapter::new(client.clone()))
        .with_adapter(HackerNewsAdapter::new(client.clone()));

    if let Some(key) = &config.newsapi_key {
        fetcher = fetcher.with_adapter(NewsApiAdapter::new(client, key.clone()));
    }

    tracing::info!(adapters = ?fetcher.adapter_names(), "Data sources configured");
    Ok(fetcher)
}
