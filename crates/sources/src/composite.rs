//! Fan-out fetcher over every configured [`SourceAdapter`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use inquiry_core::collaborators::{DataFetcher, FetchError, SourceRecord};

use crate::SourceAdapter;

/// Queries every adapter with every search query concurrently.
///
/// Individual adapter failures are logged and tolerated; the fetch only
/// fails when every request failed. Records are de-duplicated by URL,
/// keeping the first occurrence.
pub struct CompositeFetcher {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    max_records: usize,
}

impl CompositeFetcher {
    pub fn new(max_records: usize) -> Self {
        Self {
            adapters: Vec::new(),
            max_records,
        }
    }

    pub fn with_adapter(mut self, adapter: impl SourceAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

#[async_trait]
impl DataFetcher for CompositeFetcher {
    async fn fetch(&self, topic: &str, queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        if self.adapters.is_empty() {
            return Err(FetchError::new("no data sources configured"));
        }

        let fallback = [topic.to_string()];
        let queries = if queries.is_empty() { &fallback[..] } else { queries };

        let requests = queries.iter().flat_map(|query| {
            self.adapters.iter().map(move |adapter| async move {
                let outcome = adapter.search(query).await;
                (adapter.name(), query, outcome)
            })
        });
        let outcomes = join_all(requests).await;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (source, query, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    tracing::debug!(source, query = %query, count = found.len(), "Source search finished");
                    for record in found {
                        if seen.insert(record.url.clone()) {
                            records.push(record);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(source, query = %query, error = %e, "Source search failed");
                    failures.push(format!("{source}: {e}"));
                }
            }
        }

        let attempted = queries.len() * self.adapters.len();
        if failures.len() == attempted {
            return Err(FetchError::new(format!(
                "all data sources failed: {}",
                failures.join("; ")
            )));
        }

        records.truncate(self.max_records);
        Ok(records)
    }
}
