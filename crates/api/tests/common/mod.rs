#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use inquiry_core::analysis::KeywordAnalyzer;
use inquiry_core::collaborators::{DataFetcher, FetchError, SourceRecord};
use inquiry_db::SqliteJobStore;
use inquiry_pipeline::{PipelineConfig, ResearchService};
use tower::ServiceExt;

use inquiry_api::config::ServerConfig;
use inquiry_api::router::build_app_router;
use inquiry_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
    }
}

/// Returns two records for every topic, or fails when the topic is `"fail"`.
pub struct StubFetcher;

#[async_trait]
impl DataFetcher for StubFetcher {
    async fn fetch(&self, topic: &str, _queries: &[String]) -> Result<Vec<SourceRecord>, FetchError> {
        if topic == "fail" {
            return Err(FetchError::new("network down"));
        }
        Ok((0..2)
            .map(|n| SourceRecord {
                title: format!("{topic} article {n}"),
                url: format!("https://example.org/{n}"),
                snippet: format!("Notes on {topic}."),
                source: "Wikipedia".into(),
                relevance_score: 0.5,
            })
            .collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteJobStore>,
    pub research: ResearchService,
}

/// Build the full application router over a private in-memory store, with
/// executions running inline.
pub async fn build_test_app() -> TestApp {
    let store = Arc::new(SqliteJobStore::in_memory().await.unwrap());
    let pipeline = PipelineConfig {
        hard_timeout: Duration::from_secs(5),
        soft_timeout: Duration::from_secs(4),
        ..PipelineConfig::default()
    };
    let research = ResearchService::new(
        store.clone(),
        store.clone(),
        Arc::new(StubFetcher),
        Arc::new(KeywordAnalyzer::default()),
        pipeline,
    );
    let config = test_config();
    let state = AppState {
        research: research.clone(),
        config: Arc::new(config.clone()),
    };
    TestApp {
        router: build_app_router(state, &config),
        store,
        research,
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the status endpoint until the job is terminal; returns the snapshot.
pub async fn wait_for_terminal(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let json = body_json(get(app, &format!("/api/v1/research/{id}/status")).await).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if status == "COMPLETED" || status == "FAILED" {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("research {id} did not finish");
}

/// Submit `topic` and return the new research id.
pub async fn submit(app: &Router, topic: &str) -> String {
    let response = post_json(app, "/api/v1/research", serde_json::json!({ "topic": topic })).await;
    let json = body_json(response).await;
    json["data"]["research_id"].as_str().unwrap().to_string()
}
