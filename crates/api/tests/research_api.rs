//! Integration tests for the `/api/v1/research` endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post_json, submit, wait_for_terminal};
use inquiry_core::types::new_job_id;
use inquiry_db::JobStore;
use serde_json::json;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_202_and_job_completes() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/research",
        json!({ "topic": "Quantum Computing" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "PENDING");
    let id = json["data"]["research_id"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app.router, &id).await;
    assert_eq!(status["status"], "COMPLETED");
    assert_eq!(status["progress"]["current"], 5);
    assert_eq!(status["progress"]["total"], 5);

    let job = body_json(get(&app.router, &format!("/api/v1/research/{id}")).await).await;
    assert_eq!(job["data"]["steps"].as_array().unwrap().len(), 5);
    assert_eq!(job["data"]["result"]["topic"], "Quantum Computing");
    assert_eq!(job["data"]["result"]["total_sources"], 2);
    app.research.shutdown().await;
}

#[tokio::test]
async fn failed_fetch_is_reported_in_status() {
    let app = build_test_app().await;

    let id = submit(&app.router, "fail").await;

    let status = wait_for_terminal(&app.router, &id).await;
    assert_eq!(status["status"], "FAILED");
    assert!(status["message"].as_str().unwrap().contains("network down"));

    let job = body_json(get(&app.router, &format!("/api/v1/research/{id}")).await).await;
    let steps = job["data"]["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["status"], "SUCCEEDED");
    assert_eq!(steps[1]["name"], "data_gathering");
    assert_eq!(steps[1]["status"], "FAILED");
    app.research.shutdown().await;
}

#[tokio::test]
async fn empty_topic_is_rejected_and_nothing_is_stored() {
    let app = build_test_app().await;

    for topic in ["", "   "] {
        let response =
            post_json(&app.router, "/api/v1/research", json!({ "topic": topic })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
    let response =
        post_json(&app.router, "/api/v1/research", json!({ "topic": "a".repeat(501) })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "topic must be at most 500 characters (got 501)");

    assert!(app.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn padded_topic_at_the_limit_is_accepted_trimmed() {
    let app = build_test_app().await;
    let topic = "q".repeat(499);

    let response = post_json(
        &app.router,
        "/api/v1/research",
        json!({ "topic": format!("  {topic}  ") }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = body_json(response).await["data"]["research_id"]
        .as_str()
        .unwrap()
        .to_string();

    let job = body_json(get(&app.router, &format!("/api/v1/research/{id}")).await).await;
    assert_eq!(job["data"]["topic"], topic);
    wait_for_terminal(&app.router, &id).await;
    app.research.shutdown().await;
}

#[tokio::test]
async fn missing_topic_field_is_rejected() {
    let app = build_test_app().await;
    let response =
        post_json(&app.router, "/api/v1/research", json!({ "subject": "Rust" })).await;
    assert!(response.status().is_client_error());
    assert!(app.store.list().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_returns_newest_first() {
    let app = build_test_app().await;
    for topic in ["first", "second"] {
        let id = submit(&app.router, topic).await;
        wait_for_terminal(&app.router, &id).await;
    }

    let json = body_json(get(&app.router, "/api/v1/research").await).await;
    let topics: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["topic"].as_str().unwrap())
        .collect();
    assert_eq!(topics, vec!["second", "first"]);
    app.research.shutdown().await;
}

#[tokio::test]
async fn unknown_id_returns_404() {
    let app = build_test_app().await;
    let id = new_job_id();

    for uri in [
        format!("/api/v1/research/{id}"),
        format!("/api/v1/research/{id}/status"),
    ] {
        let response = get(&app.router, &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
    let response = delete(&app.router, &format!("/api/v1/research/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_a_client_error() {
    let app = build_test_app().await;
    let response = get(&app.router, "/api/v1/research/not-a-uuid/status").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_one_then_all() {
    let app = build_test_app().await;
    let mut ids = Vec::new();
    for topic in ["alpha", "beta", "gamma"] {
        let id = submit(&app.router, topic).await;
        wait_for_terminal(&app.router, &id).await;
        ids.push(id);
    }

    let response = delete(&app.router, &format!("/api/v1/research/{}", ids[0])).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get(&app.router, &format!("/api/v1/research/{}", ids[0])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(delete(&app.router, "/api/v1/research").await).await;
    assert_eq!(json["data"]["deleted"], 2);
    let json = body_json(get(&app.router, "/api/v1/research").await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
    app.research.shutdown().await;
}
