//! End-to-end Step Executor runs against an in-memory store.

mod common;

use std::sync::Arc;

use inquiry_core::analysis::KeywordAnalyzer;
use inquiry_core::research::{JobStatus, StepName, StepStatus};
use inquiry_db::JobStore;
use inquiry_pipeline::{RunOutcome, StatusReporter};
use serde_json::json;

use common::*;

#[tokio::test]
async fn quantum_computing_completes_with_five_steps() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Quantum Computing").await;
    let executor = executor(
        store.clone(),
        StaticFetcher { count: 3 },
        ScriptedAnalyzer {
            key_terms: vec!["qubit", "superposition", "entanglement"],
        },
        fast_config(),
    );

    assert_eq!(
        executor.execute_with_outcome(job.id).await,
        Some(RunOutcome::Completed)
    );

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current_step_index, 5);
    assert_eq!(job.steps.len(), 5);
    for (record, name) in job.steps.iter().zip(StepName::ALL) {
        assert_eq!(record.name, name);
        assert_eq!(record.status, StepStatus::Succeeded);
        assert!(record.finished_at.is_some());
    }

    let result = job.result.expect("completed job has a result");
    assert_eq!(result["key_terms"].as_array().unwrap().len(), 3);
    assert_eq!(result["topic"], "Quantum Computing");
    assert_eq!(result["total_sources"], 3);
    assert_eq!(result["by_source"], json!({ "Wikipedia": 3 }));
    assert_eq!(result["workflow_version"], "5-step-v1");
    assert!(job.error.is_none());
}

#[tokio::test]
async fn step_outputs_are_recorded() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "  Quantum   Computing ").await;
    let executor = executor(
        store.clone(),
        StaticFetcher { count: 2 },
        KeywordAnalyzer::default(),
        fast_config(),
    );
    executor.execute(job.id).await;

    let job = store.get(job.id).await.unwrap();
    let parsed = job.step(StepName::InputParsing).unwrap();
    let output = parsed.output.as_ref().unwrap();
    assert_eq!(output["validated_topic"], "Quantum Computing");
    assert_eq!(output["queries"][0], "Quantum Computing");

    let gathered = job.step(StepName::DataGathering).unwrap();
    assert_eq!(gathered.output.as_ref().unwrap()["total_sources"], 2);
    assert!(gathered.detail.contains("gathered 2 source records"));

    let prepared = job.step(StepName::FrontendPreparation).unwrap();
    let cards = prepared.output.as_ref().unwrap()["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["rank"], 1);
}

#[tokio::test]
async fn fetch_failure_fails_job_at_data_gathering() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "X").await;
    let executor = executor(
        store.clone(),
        FailingFetcher("network down"),
        KeywordAnalyzer::default(),
        fast_config(),
    );

    assert_eq!(
        executor.execute_with_outcome(job.id).await,
        Some(RunOutcome::Failed)
    );

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("network down"));
    assert!(job.result.is_none());
    assert_eq!(job.steps.len(), 2);
    assert_eq!(job.steps[0].name, StepName::InputParsing);
    assert_eq!(job.steps[0].status, StepStatus::Succeeded);
    assert_eq!(job.steps[1].name, StepName::DataGathering);
    assert_eq!(job.steps[1].status, StepStatus::Failed);
    assert_eq!(job.current_step_index, 1);
}

#[tokio::test]
async fn empty_gathering_fails_processing() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Obscure topic").await;
    let executor = executor(
        store.clone(),
        StaticFetcher { count: 0 },
        KeywordAnalyzer::default(),
        fast_config(),
    );
    executor.execute(job.id).await;

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.steps.len(), 3);
    assert_eq!(job.steps[2].name, StepName::Processing);
    assert_eq!(job.error.as_deref(), Some("no source records to analyze"));
}

#[tokio::test]
async fn second_execution_of_same_job_is_skipped() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Rust").await;
    let executor = executor(
        store.clone(),
        StaticFetcher { count: 1 },
        KeywordAnalyzer::default(),
        fast_config(),
    );

    assert_eq!(
        executor.execute_with_outcome(job.id).await,
        Some(RunOutcome::Completed)
    );
    assert_eq!(
        executor.execute_with_outcome(job.id).await,
        Some(RunOutcome::Skipped)
    );
    assert_eq!(store.get(job.id).await.unwrap().steps.len(), 5);
}

#[tokio::test]
async fn concurrent_executions_of_same_job_run_once() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Rust").await;
    let executor = Arc::new(executor(
        store.clone(),
        StaticFetcher { count: 2 },
        KeywordAnalyzer::default(),
        fast_config(),
    ));

    let (a, b) = tokio::join!(
        executor.execute_with_outcome(job.id),
        executor.execute_with_outcome(job.id),
    );
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o != RunOutcome::Completed);
    assert_eq!(outcomes, vec![RunOutcome::Completed, RunOutcome::Skipped]);

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.steps.len(), 5);
}

#[tokio::test]
async fn concurrent_jobs_do_not_share_state() {
    let store = store().await;
    let first = pending_job(store.as_ref(), "Quantum Computing").await;
    let second = pending_job(store.as_ref(), "Marine Biology").await;
    let executor = Arc::new(executor(
        store.clone(),
        StaticFetcher { count: 2 },
        KeywordAnalyzer::default(),
        fast_config(),
    ));

    tokio::join!(executor.execute(first.id), executor.execute(second.id));

    for (id, topic) in [(first.id, "Quantum Computing"), (second.id, "Marine Biology")] {
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.steps.len(), 5);
        let result = job.result.unwrap();
        assert_eq!(result["topic"], topic);
        for article in result["ranked_articles"].as_array().unwrap() {
            assert!(article["title"].as_str().unwrap().starts_with(topic));
        }
    }
}

#[tokio::test]
async fn deleted_job_is_skipped() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Rust").await;
    store.delete(job.id).await.unwrap();
    let executor = executor(
        store.clone(),
        StaticFetcher { count: 1 },
        KeywordAnalyzer::default(),
        fast_config(),
    );

    assert_eq!(executor.execute_with_outcome(job.id).await, None);
}

#[tokio::test]
async fn pollers_see_completed_prefix_while_job_runs() {
    let store = store().await;
    let job = pending_job(store.as_ref(), "Quantum Computing").await;
    let fetcher = GatedFetcher::default();
    let (entered, release) = (fetcher.entered.clone(), fetcher.release.clone());
    let executor = Arc::new(executor(
        store.clone(),
        fetcher,
        ScriptedAnalyzer {
            key_terms: vec!["qubit"],
        },
        fast_config(),
    ));

    let run = tokio::spawn({
        let executor = executor.clone();
        async move { executor.execute_with_outcome(job.id).await }
    });
    entered.notified().await;

    let reporter = StatusReporter::new(store.clone());
    let snapshot = reporter.get_status(job.id).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::InProgress);
    assert_eq!(snapshot.message, "running step 2: data_gathering");
    assert_eq!(snapshot.progress.current, 1);
    assert_eq!(snapshot.progress.total, 5);

    let midway = store.get(job.id).await.unwrap();
    assert_eq!(midway.steps.len(), 2);
    assert_eq!(midway.steps[0].status, StepStatus::Succeeded);
    assert_eq!(midway.steps[1].name, StepName::DataGathering);
    assert_eq!(midway.steps[1].status, StepStatus::Started);
    assert!(midway.result.is_none());

    release.notify_one();
    assert_eq!(run.await.unwrap(), Some(RunOutcome::Completed));
    let snapshot = reporter.get_status(job.id).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.progress.current, 5);
}
