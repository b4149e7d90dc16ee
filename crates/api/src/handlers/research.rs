//! Handlers for the `/research` resource.
//!
//! Thin adapters over [`ResearchService`](inquiry_pipeline::ResearchService):
//! all validation beyond request shape and all state changes happen there.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use inquiry_core::research::JobStatus;
use inquiry_core::types::JobId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /research`.
///
/// Only emptiness is checked here. Trimming and the configured length limit
/// belong to the dispatcher.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResearch {
    #[validate(length(min = 1, message = "topic must not be empty"))]
    pub topic: String,
}

/// Acknowledgement returned by `POST /research`.
#[derive(Debug, Serialize)]
pub struct SubmittedResearch {
    pub research_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/research
///
/// Create a research job and schedule its execution. Returns 202; poll the
/// status endpoint for progress.
pub async fn submit_research(
    State(state): State<AppState>,
    Json(input): Json<SubmitResearch>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let research_id = state.research.submit_job(&input.topic).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedResearch {
                research_id,
                status: JobStatus::Pending,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/research
///
/// Job summaries, most recent first.
pub async fn list_research(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.research.list_jobs().await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/research/{id}
///
/// The full job record including steps and result.
pub async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.research.get_job(id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/research/{id}/status
pub async fn get_research_status(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.research.get_status(id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/research/{id}
pub async fn delete_research(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.research.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/research
pub async fn delete_all_research(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let deleted = state.research.delete_all_jobs().await?;
    Ok(Json(DataResponse {
        data: DeletedCount { deleted },
    }))
}
