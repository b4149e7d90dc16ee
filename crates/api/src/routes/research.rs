//! Route definitions for the `/research` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::research;
use crate::state::AppState;

/// Routes mounted at `/research`.
///
/// ```text
/// GET    /                -> list_research
/// POST   /                -> submit_research
/// DELETE /                -> delete_all_research
/// GET    /{id}            -> get_research
/// DELETE /{id}            -> delete_research
/// GET    /{id}/status     -> get_research_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(research::list_research)
                .post(research::submit_research)
                .delete(research::delete_all_research),
        )
        .route(
            "/{id}",
            get(research::get_research).delete(research::delete_research),
        )
        .route("/{id}/status", get(research::get_research_status))
}
