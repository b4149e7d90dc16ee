pub mod health;
pub mod research;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /research                       submit, list, delete all
/// /research/{id}                  get, delete
/// /research/{id}/status           status snapshot
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/research", research::router())
}
