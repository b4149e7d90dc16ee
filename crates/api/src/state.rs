use std::sync::Arc;

use inquiry_pipeline::ResearchService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; the service holds its parts behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher, reporter, and store access.
    pub research: ResearchService,
    pub config: Arc<ServerConfig>,
}
