// Manager-wide statistics route

use axum::{extract::State, routing::get, Json, Router};
use poolwright_core::{ManagerStats, PoolManager};
use std::sync::Arc;

/// App state for the stats route
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PoolManager>,
}

impl AppState {
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self { manager }
    }
}

/// Create stats routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/stats", get(get_stats))
        .with_state(state)
}

/// GET /v1/stats - Pool and task counts
#[utoipa::path(
    get,
    path = "/v1/stats",
    responses(
        (status = 200, description = "Current counts", body = ManagerStats)
    ),
    tag = "stats"
)]
pub async fn get_stats(State(state): State<AppState>) -> Json<ManagerStats> {
    Json(state.manager.get_stats())
}
