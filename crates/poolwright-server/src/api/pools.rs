// Pool HTTP routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use poolwright_core::{PoolInfo, PoolManager, ResizeInfo, ResizeResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{ApiError, ErrorResponse, ListResponse};

/// Request to create a new pool
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreatePoolRequest {
    /// Unique pool name. Generated from the pool id when omitted.
    #[serde(default)]
    #[schema(example = "image-resize")]
    pub name: Option<String>,
    /// Number of concurrent workers. Defaults to the manager setting.
    #[serde(default)]
    #[schema(example = 4)]
    pub max_workers: Option<usize>,
}

/// Request to change a pool's worker count
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResizeRequest {
    /// New number of concurrent workers, at least 1
    #[schema(example = 8)]
    pub max_workers: Option<i64>,
}

/// Query parameters for closing a pool
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClosePoolQuery {
    /// Wait for queued and running tasks to finish (default: true)
    #[serde(default)]
    pub wait: Option<bool>,
}

/// Result of a graceful close
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClosePoolResponse {
    pub pool_id: Uuid,
    pub closed: bool,
}

/// Result of a forced close
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForceClosePoolResponse {
    pub pool_id: Uuid,
    /// Tasks that were still pending or running
    pub cancelled_tasks: Vec<Uuid>,
}

/// Result of cancelling a pool's queued tasks
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelPendingResponse {
    pub pool_id: Uuid,
    pub cancelled: usize,
}

/// App state for pool routes
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PoolManager>,
}

impl AppState {
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self { manager }
    }
}

/// Create pool routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/pools", post(create_pool).get(list_pools))
        .route("/v1/pools/:pool_id", get(get_pool).delete(close_pool))
        .route("/v1/pools/:pool_id/force", delete(force_close_pool))
        .route("/v1/pools/:pool_id/cancel-pending", post(cancel_pending))
        .route("/v1/pools/:pool_id/resize", put(resize_pool))
        .route("/v1/pools/:pool_id/resize-info", get(get_resize_info))
        .with_state(state)
}

/// POST /v1/pools - Create a new pool
#[utoipa::path(
    post,
    path = "/v1/pools",
    request_body = CreatePoolRequest,
    responses(
        (status = 201, description = "Pool created successfully", body = PoolInfo),
        (status = 400, description = "Duplicate name or invalid worker count", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn create_pool(
    State(state): State<AppState>,
    Json(req): Json<CreatePoolRequest>,
) -> Result<(StatusCode, Json<PoolInfo>), ApiError> {
    let pool_id = state.manager.create_pool(req.name, req.max_workers)?;
    let info = state.manager.get_pool_info(pool_id)?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /v1/pools - List all pools
#[utoipa::path(
    get,
    path = "/v1/pools",
    responses(
        (status = 200, description = "List of pools", body = ListResponse<PoolInfo>)
    ),
    tag = "pools"
)]
pub async fn list_pools(State(state): State<AppState>) -> Json<ListResponse<PoolInfo>> {
    Json(state.manager.list_pools().into())
}

/// GET /v1/pools/{pool_id} - Get pool by ID
#[utoipa::path(
    get,
    path = "/v1/pools/{pool_id}",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID")
    ),
    responses(
        (status = 200, description = "Pool found", body = PoolInfo),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn get_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<PoolInfo>, ApiError> {
    Ok(Json(state.manager.get_pool_info(pool_id)?))
}

/// DELETE /v1/pools/{pool_id} - Close a pool and remove it with its tasks
#[utoipa::path(
    delete,
    path = "/v1/pools/{pool_id}",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID"),
        ("wait" = Option<bool>, Query, description = "Wait for outstanding tasks (default: true)")
    ),
    responses(
        (status = 200, description = "Pool closed", body = ClosePoolResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn close_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
    Query(query): Query<ClosePoolQuery>,
) -> Result<Json<ClosePoolResponse>, ApiError> {
    let wait = query.wait.unwrap_or(true);
    let closed = state.manager.close_pool(pool_id, wait).await?;
    Ok(Json(ClosePoolResponse { pool_id, closed }))
}

/// DELETE /v1/pools/{pool_id}/force - Stop a pool at once
#[utoipa::path(
    delete,
    path = "/v1/pools/{pool_id}/force",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID")
    ),
    responses(
        (status = 200, description = "Pool stopped", body = ForceClosePoolResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn force_close_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<ForceClosePoolResponse>, ApiError> {
    let cancelled_tasks = state.manager.force_close_pool(pool_id)?;
    Ok(Json(ForceClosePoolResponse {
        pool_id,
        cancelled_tasks,
    }))
}

/// POST /v1/pools/{pool_id}/cancel-pending - Cancel every queued task
#[utoipa::path(
    post,
    path = "/v1/pools/{pool_id}/cancel-pending",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID")
    ),
    responses(
        (status = 200, description = "Queued tasks cancelled", body = CancelPendingResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn cancel_pending(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<CancelPendingResponse>, ApiError> {
    let cancelled = state.manager.cancel_pool_tasks(pool_id)?;
    Ok(Json(CancelPendingResponse { pool_id, cancelled }))
}

/// PUT /v1/pools/{pool_id}/resize - Change the worker count
#[utoipa::path(
    put,
    path = "/v1/pools/{pool_id}/resize",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID")
    ),
    request_body = ResizeRequest,
    responses(
        (status = 200, description = "Resize attempted", body = ResizeResult),
        (status = 400, description = "Missing or invalid max_workers", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
        (status = 409, description = "Pool is not running", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn resize_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<ResizeResult>, ApiError> {
    let requested = req
        .max_workers
        .ok_or_else(|| ApiError::bad_request("max_workers is required"))?;
    let max_workers = usize::try_from(requested)
        .map_err(|_| ApiError::bad_request("max_workers must be at least 1"))?;

    Ok(Json(state.manager.resize_pool(pool_id, max_workers)?))
}

/// GET /v1/pools/{pool_id}/resize-info - Capacity, load and a suggested worker count
#[utoipa::path(
    get,
    path = "/v1/pools/{pool_id}/resize-info",
    params(
        ("pool_id" = Uuid, Path, description = "Pool ID")
    ),
    responses(
        (status = 200, description = "Resize info", body = ResizeInfo),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "pools"
)]
pub async fn get_resize_info(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<ResizeInfo>, ApiError> {
    Ok(Json(state.manager.get_pool_resize_info(pool_id)?))
}
