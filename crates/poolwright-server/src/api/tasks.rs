// Task HTTP routes
//
// Only the built-in demo task can be submitted over HTTP; arbitrary work is
// submitted through the library.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use poolwright_core::demo::{sleep_task, DEFAULT_DEMO_SECONDS};
use poolwright_core::pagination::DEFAULT_PER_PAGE;
use poolwright_core::{Page, PoolManager, TaskInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{ApiError, ErrorResponse};

/// Task type that runs [`sleep_task`]
pub const DEMO_TASK_TYPE: &str = "demo";

/// Query parameters for listing tasks
///
/// Kept as raw strings so malformed paging values fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListTasksQuery {
    /// Restrict the listing to one pool
    #[serde(default)]
    pub pool_id: Option<String>,
    /// 1-based page number (default: 1)
    #[serde(default)]
    pub page: Option<String>,
    /// Page size, 1 to 100 (default: 10)
    #[serde(default)]
    pub per_page: Option<String>,
}

/// Request to submit a task
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitTaskRequest {
    /// Pool to run the task in
    pub pool_id: Uuid,
    /// Display name. Generated from the task id when omitted.
    #[serde(default)]
    #[schema(example = "nightly-report")]
    pub task_name: Option<String>,
    /// Kind of task; only "demo" is supported
    #[serde(default)]
    #[schema(example = "demo")]
    pub task_type: Option<String>,
    /// Seconds the demo task sleeps, as a number or numeric string (default: 5)
    #[serde(default)]
    #[schema(value_type = Option<u64>, example = 5)]
    pub duration: Option<serde_json::Value>,
}

/// Identifiers of a submitted task
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitTaskResponse {
    pub task_id: Uuid,
    pub pool_id: Uuid,
}

/// Result of a cancellation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelTaskResponse {
    pub task_id: Uuid,
    /// Whether the task was cancelled before it started
    pub cancelled: bool,
}

/// App state for task routes
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PoolManager>,
}

impl AppState {
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self { manager }
    }
}

/// Create task routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/tasks", get(list_tasks).post(submit_task))
        .route("/v1/tasks/:task_id", get(get_task).delete(cancel_task))
        .with_state(state)
}

/// Parse a paging value, falling back when it is missing or not an integer.
/// Values below 1 become 1; the upper bounds are applied by the core.
fn parse_positive(raw: Option<&str>, fallback: usize) -> usize {
    match raw.map(|s| s.trim().parse::<i64>()) {
        Some(Ok(n)) => usize::try_from(n.max(1)).unwrap_or(fallback),
        _ => fallback,
    }
}

/// Seconds for the demo task: an integer or integer string, else the default
fn parse_duration(raw: Option<&serde_json::Value>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_DEMO_SECONDS;
    };
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!(
            duration = %raw,
            "Invalid duration value, using default: {}",
            DEFAULT_DEMO_SECONDS
        );
        DEFAULT_DEMO_SECONDS
    })
}

/// GET /v1/tasks - List tasks page by page, oldest first
#[utoipa::path(
    get,
    path = "/v1/tasks",
    params(
        ("pool_id" = Option<Uuid>, Query, description = "Only tasks of this pool"),
        ("page" = Option<usize>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<usize>, Query, description = "Page size, at most 100 (default: 10)")
    ),
    responses(
        (status = 200, description = "One page of tasks", body = Page<TaskInfo>),
        (status = 400, description = "Malformed pool id", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Page<TaskInfo>>, ApiError> {
    let pool_id = match query.pool_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::bad_request(format!("Invalid pool_id: {}", raw)))?,
        ),
    };
    let page = parse_positive(query.page.as_deref(), 1);
    let per_page = parse_positive(query.per_page.as_deref(), DEFAULT_PER_PAGE);

    Ok(Json(state.manager.list_tasks_page(pool_id, page, per_page)?))
}

/// POST /v1/tasks - Submit a demo task
#[utoipa::path(
    post,
    path = "/v1/tasks",
    request_body = SubmitTaskRequest,
    responses(
        (status = 201, description = "Task queued", body = SubmitTaskResponse),
        (status = 400, description = "Unsupported task type", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
        (status = 409, description = "Pool is not accepting tasks", body = ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn submit_task(
    State(state): State<AppState>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), ApiError> {
    let task_type = req.task_type.as_deref().unwrap_or(DEMO_TASK_TYPE);
    if task_type != DEMO_TASK_TYPE {
        return Err(ApiError::bad_request("Unsupported task type"));
    }

    let seconds = parse_duration(req.duration.as_ref());
    let task_id = state
        .manager
        .submit_task(req.pool_id, sleep_task(seconds), req.task_name)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitTaskResponse {
            task_id,
            pool_id: req.pool_id,
        }),
    ))
}

/// GET /v1/tasks/{task_id} - Get task by ID
#[utoipa::path(
    get,
    path = "/v1/tasks/{task_id}",
    params(
        ("task_id" = Uuid, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task found", body = TaskInfo),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskInfo>, ApiError> {
    Ok(Json(state.manager.get_task_info(task_id)?))
}

/// DELETE /v1/tasks/{task_id} - Cancel a task that has not started
#[utoipa::path(
    delete,
    path = "/v1/tasks/{task_id}",
    params(
        ("task_id" = Uuid, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Cancellation attempted", body = CancelTaskResponse)
    ),
    tag = "tasks"
)]
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Json<CancelTaskResponse> {
    let cancelled = state.manager.cancel_task(task_id);
    Json(CancelTaskResponse { task_id, cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive(None, 10), 10);
        assert_eq!(parse_positive(Some("3"), 10), 3);
        assert_eq!(parse_positive(Some(" 7 "), 10), 7);
        assert_eq!(parse_positive(Some("0"), 10), 1);
        assert_eq!(parse_positive(Some("-4"), 10), 1);
        assert_eq!(parse_positive(Some("abc"), 10), 10);
        assert_eq!(parse_positive(Some("2.5"), 1), 1);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(None), DEFAULT_DEMO_SECONDS);
        assert_eq!(parse_duration(Some(&json!(3))), 3);
        assert_eq!(parse_duration(Some(&json!("12"))), 12);
        assert_eq!(parse_duration(Some(&json!("soon"))), DEFAULT_DEMO_SECONDS);
        assert_eq!(parse_duration(Some(&json!(1.5))), DEFAULT_DEMO_SECONDS);
        assert_eq!(parse_duration(Some(&json!(-1))), DEFAULT_DEMO_SECONDS);
        assert_eq!(parse_duration(Some(&json!(null))), DEFAULT_DEMO_SECONDS);
    }

    #[test]
    fn test_submit_request_defaults() {
        let pool_id = Uuid::now_v7();
        let req: SubmitTaskRequest =
            serde_json::from_value(json!({ "pool_id": pool_id })).unwrap();
        assert_eq!(req.pool_id, pool_id);
        assert!(req.task_name.is_none());
        assert!(req.task_type.is_none());
        assert!(req.duration.is_none());
    }
}
