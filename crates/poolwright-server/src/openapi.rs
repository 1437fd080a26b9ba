// OpenAPI specification generation
//
// Served by the API server at /api-doc/openapi.json and printed by the
// export-openapi binary.

use crate::api;
use crate::api::{ErrorResponse, ListResponse};
use poolwright_core::{
    ManagerStats, Page, Pagination, PoolInfo, PoolStatus, ResizeInfo, ResizeResult, TaskInfo,
    TaskStatus,
};
use utoipa::OpenApi;

/// OpenAPI documentation for the Poolwright API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::pools::create_pool,
        api::pools::list_pools,
        api::pools::get_pool,
        api::pools::close_pool,
        api::pools::force_close_pool,
        api::pools::cancel_pending,
        api::pools::resize_pool,
        api::pools::get_resize_info,
        api::tasks::list_tasks,
        api::tasks::submit_task,
        api::tasks::get_task,
        api::tasks::cancel_task,
        api::stats::get_stats,
    ),
    components(
        schemas(
            PoolInfo, PoolStatus, ResizeInfo, ResizeResult,
            TaskInfo, TaskStatus, Page<TaskInfo>, Pagination,
            ManagerStats,
            ErrorResponse,
            ListResponse<PoolInfo>,
            api::pools::CreatePoolRequest, api::pools::ResizeRequest,
            api::pools::ClosePoolResponse, api::pools::ForceClosePoolResponse,
            api::pools::CancelPendingResponse,
            api::tasks::SubmitTaskRequest, api::tasks::SubmitTaskResponse,
            api::tasks::CancelTaskResponse,
        )
    ),
    tags(
        (name = "pools", description = "Worker pool management endpoints"),
        (name = "tasks", description = "Task submission and tracking endpoints"),
        (name = "stats", description = "Manager statistics endpoints")
    ),
    info(
        title = "Poolwright API",
        version = "0.1.0",
        description = "API for managing resizable worker pools and their tasks",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON document
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
