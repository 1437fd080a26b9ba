// Common DTOs and error mapping for the HTTP API
//
// These types are shared across all route modules.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use poolwright_core::ManagerError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Convert to axum response tuple
    pub fn into_response(self, status: StatusCode) -> (StatusCode, Json<Self>) {
        (status, Json(self))
    }
}

/// Response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Items returned by the listing.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        let status = match &err {
            ManagerError::PoolNotFound(_) | ManagerError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::PoolAlreadyExists(_) | ManagerError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ManagerError::InvalidPoolState { .. } => StatusCode::CONFLICT,
            ManagerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ManagerError::TaskFailed { .. }
            | ManagerError::TaskCancelled(_)
            | ManagerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ApiError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: ApiError) -> Self {
        ErrorResponse::new(err.message).into_response(err.status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        <(StatusCode, Json<ErrorResponse>)>::from(self).into_response()
    }
}
