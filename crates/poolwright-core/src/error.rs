//! Error taxonomy for pool and task operations

use std::time::Duration;

use uuid::Uuid;

use crate::pool::PoolStatus;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Errors surfaced by the manager, pools and task handles
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagerError {
    /// No live pool with this id
    #[error("pool not found: {0}")]
    PoolNotFound(Uuid),

    /// No tracked task with this id
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// Another live pool already uses this name
    #[error("pool with name '{0}' already exists")]
    PoolAlreadyExists(String),

    /// Operation needs the pool in another status
    #[error("pool {pool_id} is {status}, expected {expected}")]
    InvalidPoolState {
        pool_id: Uuid,
        status: PoolStatus,
        expected: PoolStatus,
    },

    /// Caller supplied an out-of-range argument
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The task body returned an error
    #[error("task {task_id} failed: {error}")]
    TaskFailed { task_id: Uuid, error: String },

    /// The task was cancelled before producing a result
    #[error("task {0} was cancelled")]
    TaskCancelled(Uuid),

    /// Waiting for a task result exceeded the caller's timeout
    #[error("timed out after {0:?} waiting for task")]
    Timeout(Duration),

    /// Unexpected failure inside the manager (e.g. no async runtime)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ManagerError {
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        ManagerError::InvalidParameter(msg.into())
    }

    /// Whether the error means "the thing you asked about does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::PoolNotFound(_) | ManagerError::TaskNotFound(_)
        )
    }
}
