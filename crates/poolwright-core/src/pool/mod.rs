//! Worker pools
//!
//! This module provides:
//! - [`WorkerPool`] - bounded concurrent execution with an observable lifecycle
//! - [`PoolStatus`] / [`PoolInfo`] - pool state and read-only snapshot
//! - [`ResizeResult`] / [`ResizeInfo`] - outcome and advice for capacity changes

mod admission;
mod resize;
mod worker_pool;
mod worker_set;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use resize::{ResizeInfo, ResizeResult, MAX_SUGGESTED_WORKERS};
pub use worker_pool::WorkerPool;

/// Pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting and executing work
    Running,
    /// Graceful shutdown in progress, draining accepted work
    Shutdown,
    /// No longer accepting work; in-flight work was abandoned or left to finish
    Stopped,
    /// Shut down after every accepted task finished
    Terminated,
}

impl PoolStatus {
    /// Stopped and Terminated are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, PoolStatus::Stopped | PoolStatus::Terminated)
    }
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Stopped => write!(f, "stopped"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Point-in-time pool snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PoolInfo {
    pub pool_id: Uuid,
    pub name: String,
    pub status: PoolStatus,
    pub max_workers: usize,
    /// Incremented by every successful resize
    pub generation: u64,
    pub total_tasks: usize,
    /// Pending plus running
    pub active_tasks: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    /// Every terminal task, whatever the outcome
    pub completed_tasks: usize,
    pub cancelled_tasks: usize,
    pub failed_tasks: usize,
}

/// `{prefix}-` plus the last eight hex digits of `id`
///
/// The leading digits of a v7 id are a timestamp and collide for ids minted
/// in the same millisecond, so the tail is used.
pub(crate) fn default_name(prefix: &str, id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("{}-{}", prefix, &hex[hex.len() - 8..])
}
