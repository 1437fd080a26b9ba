//! Pool registry and background cleanup
//!
//! [`PoolManager`] is the single source of truth for which pools and tasks
//! exist. It owns the cleanup daemon, which periodically prunes terminal
//! tasks and stopped pools.

mod cleanup;
mod pool_manager;
mod registry;

use serde::{Deserialize, Serialize};

pub use pool_manager::PoolManager;

/// Registry-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ManagerStats {
    pub total_pools: usize,
    /// Tasks in the global index
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
}
