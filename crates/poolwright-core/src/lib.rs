//! # Poolwright
//!
//! Named worker pools with bounded capacity, tracked task lifecycles,
//! best-effort cancellation, live resizing and background cleanup.
//!
//! ## Features
//!
//! - **Bounded pools**: at most `max_workers` tasks of a pool run at once
//! - **Tracked tasks**: every task moves through Pending → Running → a terminal state
//! - **Live resize**: capacity changes migrate queued work without losing or duplicating tasks
//! - **Graceful and forced shutdown** per pool and for the whole manager
//! - **Cleanup daemon**: terminal tasks and stopped pools are pruned periodically
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PoolManager                           │
//! │  (pools by id, global task index, cleanup daemon)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │  (task set, admission semaphore, current worker set)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WorkerSet (generation N)                   │
//! │  (tokio workers draining one queue; older sets drain out)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod demo;
pub mod error;
pub mod manager;
pub mod pagination;
pub mod pool;
pub mod task;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::error::{ManagerError, Result};
    pub use crate::manager::{ManagerStats, PoolManager};
    pub use crate::pagination::{Page, Pagination};
    pub use crate::pool::{PoolInfo, PoolStatus, ResizeInfo, ResizeResult, WorkerPool};
    pub use crate::task::{Task, TaskContext, TaskInfo, TaskStatus, TaskWork, WorkResult};
}

// Re-export key types at crate root
pub use config::{ManagerConfig, DEFAULT_MAX_WORKERS};
pub use error::{ManagerError, Result};
pub use manager::{ManagerStats, PoolManager};
pub use pagination::{Page, Pagination};
pub use pool::{PoolInfo, PoolStatus, ResizeInfo, ResizeResult, WorkerPool};
pub use task::{Task, TaskContext, TaskInfo, TaskStatus, TaskWork, WorkResult};
