//! Live capacity changes
//!
//! Resizing swaps the pool's current worker set for a new generation:
//!
//! 1. Pending tasks are reassigned to the new generation and queued on it.
//!    Workers of the old generation skip them when they come up.
//! 2. Running tasks stay on the old set, which is retired rather than
//!    stopped. A drain watcher logs once its last worker has exited.
//! 3. Terminal tasks are only counted.
//!
//! The task map itself never changes hands, so every task stays reachable
//! through the same pool id. The pool-wide admission gate is grown or shrunk
//! to the new capacity before the lock is released; slots still held by
//! running tasks on a shrink are retired as those tasks finish, ahead of any
//! waiting worker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::worker_pool::{runtime_handle, WorkerPool};
use super::worker_set::WorkerSet;
use super::PoolStatus;
use crate::error::{ManagerError, Result};
use crate::task::{Task, TaskStatus};

/// Upper bound for [`ResizeInfo::suggested_max_workers`]
pub const MAX_SUGGESTED_WORKERS: usize = 100;

/// Outcome of a resize request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResizeResult {
    pub success: bool,
    pub pool_id: Uuid,
    pub old_max_workers: usize,
    pub new_max_workers: usize,
    /// Pending tasks moved onto the new worker set
    pub migrated_tasks: usize,
    /// Running tasks left to finish on the previous worker set
    pub preserved_running: usize,
    /// Terminal tasks at the time of the resize
    pub completed_tasks: usize,
    pub message: String,
}

/// Current capacity and load, with a capacity suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResizeInfo {
    pub pool_id: Uuid,
    pub name: String,
    pub current_max_workers: usize,
    pub active_tasks: usize,
    pub can_resize: bool,
    pub status: PoolStatus,
    pub suggested_max_workers: usize,
}

impl ResizeResult {
    fn unchanged(pool_id: Uuid, capacity: usize, success: bool, message: String) -> Self {
        Self {
            success,
            pool_id,
            old_max_workers: capacity,
            new_max_workers: capacity,
            migrated_tasks: 0,
            preserved_running: 0,
            completed_tasks: 0,
            message,
        }
    }
}

/// Capacity matching the current demand: the number of active tasks capped
/// at [`MAX_SUGGESTED_WORKERS`], or the current capacity for an idle pool.
pub(crate) fn suggested_capacity(current: usize, active: usize) -> usize {
    if active == 0 {
        current
    } else {
        active.clamp(1, MAX_SUGGESTED_WORKERS)
    }
}

impl WorkerPool {
    /// Change the number of concurrent workers of a live pool
    ///
    /// Fails with `InvalidPoolState` unless the pool is running and with
    /// `InvalidParameter` for a capacity below one. The whole migration runs
    /// under the pool lock; a failure before the swap leaves the pool as it
    /// was and is reported as `success: false`.
    pub fn resize(&self, new_capacity: usize) -> Result<ResizeResult> {
        let mut state = self.state.lock();
        if state.status != PoolStatus::Running || state.workers.is_none() {
            return Err(self.not_running(state.status));
        }
        if new_capacity < 1 {
            return Err(ManagerError::invalid_parameter(
                "max_workers must be at least 1",
            ));
        }

        let old_capacity = state.capacity;
        if new_capacity == old_capacity {
            return Ok(ResizeResult::unchanged(
                self.id(),
                old_capacity,
                true,
                format!("pool already has {} workers", old_capacity),
            ));
        }

        let handle = match runtime_handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(pool_id = %self.id(), error = %e, "Resize aborted");
                return Ok(ResizeResult::unchanged(
                    self.id(),
                    old_capacity,
                    false,
                    e.to_string(),
                ));
            }
        };

        // Settle capacity before any new worker can wait for a slot
        if new_capacity > old_capacity {
            self.admission.grow(new_capacity - old_capacity);
        } else {
            self.admission.shrink(old_capacity - new_capacity);
        }

        let generation = state.generation + 1;
        let next = WorkerSet::spawn(
            &handle,
            self.id(),
            generation,
            new_capacity,
            self.admission.clone(),
            self.cancel.clone(),
        );

        // Oldest first so the new queue keeps submission order
        let mut tasks: Vec<Arc<Task>> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|task| task.seq());

        let (mut migrated, mut running, mut terminal) = (0, 0, 0);
        for task in tasks {
            match task.reassign(generation) {
                TaskStatus::Pending => {
                    if let Err(task) = next.enqueue(task) {
                        task.fail_pending(format!(
                            "could not re-enqueue task on worker set {}",
                            generation
                        ));
                        continue;
                    }
                    migrated += 1;
                }
                TaskStatus::Running => running += 1,
                _ => terminal += 1,
            }
        }

        let previous = state.workers.replace(next);
        state.capacity = new_capacity;
        state.generation = generation;

        state.retired.retain(|set| !set.is_drained());
        if let Some(previous) = previous {
            let retired = previous.retire();
            let watcher = retired.clone();
            let pool_id = self.id();
            handle.spawn(async move {
                watcher.drained().await;
                debug!(%pool_id, generation = watcher.generation, "Worker set drained");
            });
            state.retired.push(retired);
        }

        info!(
            pool_id = %self.id(),
            old_max_workers = old_capacity,
            new_max_workers = new_capacity,
            migrated_tasks = migrated,
            preserved_running = running,
            completed_tasks = terminal,
            "Pool resized"
        );

        Ok(ResizeResult {
            success: true,
            pool_id: self.id(),
            old_max_workers: old_capacity,
            new_max_workers: new_capacity,
            migrated_tasks: migrated,
            preserved_running: running,
            completed_tasks: terminal,
            message: format!(
                "pool resized from {} to {} workers",
                old_capacity, new_capacity
            ),
        })
    }

    /// Capacity, load and a suggested capacity
    pub fn get_resize_info(&self) -> ResizeInfo {
        let state = self.state.lock();
        let active = state
            .tasks
            .values()
            .filter(|task| !task.is_terminal())
            .count();
        ResizeInfo {
            pool_id: self.id(),
            name: self.name().to_string(),
            current_max_workers: state.capacity,
            active_tasks: active,
            can_resize: state.status == PoolStatus::Running,
            status: state.status,
            suggested_max_workers: suggested_capacity(state.capacity, active),
        }
    }
}
