use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ManagerError, Result};
use crate::pool::WorkerPool;
use crate::task::Task;

/// Pools by id plus the global task index
///
/// One lock covers both maps so name checks, task indexing and pool removal
/// are atomic with respect to each other. Pool internals are reached only
/// through the pool's own lock, always taken after this one.
#[derive(Default)]
pub(crate) struct Registry {
    state: RwLock<RegistryState>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) pools: HashMap<Uuid, Arc<WorkerPool>>,
    pub(crate) tasks: HashMap<Uuid, Arc<Task>>,
}

impl Registry {
    pub(crate) fn read(&self) -> parking_lot::RwLockReadGuard<'_, RegistryState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> parking_lot::RwLockWriteGuard<'_, RegistryState> {
        self.state.write()
    }

    pub(crate) fn pool(&self, pool_id: Uuid) -> Result<Arc<WorkerPool>> {
        self.state
            .read()
            .pools
            .get(&pool_id)
            .cloned()
            .ok_or(ManagerError::PoolNotFound(pool_id))
    }

    pub(crate) fn task(&self, task_id: Uuid) -> Result<Arc<Task>> {
        self.state
            .read()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(ManagerError::TaskNotFound(task_id))
    }

    /// Drop terminal tasks from the global index and from every pool
    ///
    /// Returns the number of distinct tasks removed.
    pub(crate) fn cleanup_completed_tasks(&self) -> usize {
        let mut state = self.state.write();
        let mut removed: HashSet<Uuid> = state
            .tasks
            .iter()
            .filter(|(_, task)| task.is_terminal())
            .map(|(id, _)| *id)
            .collect();
        for id in &removed {
            state.tasks.remove(id);
        }
        for pool in state.pools.values() {
            removed.extend(pool.cleanup_completed_tasks());
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Cleaned up completed tasks");
        }
        removed.len()
    }

    /// Drop every pool that is Stopped or Terminated; returns how many
    pub(crate) fn clear_stopped_pools(&self) -> usize {
        let mut state = self.state.write();
        let before = state.pools.len();
        state.pools.retain(|pool_id, pool| {
            let keep = !pool.status().is_terminal();
            if !keep {
                debug!(%pool_id, "Removing stopped pool");
            }
            keep
        });
        let removed = before - state.pools.len();
        if removed > 0 {
            info!(count = removed, "Cleared stopped pools");
        }
        removed
    }

    /// One cleanup pass: terminal tasks first, then stopped pools
    pub(crate) fn sweep(&self) -> (usize, usize) {
        (self.cleanup_completed_tasks(), self.clear_stopped_pools())
    }
}
