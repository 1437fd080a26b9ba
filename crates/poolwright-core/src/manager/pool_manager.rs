use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::cleanup::CleanupDaemon;
use super::registry::Registry;
use super::ManagerStats;
use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::pagination::Page;
use crate::pool::{default_name, PoolInfo, ResizeInfo, ResizeResult, WorkerPool};
use crate::task::{Task, TaskInfo, TaskWork};

/// Registry of live pools and the tasks they own
///
/// An explicitly constructed context object: create one at startup, share it
/// (typically as `Arc<PoolManager>`), and call [`PoolManager::shutdown`] once
/// at teardown. Construction starts the cleanup daemon, so it must happen
/// inside a tokio runtime.
///
/// # Example
///
/// ```
/// use poolwright_core::{ManagerConfig, PoolManager, TaskWork};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> poolwright_core::Result<()> {
/// let manager = PoolManager::new(ManagerConfig::default())?;
/// let pool_id = manager.create_pool(Some("reports".into()), Some(2))?;
/// let task_id = manager.submit_task(
///     pool_id,
///     TaskWork::from_async(|_ctx| async { Ok(json!(42)) }),
///     None,
/// )?;
/// assert_eq!(manager.wait_task(task_id, None).await?, json!(42));
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct PoolManager {
    config: ManagerConfig,
    registry: Arc<Registry>,
    daemon: CleanupDaemon,
    shut_down: AtomicBool,
}

impl PoolManager {
    /// Create the registry and start the cleanup daemon
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ManagerError::Internal(format!("no tokio runtime available: {}", e)))?;
        let registry = Arc::new(Registry::default());
        let daemon = CleanupDaemon::start(
            &runtime,
            Arc::downgrade(&registry),
            config.cleanup_interval,
            config.cleanup_join_timeout,
        );

        info!(
            default_max_workers = config.default_max_workers,
            cleanup_interval = ?config.cleanup_interval,
            "Pool manager started"
        );

        Ok(Self {
            config,
            registry,
            daemon,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ---- Pools ----

    /// Create a pool; the name defaults to `pool-` plus part of the id
    ///
    /// Fails with `PoolAlreadyExists` if a live pool has the same name. The
    /// check and the insertion happen under one registry lock.
    #[instrument(skip(self))]
    pub fn create_pool(&self, name: Option<String>, max_workers: Option<usize>) -> Result<Uuid> {
        let max_workers = max_workers.unwrap_or(self.config.default_max_workers);
        let pool_id = Uuid::now_v7();
        let name = match name {
            Some(name) if !name.trim().is_empty() => name,
            _ => default_name("pool", pool_id),
        };

        let mut state = self.registry.write();
        if state.pools.values().any(|pool| pool.name() == name) {
            return Err(ManagerError::PoolAlreadyExists(name));
        }
        let pool = WorkerPool::new(pool_id, name.clone(), max_workers)?;
        state.pools.insert(pool_id, pool);
        drop(state);

        info!(%pool_id, %name, max_workers, "Created pool");
        Ok(pool_id)
    }

    pub fn get_pool(&self, pool_id: Uuid) -> Result<Arc<WorkerPool>> {
        self.registry.pool(pool_id)
    }

    pub fn get_pool_info(&self, pool_id: Uuid) -> Result<PoolInfo> {
        Ok(self.registry.pool(pool_id)?.get_info())
    }

    /// Snapshots of every live pool, oldest first
    pub fn list_pools(&self) -> Vec<PoolInfo> {
        self.pools().iter().map(|pool| pool.get_info()).collect()
    }

    /// Gracefully shut a pool down and remove it
    ///
    /// Terminal tasks of the pool leave the global index with it; tasks still
    /// running after a non-waiting shutdown stay indexed until a cleanup
    /// sweep sees them finish. Returns `false` if the pool vanished while it
    /// was shutting down.
    #[instrument(skip(self))]
    pub async fn close_pool(&self, pool_id: Uuid, wait: bool) -> Result<bool> {
        let pool = self.registry.pool(pool_id)?;

        // Registry lock is not held while draining
        pool.shutdown(wait).await;

        let mut state = self.registry.write();
        state
            .tasks
            .retain(|_, task| task.pool_id() != pool_id || !task.is_terminal());
        let removed = match state.pools.get(&pool_id) {
            Some(current) if Arc::ptr_eq(current, &pool) => state.pools.remove(&pool_id).is_some(),
            _ => false,
        };
        drop(state);

        if removed {
            info!(%pool_id, wait, "Closed pool");
        } else {
            error!(%pool_id, "Pool disappeared while closing");
        }
        Ok(removed)
    }

    /// Stop a pool immediately and forget all of its tasks
    ///
    /// Returns the ids of the tasks that were pending or running.
    #[instrument(skip(self))]
    pub fn force_close_pool(&self, pool_id: Uuid) -> Result<Vec<Uuid>> {
        let mut state = self.registry.write();
        let pool = state
            .pools
            .get(&pool_id)
            .cloned()
            .ok_or(ManagerError::PoolNotFound(pool_id))?;

        let active = pool.shutdown_now();
        state.tasks.retain(|_, task| task.pool_id() != pool_id);
        state.pools.remove(&pool_id);
        drop(state);

        info!(%pool_id, cancelled = active.len(), "Force closed pool");
        Ok(active)
    }

    /// Cancel every pending task of a pool; returns how many were cancelled
    #[instrument(skip(self))]
    pub fn cancel_pool_tasks(&self, pool_id: Uuid) -> Result<usize> {
        let cancelled = self.registry.pool(pool_id)?.cancel_pending();
        info!(%pool_id, cancelled, "Cancelled pool tasks");
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    pub fn resize_pool(&self, pool_id: Uuid, new_max_workers: usize) -> Result<ResizeResult> {
        let pool = self.registry.pool(pool_id)?;
        let result = pool.resize(new_max_workers);
        match &result {
            Ok(r) if r.success => info!(
                %pool_id,
                max_workers = new_max_workers,
                migrated_tasks = r.migrated_tasks,
                completed_tasks = r.completed_tasks,
                "Resized pool"
            ),
            Ok(r) => error!(%pool_id, message = %r.message, "Failed to resize pool"),
            Err(e) => warn!(%pool_id, error = %e, "Resize rejected"),
        }
        result
    }

    pub fn get_pool_resize_info(&self, pool_id: Uuid) -> Result<ResizeInfo> {
        Ok(self.registry.pool(pool_id)?.get_resize_info())
    }

    // ---- Tasks ----

    /// Submit work to a pool and index the new task
    #[instrument(skip(self, work))]
    pub fn submit_task(
        &self,
        pool_id: Uuid,
        work: TaskWork,
        name: Option<String>,
    ) -> Result<Uuid> {
        let pool = self.registry.pool(pool_id)?;
        let task = pool.submit_task(work, name)?;
        let task_id = task.id();
        self.registry.write().tasks.insert(task_id, task);

        info!(%task_id, %pool_id, "Submitted task");
        Ok(task_id)
    }

    pub fn get_task(&self, task_id: Uuid) -> Result<Arc<Task>> {
        self.registry.task(task_id)
    }

    pub fn get_task_info(&self, task_id: Uuid) -> Result<TaskInfo> {
        Ok(self.registry.task(task_id)?.info())
    }

    /// Best-effort cancellation
    ///
    /// Returns `false` for unknown tasks. A task cancelled before it started
    /// also leaves the global index.
    #[instrument(skip(self))]
    pub fn cancel_task(&self, task_id: Uuid) -> bool {
        let Ok(task) = self.registry.task(task_id) else {
            return false;
        };
        let cancelled = match self.registry.pool(task.pool_id()) {
            Ok(pool) => pool.cancel(task_id),
            Err(_) => task.cancel(),
        };

        if cancelled && task.is_terminal() {
            self.registry.write().tasks.remove(&task_id);
        }
        debug!(%task_id, cancelled, "Cancel requested");
        cancelled
    }

    /// Same as [`PoolManager::cancel_task`]; a started body cannot be forced to stop
    pub fn stop_task(&self, task_id: Uuid) -> bool {
        self.cancel_task(task_id)
    }

    /// Wait for a task's outcome; see [`Task::wait`]
    pub async fn wait_task(
        &self,
        task_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let task = self.registry.task(task_id)?;
        task.wait(timeout).await
    }

    /// Task snapshots for one pool, or every pool when `pool_id` is `None`
    ///
    /// The all-pools listing walks live pools only. Tasks whose pool was
    /// closed without waiting, or cleared while they were still active, stay
    /// in the global index until they finish and a sweep removes them: they
    /// are counted by [`PoolManager::get_stats`] and reachable through
    /// [`PoolManager::get_task`] and [`PoolManager::wait_task`], but not
    /// listed here.
    pub fn list_tasks(&self, pool_id: Option<Uuid>) -> Result<Vec<TaskInfo>> {
        match pool_id {
            Some(pool_id) => Ok(self.registry.pool(pool_id)?.list_tasks()),
            None => Ok(self
                .pools()
                .iter()
                .flat_map(|pool| pool.list_tasks())
                .collect()),
        }
    }

    /// One page of [`PoolManager::list_tasks`]
    pub fn list_tasks_page(
        &self,
        pool_id: Option<Uuid>,
        page: usize,
        per_page: usize,
    ) -> Result<Page<TaskInfo>> {
        Ok(Page::paginate(self.list_tasks(pool_id)?, page, per_page))
    }

    pub fn get_stats(&self) -> ManagerStats {
        let state = self.registry.read();
        let total_tasks = state.tasks.len();
        let active_tasks = state
            .tasks
            .values()
            .filter(|task| !task.is_terminal())
            .count();
        ManagerStats {
            total_pools: state.pools.len(),
            total_tasks,
            active_tasks,
            completed_tasks: total_tasks - active_tasks,
        }
    }

    // ---- Cleanup ----

    /// Drop terminal tasks from the index and their pools; returns how many
    pub fn cleanup_completed_tasks(&self) -> usize {
        self.registry.cleanup_completed_tasks()
    }

    /// Drop stopped and terminated pools; returns how many
    pub fn clear_stopped_pools(&self) -> usize {
        self.registry.clear_stopped_pools()
    }

    /// Stop the daemon, force-stop every pool and clear the registry
    ///
    /// Only the first call does anything.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down pool manager");

        self.daemon.stop().await;

        let mut state = self.registry.write();
        for (pool_id, pool) in state.pools.iter() {
            let abandoned = pool.shutdown_now();
            if !abandoned.is_empty() {
                warn!(%pool_id, abandoned = abandoned.len(), "Abandoned active tasks");
            }
        }
        state.pools.clear();
        state.tasks.clear();
        drop(state);

        info!("Pool manager shutdown complete");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Whether the cleanup daemon has exited
    pub fn cleanup_stopped(&self) -> bool {
        self.daemon.is_finished()
    }

    fn pools(&self) -> Vec<Arc<WorkerPool>> {
        let mut pools: Vec<_> = self.registry.read().pools.values().cloned().collect();
        pools.sort_by_key(|pool| (pool.created_at(), pool.id()));
        pools
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.registry.read();
        f.debug_struct("PoolManager")
            .field("pools", &state.pools.len())
            .field("tasks", &state.tasks.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
