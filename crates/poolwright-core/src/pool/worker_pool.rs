use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::admission::Admission;
use super::worker_set::{RetiredSet, WorkerSet};
use super::{default_name, PoolInfo, PoolStatus};
use crate::error::{ManagerError, Result};
use crate::task::{Task, TaskInfo, TaskStatus, TaskWork};

/// A named pool of bounded worker capacity
///
/// Every mutation of status, capacity or the task set happens under the pool
/// lock. The lock is a plain `parking_lot` mutex and is never held across an
/// `.await`; `shutdown(true)` collects what it needs, releases it, then waits.
pub struct WorkerPool {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    /// Admission into Running; holds `capacity` slots
    pub(super) admission: Arc<Admission>,
    /// Parent of every task token; cancelled by `shutdown_now`
    pub(super) cancel: CancellationToken,
    pub(super) state: Mutex<PoolState>,
}

pub(super) struct PoolState {
    pub(super) status: PoolStatus,
    pub(super) capacity: usize,
    pub(super) generation: u64,
    /// Current worker set; `None` once shut down
    pub(super) workers: Option<WorkerSet>,
    /// Older generations still finishing the tasks they started
    pub(super) retired: Vec<RetiredSet>,
    pub(super) tasks: HashMap<Uuid, Arc<Task>>,
}

impl WorkerPool {
    /// Create a pool and start its first worker set
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(id: Uuid, name: impl Into<String>, capacity: usize) -> Result<Arc<Self>> {
        if capacity < 1 {
            return Err(ManagerError::invalid_parameter(
                "max_workers must be at least 1",
            ));
        }
        let handle = runtime_handle()?;
        let admission = Arc::new(Admission::new(capacity));
        let cancel = CancellationToken::new();
        let workers = WorkerSet::spawn(&handle, id, 0, capacity, admission.clone(), cancel.clone());

        Ok(Arc::new(Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            admission,
            cancel,
            state: Mutex::new(PoolState {
                status: PoolStatus::Running,
                capacity,
                generation: 0,
                workers: Some(workers),
                retired: Vec::new(),
                tasks: HashMap::new(),
            }),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> PoolStatus {
        self.state.lock().status
    }

    pub fn max_workers(&self) -> usize {
        self.state.lock().capacity
    }

    /// Submit work; returns the new task's id
    pub fn submit(&self, work: TaskWork, name: Option<String>) -> Result<Uuid> {
        self.submit_task(work, name).map(|task| task.id())
    }

    /// Submit work and hand back the shared task record
    ///
    /// The running check, task registration and dispatch happen under one
    /// lock acquisition, so a submit can never land on a worker set that a
    /// concurrent resize or shutdown has already retired.
    pub(crate) fn submit_task(&self, work: TaskWork, name: Option<String>) -> Result<Arc<Task>> {
        let mut state = self.state.lock();
        let generation = match (&state.status, &state.workers) {
            (PoolStatus::Running, Some(workers)) => workers.generation(),
            _ => return Err(self.not_running(state.status)),
        };

        let task_id = Uuid::now_v7();
        let name = name.unwrap_or_else(|| default_name("task", task_id));
        let task = Task::new(
            task_id,
            name,
            self.id,
            work,
            generation,
            self.cancel.child_token(),
        );
        state.tasks.insert(task_id, task.clone());

        let dispatched = match &state.workers {
            Some(workers) => workers.enqueue(task.clone()).is_ok(),
            None => false,
        };
        if !dispatched {
            warn!(pool_id = %self.id, %task_id, "Worker set unavailable, failing task");
            task.fail_pending("worker set unavailable".to_string());
        }

        debug!(pool_id = %self.id, %task_id, generation, "Task submitted");
        Ok(task)
    }

    /// Best-effort cancellation of one task; see [`Task::cancel`]
    pub fn cancel(&self, task_id: Uuid) -> bool {
        self.get_task(task_id)
            .map(|task| task.cancel())
            .unwrap_or(false)
    }

    /// Cancel every task that is still pending; returns how many were cancelled
    pub fn cancel_pending(&self) -> usize {
        let state = self.state.lock();
        let cancelled = state
            .tasks
            .values()
            .filter(|task| task.cancel_pending())
            .count();
        if cancelled > 0 {
            info!(pool_id = %self.id, cancelled, "Cancelled pending tasks");
        }
        cancelled
    }

    pub fn get_task(&self, task_id: Uuid) -> Option<Arc<Task>> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    /// Every tracked task, oldest submission first
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        let mut tasks: Vec<_> = self.state.lock().tasks.values().cloned().collect();
        tasks.sort_by_key(|task| task.seq());
        tasks
    }

    pub fn list_tasks(&self) -> Vec<TaskInfo> {
        self.tasks().iter().map(|task| task.info()).collect()
    }

    /// Tasks that are pending or running
    pub fn active_tasks(&self) -> Vec<Arc<Task>> {
        self.tasks()
            .into_iter()
            .filter(|task| !task.is_terminal())
            .collect()
    }

    /// Drop terminal tasks from the task set; returns their ids
    pub fn cleanup_completed_tasks(&self) -> Vec<Uuid> {
        let mut state = self.state.lock();
        let done: Vec<Uuid> = state
            .tasks
            .iter()
            .filter(|(_, task)| task.is_terminal())
            .map(|(id, _)| *id)
            .collect();
        for id in &done {
            state.tasks.remove(id);
        }
        state.retired.retain(|set| !set.is_drained());
        done
    }

    /// Graceful shutdown
    ///
    /// Stops accepting work. With `wait` the call resolves once every
    /// accepted task has finished and the pool ends `Terminated`; without it
    /// the pool is `Stopped` right away and queued work finishes on its own.
    /// No-op unless the pool is `Running`.
    pub async fn shutdown(&self, wait: bool) {
        let draining = {
            let mut state = self.state.lock();
            if state.status != PoolStatus::Running {
                return;
            }
            state.status = if wait {
                PoolStatus::Shutdown
            } else {
                PoolStatus::Stopped
            };
            let mut draining = std::mem::take(&mut state.retired);
            if let Some(workers) = state.workers.take() {
                draining.push(workers.retire());
            }
            draining
        };

        info!(pool_id = %self.id, name = %self.name, wait, "Shutting down pool");

        if wait {
            for set in &draining {
                set.drained().await;
            }
            let mut state = self.state.lock();
            // shutdown_now may have won the race while we were draining
            if state.status == PoolStatus::Shutdown {
                state.status = PoolStatus::Terminated;
                info!(pool_id = %self.id, "Pool terminated");
            }
        }
    }

    /// Immediate shutdown
    ///
    /// Pending tasks are cancelled, running tasks receive the cooperative
    /// cancellation signal, and workers stop picking up work. Returns the ids
    /// of every task that was pending or running at the time of the call.
    pub fn shutdown_now(&self) -> Vec<Uuid> {
        let active: Vec<Arc<Task>> = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return Vec::new();
            }
            state.status = PoolStatus::Stopped;
            state.workers = None;
            state.retired.clear();

            let mut active: Vec<_> = state
                .tasks
                .values()
                .filter(|task| !task.is_terminal())
                .cloned()
                .collect();
            active.sort_by_key(|task| task.seq());
            for task in &active {
                task.cancel();
            }
            active
        };

        self.cancel.cancel();
        self.admission.close();

        info!(pool_id = %self.id, active = active.len(), "Pool stopped immediately");
        active.iter().map(|task| task.id()).collect()
    }

    /// Point-in-time snapshot
    pub fn get_info(&self) -> PoolInfo {
        let state = self.state.lock();
        let mut info = PoolInfo {
            pool_id: self.id,
            name: self.name.clone(),
            status: state.status,
            max_workers: state.capacity,
            generation: state.generation,
            total_tasks: state.tasks.len(),
            active_tasks: 0,
            pending_tasks: 0,
            running_tasks: 0,
            completed_tasks: 0,
            cancelled_tasks: 0,
            failed_tasks: 0,
        };
        for task in state.tasks.values() {
            match task.status() {
                TaskStatus::Pending => info.pending_tasks += 1,
                TaskStatus::Running => info.running_tasks += 1,
                TaskStatus::Completed => info.completed_tasks += 1,
                TaskStatus::Failed => {
                    info.completed_tasks += 1;
                    info.failed_tasks += 1;
                }
                TaskStatus::Cancelled => {
                    info.completed_tasks += 1;
                    info.cancelled_tasks += 1;
                }
            }
        }
        info.active_tasks = info.pending_tasks + info.running_tasks;
        info
    }

    pub(super) fn not_running(&self, status: PoolStatus) -> ManagerError {
        ManagerError::InvalidPoolState {
            pool_id: self.id,
            status,
            expected: PoolStatus::Running,
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &state.status)
            .field("max_workers", &state.capacity)
            .field("generation", &state.generation)
            .finish()
    }
}

pub(super) fn runtime_handle() -> Result<Handle> {
    Handle::try_current()
        .map_err(|e| ManagerError::Internal(format!("no tokio runtime available: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn quick(value: i64) -> TaskWork {
        TaskWork::from_async(move |_| async move { Ok(json!(value)) })
    }

    /// Blocks until the test adds a permit to `gate`
    fn gated(gate: Arc<Semaphore>) -> TaskWork {
        TaskWork::from_async(move |_| async move {
            gate.acquire().await?.forget();
            Ok(json!("released"))
        })
    }

    fn gate() -> Arc<Semaphore> {
        Arc::new(Semaphore::new(0))
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 2).unwrap();
        let id = pool.submit(quick(7), Some("seven".into())).unwrap();

        let task = pool.get_task(id).unwrap();
        assert_eq!(task.name(), "seven");
        assert_eq!(task.wait(Some(Duration::from_secs(5))).await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_default_task_name() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        let id = pool.submit(quick(1), None).unwrap();
        let task = pool.get_task(id).unwrap();
        assert!(task.name().starts_with("task-"));
        assert_eq!(task.name().len(), "task-".len() + 8);
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let err = WorkerPool::new(Uuid::now_v7(), "p", 0).unwrap_err();
        assert!(matches!(err, ManagerError::InvalidParameter(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_running_never_exceeds_capacity() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 2).unwrap();
        let gate = gate();
        for _ in 0..5 {
            pool.submit(gated(gate.clone()), None).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        let info = pool.get_info();
        assert_eq!(info.running_tasks, 2);
        assert_eq!(info.pending_tasks, 3);
        assert_eq!(info.active_tasks, 5);

        gate.add_permits(5);
        for task in pool.tasks() {
            task.wait(Some(Duration::from_secs(5))).await.unwrap();
        }
        assert_eq!(pool.get_info().completed_tasks, 5);
    }

    #[tokio::test]
    async fn test_cancel_pending_leaves_running() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        let gate = gate();
        let running = pool.submit(gated(gate.clone()), None).unwrap();
        let queued = pool.submit(quick(2), None).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(pool.cancel_pending(), 1);
        assert_eq!(pool.get_task(queued).unwrap().status(), TaskStatus::Cancelled);

        gate.add_permits(1);
        let task = pool.get_task(running).unwrap();
        assert_eq!(
            task.wait(Some(Duration::from_secs(5))).await.unwrap(),
            json!("released")
        );
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        pool.shutdown(false).await;
        assert_eq!(pool.status(), PoolStatus::Stopped);

        let err = pool.submit(quick(1), None).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::InvalidPoolState {
                status: PoolStatus::Stopped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_graceful_shutdown_drains_queue() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        for i in 0..4 {
            pool.submit(quick(i), None).unwrap();
        }
        pool.shutdown(true).await;

        assert_eq!(pool.status(), PoolStatus::Terminated);
        assert!(pool.tasks().iter().all(|t| t.status() == TaskStatus::Completed));

        // Second call is a no-op
        pool.shutdown(true).await;
        assert_eq!(pool.status(), PoolStatus::Terminated);
    }

    #[tokio::test]
    async fn test_shutdown_now_reports_active() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        let gate = gate();
        let running = pool.submit(gated(gate.clone()), None).unwrap();
        let queued = pool.submit(quick(1), None).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut ids = pool.shutdown_now();
        ids.sort();
        let mut expected = vec![running, queued];
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.get_task(queued).unwrap().status(), TaskStatus::Cancelled);
        assert!(pool.get_task(running).unwrap().cancel_requested());
        assert!(pool.shutdown_now().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_completed_tasks() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 2).unwrap();
        let done = pool.submit(quick(1), None).unwrap();
        pool.get_task(done)
            .unwrap()
            .wait(Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let gate = gate();
        let live = pool.submit(gated(gate.clone()), None).unwrap();

        assert_eq!(pool.cleanup_completed_tasks(), vec![done]);
        assert!(pool.get_task(done).is_none());
        assert!(pool.get_task(live).is_some());
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_failing_body_counts_as_failed() {
        let pool = WorkerPool::new(Uuid::now_v7(), "p", 1).unwrap();
        let id = pool
            .submit(
                TaskWork::from_async(|_| async { Err(anyhow::anyhow!("bad input")) }),
                None,
            )
            .unwrap();
        let err = pool
            .get_task(id)
            .unwrap()
            .wait(Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::TaskFailed { .. }));

        let info = pool.get_info();
        assert_eq!(info.failed_tasks, 1);
        assert_eq!(info.completed_tasks, 1);
    }
}
