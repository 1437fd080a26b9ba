//! Task record and state machine
//!
//! ```text
//! ┌─────────┐  begin   ┌─────────┐  finish   ┌───────────┐
//! │ Pending │ ───────► │ Running │ ────────► │ Completed │
//! └─────────┘          └─────────┘     │     ├───────────┤
//!      │                               ├───► │  Failed   │
//!      │            cancel             │     ├───────────┤
//!      └───────────────────────────────┴───► │ Cancelled │
//!                                            └───────────┘
//! ```
//!
//! Terminal states are sticky: every transition checks the current state
//! under the task lock and refuses to leave Completed, Failed or Cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::work::{TaskContext, TaskWork};
use crate::error::{ManagerError, Result};

/// Process-wide submission counter; orders listings
static SUBMISSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting for a worker
    Pending,
    /// A worker is executing the body
    Running,
    /// Body returned a value
    Completed,
    /// Body returned an error (or could not be scheduled)
    Failed,
    /// Cancelled before or while running
    Cancelled,
}

impl TaskStatus {
    /// Completed, Failed and Cancelled are terminal
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Completion message a worker hands back once the body has finished
#[derive(Debug)]
pub(crate) enum Completion {
    Succeeded(serde_json::Value),
    Failed(String),
    Cancelled,
}

/// Read-only task snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskInfo {
    pub task_id: Uuid,
    pub name: String,
    pub pool_id: Uuid,
    pub status: TaskStatus,
    pub submit_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// String form of the result value, set only once Completed
    pub result: Option<String>,
    /// Captured error, set only once Failed
    pub error: Option<String>,
    /// Seconds between start and end (or now, while running)
    pub running_time: Option<f64>,
}

struct TaskState {
    status: TaskStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    /// Taken by the worker that starts the task
    work: Option<TaskWork>,
    /// Generation of the worker set the task is queued on
    generation: u64,
}

/// A submitted unit of work and its tracked lifecycle
///
/// Shared as `Arc<Task>` between the owning pool, the manager's global index
/// and the worker executing it.
pub struct Task {
    id: Uuid,
    seq: u64,
    name: String,
    pool_id: Uuid,
    submit_time: DateTime<Utc>,
    cancel_token: CancellationToken,
    state: Mutex<TaskState>,
    status_tx: watch::Sender<TaskStatus>,
}

impl Task {
    pub(crate) fn new(
        id: Uuid,
        name: String,
        pool_id: Uuid,
        work: TaskWork,
        generation: u64,
        cancel_token: CancellationToken,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        Arc::new(Self {
            id,
            seq: SUBMISSION_SEQ.fetch_add(1, Ordering::Relaxed),
            name,
            pool_id,
            submit_time: Utc::now(),
            cancel_token,
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                start_time: None,
                end_time: None,
                result: None,
                error: None,
                work: Some(work),
                generation,
            }),
            status_tx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    pub fn submit_time(&self) -> DateTime<Utc> {
        self.submit_time
    }

    /// Submission order across the process
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().end_time
    }

    /// Seconds spent running; `None` until the task has started
    pub fn running_time(&self) -> Option<f64> {
        let state = self.state.lock();
        running_seconds(state.start_time, state.end_time)
    }

    /// Generation of the worker set this task is queued on
    pub(crate) fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Move a still-pending task onto another worker set
    ///
    /// Returns the status observed under the task lock; the assignment only
    /// changes when that status is Pending, so a task a worker has already
    /// started is never handed to a second worker.
    pub(crate) fn reassign(&self, generation: u64) -> TaskStatus {
        let mut state = self.state.lock();
        if state.status == TaskStatus::Pending {
            state.generation = generation;
        }
        state.status
    }

    /// Pending → Running, performed by a worker of `generation`
    ///
    /// Yields the body and its context, or `None` when the task was cancelled,
    /// already started, or reassigned to a newer worker set.
    pub(crate) fn begin(&self, generation: u64) -> Option<(TaskWork, TaskContext)> {
        let work = {
            let mut state = self.state.lock();
            if state.status != TaskStatus::Pending || state.generation != generation {
                return None;
            }
            let work = state.work.take()?;
            state.status = TaskStatus::Running;
            state.start_time = Some(Utc::now());
            work
        };
        self.status_tx.send_replace(TaskStatus::Running);
        Some((work, TaskContext::new(self.id, self.cancel_token.clone())))
    }

    /// Apply the worker's completion message
    pub(crate) fn complete(&self, completion: Completion) {
        let status = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return;
            }
            match completion {
                Completion::Succeeded(value) => {
                    state.status = TaskStatus::Completed;
                    state.result = Some(value);
                }
                Completion::Failed(error) => {
                    state.status = TaskStatus::Failed;
                    state.error = Some(error);
                }
                Completion::Cancelled => state.status = TaskStatus::Cancelled,
            }
            state.end_time = Some(Utc::now());
            state.work = None;
            state.status
        };
        self.status_tx.send_replace(status);
    }

    /// Pending → Cancelled; the body is dropped without running
    pub(crate) fn cancel_pending(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.status != TaskStatus::Pending {
                return false;
            }
            state.status = TaskStatus::Cancelled;
            state.end_time = Some(Utc::now());
            state.work = None;
        }
        self.cancel_token.cancel();
        self.status_tx.send_replace(TaskStatus::Cancelled);
        true
    }

    /// Pending → Failed, for tasks that could not be scheduled
    pub(crate) fn fail_pending(&self, error: String) -> bool {
        {
            let mut state = self.state.lock();
            if state.status != TaskStatus::Pending {
                return false;
            }
            state.status = TaskStatus::Failed;
            state.error = Some(error);
            state.end_time = Some(Utc::now());
            state.work = None;
        }
        self.status_tx.send_replace(TaskStatus::Failed);
        true
    }

    /// Best-effort cancellation
    ///
    /// A pending task is cancelled synchronously and `true` is returned. A
    /// running task only receives the cooperative signal: its body already
    /// started, so this returns `false` and the task ends however the body
    /// decides. Terminal tasks are left alone.
    pub fn cancel(&self) -> bool {
        if self.cancel_pending() {
            return true;
        }
        if self.status() == TaskStatus::Running {
            self.cancel_token.cancel();
        }
        false
    }

    /// Whether cancellation has been requested for this task
    pub fn cancel_requested(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Wait for the task to reach a terminal state and return its outcome
    ///
    /// Expiry of `timeout` yields [`ManagerError::Timeout`] and leaves the task
    /// untouched.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<serde_json::Value> {
        let mut rx = self.status_tx.subscribe();
        let terminal = async {
            // The sender lives in `self`, so the channel cannot close here
            let _ = rx.wait_for(|status| status.is_terminal()).await;
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, terminal)
                .await
                .map_err(|_| ManagerError::Timeout(limit))?,
            None => terminal.await,
        }
        self.outcome()
    }

    fn outcome(&self) -> Result<serde_json::Value> {
        let state = self.state.lock();
        match state.status {
            TaskStatus::Completed => Ok(state.result.clone().unwrap_or(serde_json::Value::Null)),
            TaskStatus::Failed => Err(ManagerError::TaskFailed {
                task_id: self.id,
                error: state.error.clone().unwrap_or_default(),
            }),
            _ => Err(ManagerError::TaskCancelled(self.id)),
        }
    }

    /// Snapshot for callers
    pub fn info(&self) -> TaskInfo {
        let state = self.state.lock();
        TaskInfo {
            task_id: self.id,
            name: self.name.clone(),
            pool_id: self.pool_id,
            status: state.status,
            submit_time: self.submit_time,
            start_time: state.start_time,
            end_time: state.end_time,
            result: state.result.as_ref().map(display_value),
            error: state.error.clone(),
            running_time: running_seconds(state.start_time, state.end_time),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pool_id", &self.pool_id)
            .field("status", &self.status())
            .finish()
    }
}

fn running_seconds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let start = start?;
    let end = end.unwrap_or_else(Utc::now);
    Some((end - start).num_milliseconds().max(0) as f64 / 1000.0)
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
