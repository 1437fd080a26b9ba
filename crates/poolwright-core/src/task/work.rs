//! Task bodies and the context they run with

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a task body produces
pub type WorkResult = anyhow::Result<serde_json::Value>;

type BoxedWork = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, WorkResult> + Send>;

/// Context handed to a task body
///
/// Cancellation is cooperative: a body that wants to honour `cancel_task`
/// while running must poll [`TaskContext::is_cancelled`] or await
/// [`TaskContext::cancelled`] and bail out with an error.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: Uuid,
    token: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(task_id: Uuid, token: CancellationToken) -> Self {
        Self { task_id, token }
    }

    /// Id of the task being executed
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// A unit of user work, consumed exactly once by the worker that runs it
///
/// # Example
///
/// ```
/// use poolwright_core::TaskWork;
/// use serde_json::json;
///
/// let work = TaskWork::from_async(|_ctx| async move { Ok(json!(3 + 4)) });
/// let blocking = TaskWork::from_blocking(|_ctx| Ok(json!("done")));
/// # drop((work, blocking));
/// ```
pub struct TaskWork {
    run: BoxedWork,
}

impl TaskWork {
    /// Wrap an async body
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self {
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// Wrap a blocking body; it runs on tokio's blocking thread pool
    pub fn from_blocking<F>(f: F) -> Self
    where
        F: FnOnce(TaskContext) -> WorkResult + Send + 'static,
    {
        Self::from_async(move |ctx| async move {
            tokio::task::spawn_blocking(move || f(ctx))
                .await
                .map_err(|e| anyhow::anyhow!("blocking task aborted: {}", e))?
        })
    }

    /// Run the body, turning a panic into an error
    pub(crate) async fn run(self, ctx: TaskContext) -> WorkResult {
        let fut = (self.run)(ctx);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("task panicked: {}", panic_message(&*panic))),
        }
    }
}

impl std::fmt::Debug for TaskWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWork").finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
