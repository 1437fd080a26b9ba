//! Generation-tagged worker sets
//!
//! A pool owns exactly one *current* worker set. Resizing builds a new set
//! with the next generation number, moves pending tasks onto it and retires
//! the old one. A retired set stops receiving work but its workers stay alive
//! until the tasks they already started finish; nothing force-stops them.
//!
//! ```text
//!  submit ──► queue(gen N) ──► worker ─┐
//!                             worker ─┼─► admission (pool-wide) ─► body
//!                             worker ─┘
//! ```
//!
//! Every worker takes a slot from the pool-wide [`Admission`] gate before
//! moving a task to Running, so the number of running tasks across all
//! generations never grows past the pool capacity.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};
use uuid::Uuid;

use super::admission::Admission;
use crate::task::{Completion, Task, TaskStatus};

type TaskQueue = Arc<AsyncMutex<mpsc::UnboundedReceiver<Arc<Task>>>>;

/// The workers of one pool generation and the queue feeding them
pub(crate) struct WorkerSet {
    generation: u64,
    capacity: usize,
    queue: mpsc::UnboundedSender<Arc<Task>>,
    tracker: TaskTracker,
}

impl WorkerSet {
    /// Spawn `capacity` workers for `generation` on the given runtime
    pub(crate) fn spawn(
        handle: &Handle,
        pool_id: Uuid,
        generation: u64,
        capacity: usize,
        admission: Arc<Admission>,
        stop: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx: TaskQueue = Arc::new(AsyncMutex::new(rx));
        let tracker = TaskTracker::new();

        for worker in 0..capacity {
            let worker_loop = run_worker(
                pool_id,
                generation,
                worker,
                rx.clone(),
                admission.clone(),
                stop.clone(),
            );
            tracker.spawn_on(worker_loop, handle);
        }
        tracker.close();

        debug!(%pool_id, generation, capacity, "Worker set started");

        Self {
            generation,
            capacity,
            queue: tx,
            tracker,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a task for this generation; hands the task back if the workers are gone
    pub(crate) fn enqueue(&self, task: Arc<Task>) -> Result<(), Arc<Task>> {
        self.queue.send(task).map_err(|e| e.0)
    }

    /// Stop feeding this set. Workers finish what they started, skip
    /// anything reassigned, and exit once the queue is empty.
    pub(crate) fn retire(self) -> RetiredSet {
        RetiredSet {
            generation: self.generation,
            tracker: self.tracker,
        }
    }
}

/// A worker set that no longer accepts work but may still be draining
#[derive(Clone)]
pub(crate) struct RetiredSet {
    pub(crate) generation: u64,
    tracker: TaskTracker,
}

impl RetiredSet {
    /// All workers of this set have exited
    pub(crate) fn is_drained(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Resolve once every worker of this set has exited
    pub(crate) async fn drained(&self) {
        self.tracker.wait().await
    }
}

async fn run_worker(
    pool_id: Uuid,
    generation: u64,
    worker: usize,
    queue: TaskQueue,
    admission: Arc<Admission>,
    stop: CancellationToken,
) {
    trace!(%pool_id, generation, worker, "Worker started");

    loop {
        let task = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = async { queue.lock().await.recv().await } => match next {
                Some(task) => task,
                None => break,
            },
        };

        // Cancelled or migrated while queued
        if task.status() != TaskStatus::Pending || task.generation() != generation {
            continue;
        }

        let slot = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            slot = admission.acquire() => match slot {
                Some(slot) => slot,
                None => break,
            },
        };

        let Some((work, ctx)) = task.begin(generation) else {
            continue;
        };

        trace!(%pool_id, task_id = %task.id(), generation, worker, "Task started");
        let result = work.run(ctx.clone()).await;
        let completion = match result {
            Ok(value) => Completion::Succeeded(value),
            Err(_) if ctx.is_cancelled() => Completion::Cancelled,
            Err(e) => Completion::Failed(format!("{:#}", e)),
        };
        task.complete(completion);
        drop(slot);
    }

    trace!(%pool_id, generation, worker, "Worker exited");
}
