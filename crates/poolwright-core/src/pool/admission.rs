//! Admission into the Running state
//!
//! A pool-wide semaphore holds one permit per unit of capacity. Shrinking
//! forgets idle permits at once; permits still held by running tasks become
//! debt. A slot released while debt is outstanding is forgotten instead of
//! returned, so a waiting worker never receives it and the pool admits no new
//! work until the running count has fallen below the new capacity.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Capacity gate shared by every worker set of a pool
#[derive(Debug)]
pub(crate) struct Admission {
    permits: Arc<Semaphore>,
    /// Permits to retire as running tasks release them
    debt: Mutex<usize>,
}

impl Admission {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            debt: Mutex::new(0),
        }
    }

    /// Wait for a free slot; `None` once the pool has been stopped
    pub(crate) async fn acquire(self: &Arc<Self>) -> Option<Slot> {
        let permit = self.permits.clone().acquire_owned().await.ok()?;
        Some(Slot {
            permit: Some(permit),
            admission: self.clone(),
        })
    }

    /// Add `n` slots, cancelling outstanding debt first
    pub(crate) fn grow(&self, n: usize) {
        let mut debt = self.debt.lock();
        let repaid = (*debt).min(n);
        *debt -= repaid;
        self.permits.add_permits(n - repaid);
    }

    /// Remove `n` slots; the part currently in use is retired on release
    pub(crate) fn shrink(&self, n: usize) {
        let mut debt = self.debt.lock();
        let forgotten = self.permits.forget_permits(n);
        *debt += n - forgotten;
    }

    /// Wake every waiter with an error; no slot is handed out afterwards
    pub(crate) fn close(&self) {
        self.permits.close();
    }

    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub(crate) fn debt(&self) -> usize {
        *self.debt.lock()
    }

    fn release(&self, permit: OwnedSemaphorePermit) {
        let mut debt = self.debt.lock();
        if *debt > 0 {
            *debt -= 1;
            permit.forget();
        } else {
            drop(permit);
        }
    }
}

/// A held unit of capacity; released (or retired, under debt) on drop
pub(crate) struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    admission: Arc<Admission>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.admission.release(permit);
        }
    }
}
