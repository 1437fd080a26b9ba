//! Background cleanup daemon
//!
//! Wakes every `cleanup_interval`, drops terminal tasks from the registry and
//! their pools, then drops stopped pools. A failing sweep is logged and the
//! loop carries on. The loop holds only a weak reference to the registry and
//! exits on the shutdown signal or once the registry is gone.

use std::panic::AssertUnwindSafe;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use super::registry::Registry;

/// Handle to the periodic cleanup loop
pub(crate) struct CleanupDaemon {
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    join_timeout: Duration,
}

impl CleanupDaemon {
    pub(crate) fn start(
        runtime: &Handle,
        registry: Weak<Registry>,
        interval: Duration,
        join_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else {
                            debug!("Cleanup loop: registry dropped");
                            break;
                        };
                        match std::panic::catch_unwind(AssertUnwindSafe(|| registry.sweep())) {
                            Ok((tasks, pools)) => {
                                debug!(tasks, pools, "Cleanup sweep finished");
                            }
                            Err(_) => {
                                error!("Cleanup sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Cleanup loop: shutdown requested");
                        break;
                    }
                }
            }

            debug!("Cleanup loop exited");
        });

        Self {
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
            join_timeout,
        }
    }

    /// Ask the loop to exit without waiting for it
    pub(crate) fn signal(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal the loop and wait up to the join timeout for it to exit
    ///
    /// Returns `false` if it did not exit in time; it is aborted then.
    pub(crate) async fn stop(&self) -> bool {
        self.signal();
        let Some(mut handle) = self.handle.lock().take() else {
            return true;
        };
        match tokio::time::timeout(self.join_timeout, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(timeout = ?self.join_timeout, "Cleanup loop did not stop in time");
                handle.abort();
                false
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for CleanupDaemon {
    fn drop(&mut self) {
        self.signal();
    }
}
