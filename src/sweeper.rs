//! Background Expiry Sweep
//!
//! In-process stores reclaim expired entries on a fixed interval so keys that
//! are never read again still free their memory. The task is owned by the
//! store through a [`SweepHandle`]: `stop()` signals shutdown and waits for
//! the loop to exit, and dropping the handle aborts the task.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle owning a running sweep task
#[derive(Debug)]
pub(crate) struct SweepHandle {
    handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SweepHandle {
    /// Spawn `sweep` every `interval` on the current Tokio runtime.
    ///
    /// `sweep` returns how many entries it removed. Returns `None` without
    /// spawning when `interval` is zero or no runtime is available; the store
    /// then relies on lazy expiry alone.
    pub(crate) fn spawn<F, Fut>(name: &'static str, interval: Duration, mut sweep: F) -> Option<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = usize> + Send + 'static,
    {
        if interval.is_zero() {
            debug!(backend = name, "Expiry sweep disabled (zero interval)");
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(backend = name, "No Tokio runtime; expiry sweep not started");
            return None;
        };

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = runtime.spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(backend = name, interval = ?interval, "Expiry sweep started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!(backend = name, "Expiry sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = sweep().await;
                        if removed > 0 {
                            debug!(backend = name, removed, "Expiry sweep removed entries");
                        }
                    }
                }
            }
        });

        Some(Self {
            handle,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Signal shutdown and wait for the task to exit
    pub(crate) async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                warn!(error = %e, "Expiry sweep task ended abnormally");
            }
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        // Still armed means the owner went away without stop().
        if self.shutdown.is_some() {
            self.handle.abort();
        }
    }
}
