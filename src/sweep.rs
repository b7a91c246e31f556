//! Background expiry sweep
//!
//! Periodically purges expired themes so the cache does not hold stale data
//! between reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::theme::{ThemeCoordinator, ThemeFetcher};

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Handle for the background sweep task
///
/// The task stops when `shutdown` is called or the handle is dropped.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Spawns a task that calls `sweep_expired` every `interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(coordinator: Arc<ThemeCoordinator<F>>, interval: Duration) -> Self
    where
        F: ThemeFetcher + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = coordinator.sweep_expired();
                        debug!(removed, "periodic theme sweep");
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self { shutdown_tx, task }
    }

    /// Stops the sweep task and waits for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
