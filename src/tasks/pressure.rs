//! Memory Pressure Task
//!
//! Background task that keeps registered caches within their watermarks and
//! reacts to memory pressure signals.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryPressure;
use crate::store::SharedCache;

/// Spawns a background task that trims `caches` every `interval_secs`.
///
/// When `pressure` is signalled the task reclaims every purgeable value
/// inserted so far and trims immediately, without waiting for the next tick.
/// Trimming a purgeable cache releases the memory of reclaimed values. A
/// signal raised before the task first waits is still honoured.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let stack = open_store(&config).await?;
/// let handle = spawn_pressure_task(stack.caches(), stack.pressure.clone(), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_pressure_task(
    caches: Vec<SharedCache>,
    pressure: MemoryPressure,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting memory pressure task for {} caches with interval of {} seconds",
            caches.len(),
            interval_secs
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    debug!("Periodic trim");
                }
                _ = pressure.notified() => {
                    let epoch = pressure.reclaim();
                    info!(epoch, "Memory pressure signalled, reclaiming cached values");
                }
            }

            for cache in &caches {
                let before = cache.len();
                cache.trim();
                let trimmed = before.saturating_sub(cache.len());
                if trimmed > 0 {
                    debug!(trimmed, remaining = cache.len(), "Trimmed cache");
                }
            }
        }
    })
}
