//! Visibility Sweeper
//!
//! Background task that periodically returns expired in-flight envelopes to the queue.
//! `receive` already treats expired envelopes as receivable, so the sweeper is not needed
//! for redelivery; it keeps `stats()` accurate, dead-letters abandoned envelopes promptly,
//! and wakes receivers blocked in `receive_wait`.

use super::queue::DurableQueue;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the sweep loop. It stops when `shutdown` is cancelled.
pub fn spawn_sweeper(
    queue: Arc<DurableQueue>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(queue = queue.name(), ?interval, "Starting visibility sweeper");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let summary = queue.reap_expired();
                    if summary.requeued > 0 || summary.dead_lettered > 0 {
                        tracing::info!(
                            queue = queue.name(),
                            requeued = summary.requeued,
                            dead_lettered = summary.dead_lettered,
                            "Swept expired envelopes"
                        );
                    }
                }
            }
        }

        tracing::info!(queue = queue.name(), "Visibility sweeper stopped");
    })
}
