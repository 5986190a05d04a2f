//! Consumer Worker Pool
//!
//! Drives `QueueConsumer::run_once` from a fixed number of tokio tasks. Workers share one
//! consumer and rely on the queue for mutual exclusion, so adding workers needs no coordination.
//!
//! ## Responsibilities
//! - **Polling**: each worker loops on `run_once`, which itself waits for work.
//! - **Back-off**: an idle pass is followed by a short jittered sleep so workers do not poll
//!   in lockstep.
//! - **Shutdown**: cancellation drops a worker's current pass wherever it is, including in the
//!   middle of a batch. Envelopes it claimed but did not settle reappear once their visibility
//!   timeout passes, and the idempotent write makes that redelivery harmless.

use super::consumer::QueueConsumer;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const IDLE_BACKOFF_MS: u64 = 50;

pub struct ConsumerPool {
    consumer: Arc<QueueConsumer>,
    worker_count: usize,
}

impl ConsumerPool {
    pub fn new(consumer: Arc<QueueConsumer>, worker_count: usize) -> Arc<Self> {
        Arc::new(Self {
            consumer,
            worker_count: worker_count.max(1),
        })
    }

    /// Spawns the workers and returns their handles immediately.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!(
            queue = self.consumer.queue().name(),
            workers = self.worker_count,
            "Starting consumer workers"
        );

        (0..self.worker_count)
            .map(|worker_id| {
                let pool = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id, shutdown).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, shutdown: CancellationToken) {
        tracing::info!(worker_id, "Consumer worker started");

        loop {
            let report = tokio::select! {
                _ = shutdown.cancelled() => break,
                report = self.consumer.run_once() => report,
            };

            if report.is_idle() {
                let jitter = rand::random::<u64>() % IDLE_BACKOFF_MS;
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(IDLE_BACKOFF_MS + jitter)) => {}
                }
                continue;
            }

            tracing::trace!(worker_id, received = report.received, "Worker finished batch");
        }

        tracing::info!(worker_id, "Consumer worker stopped");
    }
}
