//! Test doubles for the storage layer.

use super::memory::InMemoryStore;
use super::types::{KeyValueStore, PutMode, PutOutcome, Record, StoreError};

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Wraps an `InMemoryStore` and injects faults into writes: a number of
/// `StoreError::Unavailable` failures, and/or a number of slow writes that
/// succeed only after a delay.
pub struct FlakyStore {
    pub inner: Arc<InMemoryStore>,
    failing_puts: AtomicUsize,
    stalled_puts: AtomicUsize,
    stall_ms: AtomicU64,
    pub put_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing_puts: AtomicUsize::new(0),
            stalled_puts: AtomicUsize::new(0),
            stall_ms: AtomicU64::new(0),
            put_attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    pub fn stall_next_puts(&self, count: usize, delay: Duration) {
        self.stall_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self.stalled_puts.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
            remaining.checked_sub(1)
        })
        .is_ok()
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, record: Record, mode: PutMode) -> Result<PutOutcome, StoreError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_puts) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        if take_one(&self.stalled_puts) {
            let delay = Duration::from_millis(self.stall_ms.load(Ordering::SeqCst));
            tokio::time::sleep(delay).await;
        }
        self.inner.put(key, record, mode).await
    }
}
