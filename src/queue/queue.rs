//! Durable Queue
//!
//! Holds envelopes between the topic and the consumers with at-least-once semantics.
//!
//! ## Responsibilities
//! - **Claiming**: `receive` moves envelopes from `Pending` to `InFlight`. The claim re-checks the
//!   envelope state under its map entry lock, so two receivers can never hold the same envelope.
//! - **Visibility**: an in-flight envelope carries a deadline. Once it passes, the envelope is
//!   receivable again; this is the only retry mechanism.
//! - **Disposal**: `acknowledge` removes an envelope, `release` hands it back early. Both
//!   require the `ReceiptHandle` of the current claim; a handle from an earlier receive of the
//!   same envelope is rejected.
//! - **Dead-lettering**: an envelope delivered `max_receive_count` times without acknowledgment is
//!   parked as `DeadLettered` the next time it comes back from flight.

use super::types::*;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

enum Claim {
    Delivered(MessageEnvelope),
    DeadLettered,
    Lost,
}

enum Return {
    Requeued,
    DeadLettered,
}

pub struct DurableQueue {
    name: String,
    config: QueueConfig,
    /// Structure: `Delivery ID -> QueueEntry`.
    entries: DashMap<DeliveryId, QueueEntry>,
    sequence: AtomicU64,
    /// Source of receipt handles. Starts at 1 so the default handle never matches.
    claims: AtomicU64,
    /// Signalled whenever an envelope becomes receivable.
    notify: Notify,
}

impl DurableQueue {
    pub fn new(name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            name: name.into(),
            config,
            entries: DashMap::new(),
            sequence: AtomicU64::new(0),
            claims: AtomicU64::new(1),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Adds a fresh envelope in the `Pending` state and wakes waiting receivers.
    ///
    /// `max_depth` is a soft limit: concurrent enqueues may overshoot it by the
    /// number of racing producers.
    pub fn enqueue(
        &self,
        message_id: MessageId,
        payload: Message,
        published_at: u64,
    ) -> Result<DeliveryId, QueueError> {
        if let Some(max_depth) = self.config.max_depth {
            let depth = self.depth();
            if depth >= max_depth {
                tracing::warn!(queue = %self.name, depth, "Queue full, rejecting envelope");
                return Err(QueueError::Full {
                    queue: self.name.clone(),
                    depth,
                });
            }
        }

        let delivery_id = DeliveryId::new();
        let entry = QueueEntry {
            envelope: MessageEnvelope {
                delivery_id: delivery_id.clone(),
                message_id,
                receive_count: 0,
                published_at,
                payload,
                receipt_handle: ReceiptHandle::default(),
            },
            state: EnvelopeState::Pending,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };

        tracing::debug!(
            queue = %self.name,
            delivery_id = %delivery_id,
            message_id = %entry.envelope.message_id,
            "Enqueued envelope"
        );

        self.entries.insert(delivery_id.clone(), entry);
        self.notify.notify_waiters();

        Ok(delivery_id)
    }

    /// Claims up to `max_batch` receivable envelopes, oldest first.
    ///
    /// Each returned envelope is `InFlight` until `visibility_timeout` elapses,
    /// and its `receive_count` has been incremented.
    pub fn receive(&self, max_batch: usize, visibility_timeout: Duration) -> Vec<MessageEnvelope> {
        if max_batch == 0 {
            return Vec::new();
        }

        let now = Instant::now();

        // Snapshot first: claiming needs the entry's write lock, which must not
        // be taken while an iterator holds the shard.
        let mut candidates: Vec<(u64, DeliveryId)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_receivable(now))
            .map(|entry| (entry.value().sequence, entry.key().clone()))
            .collect();
        candidates.sort_unstable_by_key(|(sequence, _)| *sequence);

        let mut batch = Vec::new();
        for (_, delivery_id) in candidates {
            if batch.len() >= max_batch {
                break;
            }

            match self.try_claim(&delivery_id, now, visibility_timeout) {
                Claim::Delivered(envelope) => batch.push(envelope),
                Claim::DeadLettered => {}
                Claim::Lost => {
                    tracing::trace!(delivery_id = %delivery_id, "Envelope claimed by another receiver");
                }
            }
        }

        if !batch.is_empty() {
            tracing::debug!(queue = %self.name, count = batch.len(), "Received batch");
        }

        batch
    }

    /// Like `receive`, but waits up to `wait` for an envelope to become receivable.
    ///
    /// Wakes on enqueue/release notifications and on the earliest visibility
    /// deadline, whichever comes first.
    pub async fn receive_wait(
        &self,
        max_batch: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Vec<MessageEnvelope> {
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.receive(max_batch, visibility_timeout);
            if !batch.is_empty() || max_batch == 0 || Instant::now() >= deadline {
                return batch;
            }

            let wake_at = match self.next_visible_at() {
                Some(visible_at) if visible_at < deadline => visible_at,
                _ => deadline,
            };
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    /// Removes an in-flight envelope permanently.
    ///
    /// Fails with `NotFound` unless `receipt_handle` belongs to a claim that is
    /// still held at the time of the call. Already acknowledged, released,
    /// expired, dead-lettered, and re-received envelopes all fail.
    pub fn acknowledge(
        &self,
        delivery_id: &DeliveryId,
        receipt_handle: ReceiptHandle,
    ) -> Result<(), QueueError> {
        let now = Instant::now();

        match self
            .entries
            .remove_if(delivery_id, |_, entry| entry.is_held_by(receipt_handle, now))
        {
            Some(_) => {
                tracing::debug!(queue = %self.name, delivery_id = %delivery_id, "Acknowledged envelope");
                Ok(())
            }
            None => {
                tracing::debug!(
                    queue = %self.name,
                    delivery_id = %delivery_id,
                    receipt_handle = %receipt_handle,
                    "Acknowledgment rejected, claim no longer held"
                );
                Err(QueueError::NotFound(delivery_id.clone()))
            }
        }
    }

    /// Returns an in-flight envelope to `Pending` immediately (or dead-letters it
    /// when its retry budget is spent).
    ///
    /// Returns `false` when the envelope is not in flight under `receipt_handle`.
    /// A holder whose deadline passed may still release, as long as nobody has
    /// received the envelope since.
    pub fn release(&self, delivery_id: &DeliveryId, receipt_handle: ReceiptHandle) -> bool {
        let released = match self.entries.get_mut(delivery_id) {
            Some(mut entry) if entry.is_claimed_by(receipt_handle) => {
                self.return_from_flight(entry.value_mut());
                true
            }
            _ => false,
        };

        if released {
            tracing::debug!(queue = %self.name, delivery_id = %delivery_id, "Released envelope");
            self.notify.notify_waiters();
        }

        released
    }

    /// Moves every in-flight envelope whose visibility deadline has passed back
    /// to `Pending` or `DeadLettered`.
    pub fn reap_expired(&self) -> ReapSummary {
        let now = Instant::now();
        let mut summary = ReapSummary::default();

        for mut entry in self.entries.iter_mut() {
            if !entry.is_expired(now) {
                continue;
            }
            match self.return_from_flight(entry.value_mut()) {
                Return::Requeued => summary.requeued += 1,
                Return::DeadLettered => summary.dead_lettered += 1,
            }
        }

        if summary.requeued > 0 {
            tracing::debug!(
                queue = %self.name,
                requeued = summary.requeued,
                "Visibility timeout expired for in-flight envelopes"
            );
            self.notify.notify_waiters();
        }

        summary
    }

    /// Dead-lettered envelopes, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let mut parked: Vec<(u64, DeadLetter)> = self
            .entries
            .iter()
            .filter_map(|entry| match entry.state {
                EnvelopeState::DeadLettered { at } => Some((
                    entry.sequence,
                    DeadLetter {
                        envelope: entry.envelope.clone(),
                        dead_lettered_at: at,
                    },
                )),
                _ => None,
            })
            .collect();
        parked.sort_unstable_by_key(|(sequence, _)| *sequence);
        parked.into_iter().map(|(_, dead_letter)| dead_letter).collect()
    }

    /// Operator action: returns every dead-lettered envelope to `Pending` with a
    /// reset receive count. Returns how many were moved.
    pub fn redrive_dead_letters(&self) -> usize {
        let mut redriven = 0;

        for mut entry in self.entries.iter_mut() {
            if entry.is_dead_lettered() {
                entry.state = EnvelopeState::Pending;
                entry.envelope.receive_count = 0;
                redriven += 1;
            }
        }

        if redriven > 0 {
            tracing::info!(queue = %self.name, redriven, "Redrove dead-lettered envelopes");
            self.notify.notify_waiters();
        }

        redriven
    }

    pub fn stats(&self) -> QueueStats {
        let now = Instant::now();
        let mut stats = QueueStats {
            queue: self.name.clone(),
            pending: 0,
            in_flight: 0,
            dead_lettered: 0,
        };

        for entry in self.entries.iter() {
            if entry.is_dead_lettered() {
                stats.dead_lettered += 1;
            } else if entry.is_held(now) {
                stats.in_flight += 1;
            } else {
                stats.pending += 1;
            }
        }

        stats
    }

    /// Number of envelopes that are not dead-lettered.
    pub fn depth(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dead_lettered())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn try_claim(&self, delivery_id: &DeliveryId, now: Instant, visibility_timeout: Duration) -> Claim {
        let Some(mut entry) = self.entries.get_mut(delivery_id) else {
            return Claim::Lost;
        };

        // The snapshot is stale by now; only the state under the lock counts.
        if !entry.is_receivable(now) {
            return Claim::Lost;
        }

        if entry.envelope.receive_count >= self.config.max_receive_count {
            self.dead_letter(entry.value_mut());
            return Claim::DeadLettered;
        }

        let receipt_handle = ReceiptHandle(self.claims.fetch_add(1, Ordering::Relaxed));
        entry.envelope.receive_count += 1;
        entry.envelope.receipt_handle = receipt_handle;
        entry.state = EnvelopeState::InFlight {
            visible_at: now + visibility_timeout,
            receipt_handle,
        };

        tracing::debug!(
            queue = %self.name,
            delivery_id = %delivery_id,
            receive_count = entry.envelope.receive_count,
            "Claimed envelope"
        );

        Claim::Delivered(entry.envelope.clone())
    }

    fn return_from_flight(&self, entry: &mut QueueEntry) -> Return {
        if entry.envelope.receive_count >= self.config.max_receive_count {
            self.dead_letter(entry);
            Return::DeadLettered
        } else {
            entry.state = EnvelopeState::Pending;
            entry.envelope.receipt_handle = ReceiptHandle::default();
            Return::Requeued
        }
    }

    fn dead_letter(&self, entry: &mut QueueEntry) {
        entry.state = EnvelopeState::DeadLettered { at: now_ms() };
        entry.envelope.receipt_handle = ReceiptHandle::default();
        tracing::warn!(
            queue = %self.name,
            delivery_id = %entry.envelope.delivery_id,
            message_id = %entry.envelope.message_id,
            receive_count = entry.envelope.receive_count,
            "Envelope exhausted its receive budget, dead-lettered"
        );
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.state {
                EnvelopeState::InFlight { visible_at, .. } => Some(visible_at),
                _ => None,
            })
            .min()
    }
}
