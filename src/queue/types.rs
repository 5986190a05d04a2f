use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default number of deliveries an envelope gets before it is dead-lettered.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// Default time an in-flight envelope stays hidden from other receivers.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifier assigned by the queue to one envelope. Stable across redeliveries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the topic to one `publish` call.
///
/// Every copy fanned out from the same call carries the same `MessageId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one specific receive of an envelope.
///
/// Every claim issues a new handle, so a receiver whose visibility timeout has
/// passed cannot settle the claim of whoever received the envelope next. The
/// default handle (`0`) never matches a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub u64);

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A message wrapped with the delivery metadata the queue tracks for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub delivery_id: DeliveryId,
    pub message_id: MessageId,
    /// Number of times this envelope has been handed to a receiver. Always >= 1
    /// on an envelope returned by `receive`.
    pub receive_count: u32,
    /// Milliseconds since the epoch at which the topic accepted the message.
    pub published_at: u64,
    pub payload: Message,
    /// Handle of the receive that returned this copy. Required to acknowledge
    /// or release it.
    #[serde(skip)]
    pub receipt_handle: ReceiptHandle,
}

/// Lifecycle state of an envelope held by the queue.
///
/// `Acknowledged` is not represented: acknowledgment removes the entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeState {
    /// Waiting to be received.
    Pending,
    /// Handed to a receiver; hidden until `visible_at`. Only the holder of
    /// `receipt_handle` may settle it.
    InFlight {
        visible_at: Instant,
        receipt_handle: ReceiptHandle,
    },
    /// Retry budget exhausted. Kept for inspection, never delivered again
    /// unless explicitly redriven.
    DeadLettered { at: u64 },
}

/// The queue's internal bookkeeping for one envelope.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub envelope: MessageEnvelope,
    pub state: EnvelopeState,
    /// Monotonic enqueue order, used for approximate FIFO delivery.
    pub sequence: u64,
}

impl QueueEntry {
    /// Pending, or in flight with an elapsed visibility deadline.
    pub fn is_receivable(&self, now: Instant) -> bool {
        match self.state {
            EnvelopeState::Pending => true,
            EnvelopeState::InFlight { visible_at, .. } => now >= visible_at,
            EnvelopeState::DeadLettered { .. } => false,
        }
    }

    /// In flight and still hidden at `now`.
    pub fn is_held(&self, now: Instant) -> bool {
        matches!(self.state, EnvelopeState::InFlight { visible_at, .. } if now < visible_at)
    }

    /// In flight under `receipt_handle`, whether or not its deadline has passed.
    pub fn is_claimed_by(&self, receipt_handle: ReceiptHandle) -> bool {
        matches!(
            self.state,
            EnvelopeState::InFlight { receipt_handle: current, .. } if current == receipt_handle
        )
    }

    /// Still hidden at `now` under `receipt_handle`.
    pub fn is_held_by(&self, receipt_handle: ReceiptHandle, now: Instant) -> bool {
        self.is_held(now) && self.is_claimed_by(receipt_handle)
    }

    /// In flight with an elapsed visibility deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.state, EnvelopeState::InFlight { visible_at, .. } if now >= visible_at)
    }

    pub fn is_dead_lettered(&self) -> bool {
        matches!(self.state, EnvelopeState::DeadLettered { .. })
    }
}

/// Tuning for a `DurableQueue`.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Deliveries allowed before the envelope is dead-lettered.
    pub max_receive_count: u32,
    /// Maximum number of live (not dead-lettered) envelopes. `None` is unbounded.
    pub max_depth: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            max_depth: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The envelope is not in flight: already acknowledged, returned to
    /// pending, expired, dead-lettered, or never existed.
    #[error("delivery {0} not found or no longer in flight")]
    NotFound(DeliveryId),

    #[error("queue '{queue}' is full ({depth} envelopes)")]
    Full { queue: String, depth: usize },
}

/// Point-in-time counts per envelope state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue: String,
    /// Includes in-flight envelopes whose visibility deadline has passed.
    pub pending: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}

/// A dead-lettered envelope as exposed for inspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub envelope: MessageEnvelope,
    pub dead_lettered_at: u64,
}

/// Result of one pass returning expired in-flight envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    pub requeued: usize,
    pub dead_lettered: usize,
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
