use crate::queue::types::DEFAULT_VISIBILITY_TIMEOUT;
use crate::queue::{Message, MessageEnvelope};
use crate::storage::StoreError;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Record kind tag used for persisted messages in the shared store.
pub const MESSAGE_KIND: &str = "message";

/// Prefix of every derived message record key.
pub const MESSAGE_KEY_PREFIX: &str = "message-";

/// Largest message body accepted for persistence (bytes).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// How a record key is derived from an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DedupKeyPolicy {
    /// `message-<messageId>`: one record per publish call. Redeliveries and
    /// duplicate fan-out copies of that call map to the same key.
    #[default]
    MessageId,
    /// `message-<sha256(message)>`: one record per distinct message text.
    ContentHash,
}

impl DedupKeyPolicy {
    pub fn derive_key(&self, envelope: &MessageEnvelope) -> String {
        match self {
            DedupKeyPolicy::MessageId => {
                format!("{}{}", MESSAGE_KEY_PREFIX, envelope.message_id.0)
            }
            DedupKeyPolicy::ContentHash => {
                format!("{}{}", MESSAGE_KEY_PREFIX, content_hash(&envelope.payload))
            }
        }
    }
}

fn content_hash(payload: &Message) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.message.as_bytes());
    hex::encode(hasher.finalize())
}

/// The persisted form of a message.
///
/// Built only from the derived key and the payload, so every redelivery of the
/// same envelope produces an identical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessageRecord {
    pub item_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum envelopes claimed per `run_once`.
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    /// How long `run_once` waits for work when the queue is empty.
    pub wait_time: Duration,
    pub dedup_key: DedupKeyPolicy,
    pub max_message_bytes: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            wait_time: Duration::from_secs(1),
            dedup_key: DedupKeyPolicy::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Why an envelope could not be persisted.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("message body is empty")]
    EmptyMessage,

    #[error("message body is {size} bytes, limit is {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("record key '{key}' already holds a different record")]
    Conflict { key: String },

    #[error("record codec error: {0}")]
    Codec(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ProcessingError {
    /// Permanent errors can never succeed on redelivery.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, ProcessingError::Unavailable(_))
    }
}

impl From<StoreError> for ProcessingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => ProcessingError::Unavailable(reason),
            StoreError::Conflict { key } => ProcessingError::Conflict { key },
            StoreError::Codec(e) => ProcessingError::Codec(e.to_string()),
        }
    }
}

/// Per-envelope result of one consumption pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    /// Written (`created`) or found already written, then acknowledged.
    Persisted { created: bool },
    /// Transient failure; handed back to the queue.
    Released,
    /// Permanent failure; acknowledged and reported.
    Dropped,
}

/// Summary of one `run_once` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionReport {
    pub received: usize,
    /// Envelopes whose record was newly written.
    pub persisted: usize,
    /// Envelopes whose record already existed (redelivery or duplicate fan-out).
    pub duplicates: usize,
    pub released: usize,
    pub dropped: usize,
    /// Acknowledgments rejected because the visibility timeout had passed.
    pub ack_lost: usize,
}

impl ConsumptionReport {
    pub fn record(&mut self, outcome: EnvelopeOutcome) {
        match outcome {
            EnvelopeOutcome::Persisted { created: true } => self.persisted += 1,
            EnvelopeOutcome::Persisted { created: false } => self.duplicates += 1,
            EnvelopeOutcome::Released => self.released += 1,
            EnvelopeOutcome::Dropped => self.dropped += 1,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.received == 0
    }
}
