use crate::queue::MessageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by `Topic::publish` once at least one subscriber holds the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub message_id: MessageId,
    /// Number of subscriber queues that accepted a copy.
    pub deliveries: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    /// No subscriber accepted the message: either none is registered, or every
    /// subscribed queue rejected its copy.
    #[error("topic '{topic}' unavailable: {reason}")]
    Unavailable { topic: String, reason: String },
}
