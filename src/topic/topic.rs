//! Topic Fan-out
//!
//! Publishing assigns a `MessageId` and walks the registration list synchronously, handing each
//! subscriber queue its own envelope. The topic never waits for consumers.

use super::types::{PublishError, PublishReceipt};
use crate::queue::types::now_ms;
use crate::queue::{DurableQueue, Message, MessageId};

use parking_lot::RwLock;
use std::sync::Arc;

pub struct Topic {
    name: String,
    subscriptions: RwLock<Vec<Arc<DurableQueue>>>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a queue to receive every subsequently published message.
    ///
    /// Wiring-time operation. Subscribing the same queue twice is ignored.
    pub fn subscribe(&self, queue: Arc<DurableQueue>) {
        let mut subscriptions = self.subscriptions.write();
        if subscriptions.iter().any(|existing| Arc::ptr_eq(existing, &queue)) {
            tracing::warn!(topic = %self.name, queue = queue.name(), "Queue already subscribed");
            return;
        }

        tracing::info!(topic = %self.name, queue = queue.name(), "Subscribed queue to topic");
        subscriptions.push(queue);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Delivers a copy of `message` to every subscribed queue.
    ///
    /// Succeeds when at least one queue accepted the copy. A queue that rejects
    /// (for example because it is full) is logged and skipped.
    pub fn publish(&self, message: Message) -> Result<PublishReceipt, PublishError> {
        let subscriptions = self.subscriptions.read().clone();

        if subscriptions.is_empty() {
            tracing::warn!(topic = %self.name, "Publish with no subscriptions");
            return Err(PublishError::Unavailable {
                topic: self.name.clone(),
                reason: "no subscriptions".to_string(),
            });
        }

        let message_id = MessageId::new();
        let published_at = now_ms();
        let mut deliveries = 0;

        for queue in subscriptions.iter() {
            match queue.enqueue(message_id.clone(), message.clone(), published_at) {
                Ok(delivery_id) => {
                    tracing::debug!(
                        topic = %self.name,
                        queue = queue.name(),
                        message_id = %message_id,
                        delivery_id = %delivery_id,
                        "Delivered message to subscriber"
                    );
                    deliveries += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        topic = %self.name,
                        queue = queue.name(),
                        message_id = %message_id,
                        error = %e,
                        "Subscriber rejected message"
                    );
                }
            }
        }

        if deliveries == 0 {
            return Err(PublishError::Unavailable {
                topic: self.name.clone(),
                reason: format!("all {} subscriptions rejected the message", subscriptions.len()),
            });
        }

        tracing::info!(
            topic = %self.name,
            message_id = %message_id,
            deliveries,
            "Published message"
        );

        Ok(PublishReceipt {
            message_id,
            deliveries,
        })
    }
}
