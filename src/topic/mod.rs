//! Topic Module
//!
//! The publish point of the asynchronous path. Subscriptions are an explicit list of
//! `DurableQueue` handles registered at wiring time; there is no hidden dispatch.
//!
//! Fan-out is at-least-once from a consumer's point of view: the same `MessageId` may reach a
//! queue more than once (for example when a producer retries after a fault), so consumers
//! deduplicate on a key derived from the message, never on the delivery.

pub mod topic;
pub mod types;

pub use topic::Topic;
pub use types::{PublishError, PublishReceipt};
