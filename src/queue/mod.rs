//! Durable Queue Module
//!
//! The retry boundary of the message pipeline. Every envelope moves through an explicit
//! state machine:
//!
//! ```text
//! Pending ──receive──► InFlight ──acknowledge──► (removed)
//!    ▲                    │
//!    └──release/timeout───┤
//!                         └──budget exhausted──► DeadLettered ──redrive──► Pending
//! ```
//!
//! ## Submodules
//! - **`types`**: Envelope, identifiers, configuration, errors and statistics.
//! - **`queue`**: `DurableQueue`, the concurrent state machine itself.
//! - **`sweeper`**: Background task returning expired in-flight envelopes.

pub mod queue;
pub mod sweeper;
pub mod types;

pub use queue::DurableQueue;
pub use types::{
    DeadLetter, DeliveryId, Message, MessageEnvelope, MessageId, QueueConfig, QueueError,
    QueueStats, ReceiptHandle,
};
