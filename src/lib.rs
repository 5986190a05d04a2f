//! Event-Driven Ingestion Pipeline Library
//!
//! This library crate defines the modules of the ingestion service. It serves as the foundation
//! for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! Two write paths share one key-value store:
//!
//! - **`storage`**: The keyed record store (`KeyValueStore`) and its partitioned in-memory
//!   implementation.
//! - **`items`**: The synchronous path. Items are validated and written within the request.
//! - **`topic`**: The publish point of the asynchronous path. Fans each message out to every
//!   subscribed queue.
//! - **`queue`**: The durable queue. Visibility timeouts, redelivery and dead-lettering give
//!   at-least-once delivery.
//! - **`consumer`**: Drains the queue into the store with idempotent, key-derived writes, so
//!   at-least-once delivery still yields exactly one record per message.
//! - **`api`**: The HTTP surface (`/text`, `/sns`, queue operations).
//! - **`config`** / **`pipeline`**: Command-line configuration and component wiring.

pub mod api;
pub mod config;
pub mod consumer;
pub mod items;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod topic;
