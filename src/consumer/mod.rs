//! Queue Consumer Module
//!
//! Moves messages from the `DurableQueue` into the `KeyValueStore`, exactly one record per
//! derived key no matter how often an envelope is delivered.
//!
//! ## Submodules
//! - **`types`**: Configuration, dedup key derivation, the stored record and the processing errors.
//! - **`consumer`**: `QueueConsumer::run_once`, a single receive-persist-settle pass.
//! - **`reporter`**: The `ErrorReporter` sink for permanently failed envelopes.
//! - **`worker`**: `ConsumerPool`, the tokio workers that call `run_once` repeatedly.

pub mod consumer;
pub mod reporter;
pub mod types;
pub mod worker;

pub use consumer::QueueConsumer;
pub use reporter::{ErrorReporter, TracingReporter};
pub use types::{ConsumerConfig, ConsumptionReport, DedupKeyPolicy, ProcessingError, StoredMessageRecord};
pub use worker::ConsumerPool;

#[cfg(test)]
mod tests;
