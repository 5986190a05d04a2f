//! Key-Value Storage Module
//!
//! The keyed store shared by the synchronous item path and the asynchronous message path.
//!
//! ## Core Concepts
//! - **Contract**: `KeyValueStore` is the only surface the rest of the crate sees: a `get` by key
//!   and a `put` whose `PutMode` decides what happens when the key already exists.
//! - **Records**: every value is a `Record` (a `kind` tag plus a JSON body), so items and message
//!   records can live in one key space, the same way one table keyed by `itemId` holds both.
//! - **Atomicity**: a single `put` is atomic for its key. Nothing spans keys.
//! - **Partitioning**: `InMemoryStore` spreads keys over fixed partitions using `Partitioner`.

pub mod memory;
pub mod partitioner;
pub mod types;

pub use memory::InMemoryStore;
pub use types::{KeyValueStore, PutMode, PutOutcome, Record, StoreError};

#[cfg(test)]
pub(crate) mod testing;
