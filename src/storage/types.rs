//! Storage Contract Types
//!
//! Defines the `KeyValueStore` trait consumed by `ItemService` and `QueueConsumer`,
//! together with the record format and the error taxonomy of the store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a `KeyValueStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached. Callers may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The key already holds a record and the write mode does not allow replacing it.
    #[error("key '{key}' already holds a different record")]
    Conflict { key: String },

    /// A record body could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Write behaviour when the target key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Unconditional write (`idempotent: false`).
    Overwrite,
    /// Insert when absent, no-op when the existing record is identical,
    /// `Conflict` when it differs (`idempotent: true`).
    Idempotent,
    /// Insert when absent, `Conflict` otherwise.
    CreateOnly,
}

/// What a successful `put` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Replaced,
    /// The key already held an identical record. Nothing was written.
    Unchanged,
}

/// A stored value: a kind tag plus the JSON body of the domain object.
///
/// Equality is structural, which is what `PutMode::Idempotent` compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: String,
    pub body: serde_json::Value,
}

impl Record {
    pub fn encode<T: Serialize>(kind: &str, value: &T) -> Result<Self, StoreError> {
        Ok(Self {
            kind: kind.to_string(),
            body: serde_json::to_value(value)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Durable keyed storage with per-key atomic writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;

    async fn put(&self, key: &str, record: Record, mode: PutMode)
    -> Result<PutOutcome, StoreError>;
}
