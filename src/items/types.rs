use crate::storage::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record kind tag used for items in the shared store.
pub const ITEM_KIND: &str = "item";

/// Upper bound on the byte length of an `itemId`.
pub const MAX_ITEM_ID_LEN: usize = 1024;

/// A synchronously created record, keyed by `item_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    pub title: String,
}

impl Item {
    /// Creates an item with a fresh UUID v4 identifier.
    pub fn with_generated_id(title: impl Into<String>) -> Self {
        Self {
            item_id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item '{0}' not found")]
    NotFound(String),

    #[error("item store unavailable: {0}")]
    Unavailable(String),

    /// The stored record could not be encoded or decoded. Retrying will not help.
    #[error("item record corrupt: {0}")]
    Corrupt(String),
}

impl From<StoreError> for ItemError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => {
                ItemError::Validation(format!("item '{}' already exists", key))
            }
            StoreError::Unavailable(reason) => ItemError::Unavailable(reason),
            StoreError::Codec(e) => ItemError::Corrupt(e.to_string()),
        }
    }
}
