use super::types::{ITEM_KIND, Item, ItemError, MAX_ITEM_ID_LEN};
use crate::consumer::types::MESSAGE_KEY_PREFIX;
use crate::storage::{KeyValueStore, PutMode, Record};

use std::sync::Arc;

/// Create/read access to item records.
pub struct ItemService {
    store: Arc<dyn KeyValueStore>,
}

impl ItemService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Validates and persists a new item.
    ///
    /// The title is stored trimmed. Fails with `ItemError::Validation` when the
    /// title is blank, the id is malformed or reserved, or the id is already taken; the
    /// existing record is left untouched in that case.
    pub async fn create(&self, item: Item) -> Result<Item, ItemError> {
        let item = validate(item)?;
        let record = Record::encode(ITEM_KIND, &item)?;

        self.store
            .put(&item.item_id, record, PutMode::CreateOnly)
            .await?;

        tracing::info!(item_id = %item.item_id, "Created item");
        Ok(item)
    }

    /// Reads an item by key.
    pub async fn get(&self, item_id: &str) -> Result<Item, ItemError> {
        match self.store.get(item_id).await? {
            Some(record) if record.is_kind(ITEM_KIND) => Ok(record.decode()?),
            Some(_) => {
                tracing::debug!(item_id, "Key holds a non-item record");
                Err(ItemError::NotFound(item_id.to_string()))
            }
            None => Err(ItemError::NotFound(item_id.to_string())),
        }
    }
}

fn validate(item: Item) -> Result<Item, ItemError> {
    let title = item.title.trim();
    if title.is_empty() {
        return Err(ItemError::Validation("title must not be empty".to_string()));
    }

    if item.item_id.trim().is_empty() {
        return Err(ItemError::Validation("itemId must not be empty".to_string()));
    }
    // Message records are keyed under this prefix; an item there could shadow them.
    if item.item_id.starts_with(MESSAGE_KEY_PREFIX) {
        return Err(ItemError::Validation(format!(
            "itemId must not start with '{}'",
            MESSAGE_KEY_PREFIX
        )));
    }
    if item.item_id.len() > MAX_ITEM_ID_LEN {
        return Err(ItemError::Validation(format!(
            "itemId exceeds {} bytes",
            MAX_ITEM_ID_LEN
        )));
    }

    Ok(Item {
        item_id: item.item_id,
        title: title.to_string(),
    })
}
