use super::partitioner::Partitioner;
use super::types::{KeyValueStore, PutMode, PutOutcome, Record, StoreError};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// In-process implementation of `KeyValueStore`.
///
/// Structure: `Partition ID -> Key -> Record`. The inner `DashMap` entry API
/// holds the shard lock for the whole check-and-write, which is what makes
/// `CreateOnly` and `Idempotent` atomic per key.
pub struct InMemoryStore {
    local_data: DashMap<u32, DashMap<String, Record>>,
    partitioner: Partitioner,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_partitioner(Partitioner::default())
    }

    pub fn with_partitioner(partitioner: Partitioner) -> Self {
        Self {
            local_data: DashMap::new(),
            partitioner,
        }
    }

    pub fn get_local(&self, key: &str) -> Option<Record> {
        let partition = self.partitioner.get_partition(key);

        if let Some(partition_map) = self.local_data.get(&partition)
            && let Some(value) = partition_map.get(key)
        {
            return Some(value.clone());
        }

        None
    }

    pub fn put_local(&self, key: &str, record: Record, mode: PutMode) -> Result<PutOutcome, StoreError> {
        let partition = self.partitioner.get_partition(key);
        let partition_map = self
            .local_data
            .entry(partition)
            .or_insert_with(DashMap::new);

        match partition_map.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                tracing::debug!(key, partition, "Stored new record");
                Ok(PutOutcome::Created)
            }
            Entry::Occupied(mut slot) => match mode {
                PutMode::Overwrite => {
                    slot.insert(record);
                    tracing::debug!(key, partition, "Replaced record");
                    Ok(PutOutcome::Replaced)
                }
                PutMode::Idempotent if slot.get() == &record => {
                    tracing::debug!(key, "Identical record already stored, skipping write");
                    Ok(PutOutcome::Unchanged)
                }
                PutMode::Idempotent | PutMode::CreateOnly => Err(StoreError::Conflict {
                    key: key.to_string(),
                }),
            },
        }
    }

    /// Total number of records across all partitions.
    pub fn len(&self) -> usize {
        self.local_data
            .iter()
            .map(|entry| entry.value().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every key holding a record of the given kind.
    pub fn keys_of_kind(&self, kind: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for partition in self.local_data.iter() {
            for entry in partition.value().iter() {
                if entry.value().is_kind(kind) {
                    keys.push(entry.key().clone());
                }
            }
        }
        keys
    }

    pub fn local_partition_count(&self) -> usize {
        self.local_data.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.get_local(key))
    }

    async fn put(&self, key: &str, record: Record, mode: PutMode) -> Result<PutOutcome, StoreError> {
        self.put_local(key, record, mode)
    }
}
