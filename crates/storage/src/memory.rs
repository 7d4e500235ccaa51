//! In-memory implementation of BlobStore
//!
//! Used for tests and for members started with `storage = "memory"`. All
//! records live in a single map behind a `parking_lot::RwLock`, so an upsert
//! is atomic with respect to readers.

use crate::blob::{BlobStore, StoredRecord};
use crate::error::Result;
use anytrust_types::DataHash;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory blob store
pub struct InMemoryStore {
    /// Records indexed by hash
    records: RwLock<HashMap<DataHash, StoredRecord>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryStore {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        record.validate()?;
        self.records.write().insert(record.data_hash, record);
        Ok(())
    }

    async fn get(&self, data_hash: &DataHash) -> Result<Option<StoredRecord>> {
        Ok(self.records.read().get(data_hash).cloned())
    }

    async fn contains(&self, data_hash: &DataHash) -> Result<bool> {
        Ok(self.records.read().contains_key(data_hash))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
