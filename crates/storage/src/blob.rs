//! BlobStore trait definition
//!
//! This module defines the [`BlobStore`] trait which a member uses to persist
//! the blobs it has attested and to serve them back by hash. The trait is
//! implemented by an in-memory backend for tests and a redb backend for
//! production.

use crate::error::{Result, StorageError};
use anytrust_types::DataHash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A blob and its hash, keyed uniquely by `data_hash`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Keccak-256 of `blob`
    pub data_hash: DataHash,
    /// Raw blob bytes
    pub blob: Vec<u8>,
}

impl StoredRecord {
    /// Create a record, computing the hash of `blob`
    pub fn new(blob: Vec<u8>) -> Self {
        Self {
            data_hash: DataHash::compute(&blob),
            blob,
        }
    }

    /// Check that `blob` hashes to `data_hash`
    pub fn validate(&self) -> Result<()> {
        let actual = DataHash::compute(&self.blob);
        if actual != self.data_hash {
            return Err(StorageError::HashMismatch {
                key: self.data_hash,
                actual,
            });
        }
        Ok(())
    }
}

/// Blob storage trait for member persistence
///
/// Implementations must be thread-safe (Send + Sync). Records are never
/// deleted.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a record
    ///
    /// Atomic upsert keyed by `record.data_hash`: a concurrent reader sees
    /// either the previous record or the new one, never a partial write.
    /// Storing the same blob again leaves an equivalent record.
    ///
    /// # Returns
    /// * `Ok(())` once the record is durable
    /// * `Err(StorageError::HashMismatch)` if the blob does not hash to its key
    async fn put(&self, record: StoredRecord) -> Result<()>;

    /// Get a record by hash
    ///
    /// # Returns
    /// * `Ok(Some(record))` if found
    /// * `Ok(None)` if not found
    async fn get(&self, data_hash: &DataHash) -> Result<Option<StoredRecord>>;

    /// Check if a record exists
    async fn contains(&self, data_hash: &DataHash) -> Result<bool>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        (**self).put(record).await
    }

    async fn get(&self, data_hash: &DataHash) -> Result<Option<StoredRecord>> {
        (**self).get(data_hash).await
    }

    async fn contains(&self, data_hash: &DataHash) -> Result<bool> {
        (**self).contains(data_hash).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }
}
