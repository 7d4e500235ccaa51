//! redb-backed implementation of BlobStore
//!
//! A single database file at `<data_dir>/blobs.redb` with one table mapping
//! the 32-byte data hash to the raw blob. Each `put` is its own write
//! transaction; redb commits are atomic and durable, so a reader sees either
//! the previous value or the new one.

use crate::blob::{BlobStore, StoredRecord};
use crate::error::{Result, StorageError};
use anytrust_types::DataHash;
use async_trait::async_trait;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Database file name inside the data directory
pub const DATABASE_FILENAME: &str = "blobs.redb";

/// data hash -> blob
pub const BLOBS: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("BLOBS");

/// Durable blob store on redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the store under `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;
        if !tokio::fs::metadata(&data_dir).await?.is_dir() {
            return Err(StorageError::Config(format!(
                "{} is not a directory",
                data_dir.display()
            )));
        }

        let path = data_dir.join(DATABASE_FILENAME);
        let db_path = path.clone();
        let db = tokio::task::spawn_blocking(move || -> Result<Database> {
            let db = Database::create(&db_path)?;
            // Ensure the table exists so readers never hit TableDoesNotExist
            let tx = db.begin_write()?;
            tx.open_table(BLOBS)?;
            tx.commit()?;
            Ok(db)
        })
        .await??;

        debug!(path = %path.display(), "Opened redb store");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for RedbStore {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        record.validate()?;

        let data_hash = record.data_hash;
        let len = record.blob.len();
        self.blocking(move |db| {
            let tx = db.begin_write()?;
            {
                let mut table = tx.open_table(BLOBS)?;
                table.insert(data_hash.as_bytes(), record.blob.as_slice())?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        debug!(%data_hash, bytes = len, "Stored record");
        Ok(())
    }

    async fn get(&self, data_hash: &DataHash) -> Result<Option<StoredRecord>> {
        let key = *data_hash;
        let blob = self
            .blocking(move |db| {
                let tx = db.begin_read()?;
                let table = tx.open_table(BLOBS)?;
                let blob = table.get(key.as_bytes())?.map(|v| v.value().to_vec());
                Ok(blob)
            })
            .await?;

        let Some(blob) = blob else {
            return Ok(None);
        };
        let record = StoredRecord {
            data_hash: key,
            blob,
        };
        record.validate()?;
        Ok(Some(record))
    }

    async fn contains(&self, data_hash: &DataHash) -> Result<bool> {
        let key = *data_hash;
        self.blocking(move |db| {
            let tx = db.begin_read()?;
            let table = tx.open_table(BLOBS)?;
            let found = table.get(key.as_bytes())?.is_some();
            Ok(found)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|db| {
            let tx = db.begin_read()?;
            let table = tx.open_table(BLOBS)?;
            let len = table.len()?;
            Ok(len as usize)
        })
        .await
    }
}
