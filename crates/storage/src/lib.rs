//! Storage layer for anytrust DAC members
//!
//! A member persists every blob it attests so it can serve it back by hash.
//! This crate defines the storage abstraction and its backends:
//! - [`BlobStore`]: async trait for upsert and lookup by [`DataHash`](anytrust_types::DataHash)
//! - [`InMemoryStore`]: in-memory implementation for testing
//! - [`RedbStore`]: durable store on a single redb database
//!
//! # Usage
//!
//! ```ignore
//! use anytrust_storage::{BlobStore, RedbStore, StoredRecord};
//!
//! let store = RedbStore::open("/var/lib/anytrust/member-0").await?;
//! let record = StoredRecord::new(blob);
//! store.put(record).await?;
//! ```

pub mod blob;
pub mod database;
pub mod error;
pub mod memory;

pub use blob::{BlobStore, StoredRecord};
pub use database::{RedbStore, DATABASE_FILENAME};
pub use error::{Result, StorageError};
pub use memory::InMemoryStore;
