//! Document store: JSON records grouped into named collections, each with
//! secondary indexes, on top of SQLite.
//!
//! Writes are durable when they return. A registered change listener is
//! called once per written record, only after the enclosing transaction has
//! committed.

mod collections;
mod documents;
mod range;
mod schema;
mod transaction;

pub use collections::*;
pub use range::*;
pub use schema::*;
pub use transaction::*;

use rusqlite::Connection;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing document: \"{0}\"")]
    MissingDocument(String),

    #[error("Duplicate key in {collection}: \"{key}\"")]
    DuplicateKey { collection: String, key: String },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown index {index} on collection {collection}")]
    UnknownIndex { collection: String, index: String },

    #[error("Record in {collection} has no \"{key_path}\" key")]
    MissingKey { collection: String, key_path: String },

    #[error("Collection {0} is not part of this transaction")]
    OutOfScope(String),

    #[error("Transaction is read-only")]
    ReadOnly,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A record that was durably written.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub record: Value,
}

/// Callback invoked for every committed write.
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send>;

/// SQLite-backed document store.
pub struct DocumentStore {
    conn: Connection,
    path: Option<PathBuf>,
    collections: &'static [CollectionSpec],
    listener: Option<ChangeListener>,
}

impl DocumentStore {
    /// Open store at path, creating if needed.
    pub fn open<P: AsRef<Path>>(
        path: P,
        collections: &'static [CollectionSpec],
    ) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn,
            path: Some(path.as_ref().to_path_buf()),
            collections,
            listener: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create in-memory store.
    pub fn open_in_memory(collections: &'static [CollectionSpec]) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            path: None,
            collections,
            listener: None,
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Register the change listener, replacing any previous one.
    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    /// Declared collections.
    pub fn collections(&self) -> &'static [CollectionSpec] {
        self.collections
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn spec(&self, collection: &str) -> StoreResult<&'static CollectionSpec> {
        find_collection(self.collections, collection)
    }

    /// Irreversibly delete the whole store, including its backing file.
    pub fn destroy(self) -> StoreResult<()> {
        let DocumentStore { conn, path, .. } = self;
        conn.close().map_err(|(_, e)| StoreError::Storage(e))?;

        if let Some(path) = path {
            let mut candidates = vec![path.clone()];
            for suffix in ["-wal", "-shm", "-journal"] {
                let mut name = path.clone().into_os_string();
                name.push(suffix);
                candidates.push(PathBuf::from(name));
            }
            for candidate in candidates {
                match std::fs::remove_file(&candidate) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const CLIENTS: &str = "clients";
    pub const PATIENTS: &str = "patients";

    pub static TEST_COLLECTIONS: &[CollectionSpec] = &[
        CollectionSpec {
            name: CLIENTS,
            key_path: "id",
            indexes: &[IndexSpec { name: "pets", key_path: "pets" }],
        },
        CollectionSpec {
            name: PATIENTS,
            key_path: "id",
            indexes: &[IndexSpec { name: "visitDates", key_path: "visitDates" }],
        },
    ];

    pub fn setup_store() -> DocumentStore {
        DocumentStore::open_in_memory(TEST_COLLECTIONS).unwrap()
    }
}
