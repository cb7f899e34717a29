//! Coordination layer for vetshelf.
//!
//! [`Database`] sequences multi-collection writes against the document
//! store, keeps the search index eventually consistent with them, and
//! answers the composite queries the application needs.

mod batch;
mod clients;
mod collections;
mod import;
mod patients;
mod results;
mod search;

pub use batch::*;
pub use collections::*;
pub use import::*;
pub use patients::*;
pub use results::*;
pub use search::*;

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::{Client, Entity, ModelError, ModelResult, Patient, SearchSummary};
use crate::search::{SearchError, SearchWorker, SnapshotFile};
use crate::store::{ChangeEvent, Direction, DocumentStore, KeyRange, StoreError};

/// Phrase [`Database::destroy`] requires before wiping anything.
pub const DESTROY_CONFIRMATION: &str = "Yes I am sure that I want to delete vetshelf";

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Declined")]
    Declined,
}

pub type DbResult<T> = Result<T, DbError>;

/// Handle to the clinic records. Valid from [`Database::open`] until
/// [`Database::close`].
pub struct Database {
    store: DocumentStore,
    search: SearchWorker,
    changes: mpsc::UnboundedReceiver<ChangeEvent>,
    batch_depth: usize,
    result_limit: usize,
    upcoming_limit: usize,
}

impl Database {
    /// Open the store and search worker described by `config`.
    ///
    /// The persisted search snapshot is loaded if usable, otherwise the
    /// index is rebuilt from the store.
    pub fn open(config: &Config) -> DbResult<Self> {
        let mut store = match &config.store.path {
            Some(path) => DocumentStore::open(path, COLLECTIONS)?,
            None => DocumentStore::open_in_memory(COLLECTIONS)?,
        };

        let (tx, changes) = mpsc::unbounded_channel();
        store.set_change_listener(Box::new(move |event: &ChangeEvent| {
            let _ = tx.send(event.clone());
        }));

        let search = SearchWorker::spawn(
            SnapshotFile::new(&config.search.snapshot_path),
            config.search.timeout(),
        )?;

        let mut db = Self {
            store,
            search,
            changes,
            batch_depth: 0,
            result_limit: config.search.result_limit,
            upcoming_limit: config.search.upcoming_limit,
        };
        db.initialize();
        Ok(db)
    }

    /// In-memory store with the search snapshot under `dir` (for testing).
    pub fn open_in_memory(dir: &Path) -> DbResult<Self> {
        Self::open(&Config::in_memory(dir))
    }

    /// Load the search snapshot or rebuild the index. A failed rebuild is
    /// logged: every read path still works without the index.
    fn initialize(&mut self) {
        if let Err(e) = self.search.load() {
            info!(reason = %e, "Search snapshot unusable, rebuilding index");
            if let Err(e) = self.ensure_indexes() {
                error!(error = %e, "Failed to rebuild search index");
            }
        }
    }

    /// Persist the search index and shut down.
    pub fn close(mut self) -> DbResult<()> {
        self.search.persist()?;
        debug!("Database closed");
        Ok(())
    }

    /// Underlying document store (for advanced queries).
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Search worker (for diagnostics).
    pub fn search_worker(&mut self) -> &mut SearchWorker {
        &mut self.search
    }

    /// Irreversibly delete every record and the search snapshot.
    ///
    /// `confirmation` must equal [`DESTROY_CONFIRMATION`]; otherwise nothing
    /// is deleted and `Declined` is returned. The handle is consumed either
    /// way.
    pub fn destroy(self, confirmation: &str) -> DbResult<()> {
        if confirmation != DESTROY_CONFIRMATION {
            return Err(DbError::Declined);
        }

        let Database {
            store, mut search, ..
        } = self;
        search.clear_cache()?;
        drop(search);
        store.destroy()?;

        warn!("Deleted vetshelf");
        Ok(())
    }

    /// Suppress reindex-on-write until the matching exit.
    pub fn enter_batch_mode(&mut self) {
        self.batch_depth += 1;
        debug!(depth = self.batch_depth, "Entered batch mode");
    }

    /// Leave batch mode; the outermost exit rebuilds the search index.
    pub fn exit_batch_mode(&mut self) -> DbResult<()> {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        debug!(depth = self.batch_depth, "Exited batch mode");
        if self.batch_depth == 0 {
            self.ensure_indexes()?;
        }
        Ok(())
    }

    pub fn in_batch_mode(&self) -> bool {
        self.batch_depth > 0
    }

    /// Rebuild the search index from every stored client, then persist it.
    pub fn ensure_indexes(&mut self) -> DbResult<()> {
        let started = Instant::now();
        self.search.reset()?;

        let mut records: Vec<Value> = Vec::new();
        self.store
            .for_each(CLIENTS, None, &KeyRange::all(), Direction::Next, |_, record| {
                records.push(record);
                true
            })?;

        let mut tickets = Vec::with_capacity(records.len());
        for client in records
            .into_iter()
            .filter_map(|record| decode_or_warn(record, Client::from_value))
        {
            if let Some(summary) = self.summarize(&client)? {
                tickets.push(self.search.queue_update(summary)?);
            }
        }

        let indexed = tickets.len();
        for ticket in tickets {
            self.search.wait_done(ticket)?;
        }
        self.search.persist()?;

        info!(
            clients = indexed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rebuilt search index"
        );
        Ok(())
    }

    /// Persist a client or patient, whichever `entity` holds.
    pub fn save(&mut self, entity: &mut Entity) -> DbResult<String> {
        match entity {
            Entity::Client(client) => self.update_client(client),
            Entity::Patient(patient) => {
                self.update_patient(patient, &UpdatePatientOptions::default())
            }
        }
    }

    /// Search summary of `client` joined with the patients it owns.
    /// Dangling pet references are skipped.
    fn summarize(&self, client: &Client) -> DbResult<Option<SearchSummary>> {
        let patients = self.existing_patients(&client.pets())?;
        Ok(SearchSummary::build(client, &patients))
    }

    /// Stored patients among `ids`. Absent and undecodable ones are skipped.
    fn existing_patients<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<Vec<Patient>> {
        Ok(self
            .store
            .get_existing(PATIENTS, ids)?
            .into_iter()
            .filter_map(|record| decode_or_warn(record, Patient::from_value))
            .collect())
    }

    /// Reindex every client affected by writes since the last call.
    ///
    /// Called after each write. In batch mode the events are dropped, since
    /// leaving batch mode rebuilds everything. Index failures are logged,
    /// not returned: the write they follow is already durable.
    fn process_changes(&mut self) {
        let events: Vec<ChangeEvent> =
            std::iter::from_fn(|| self.changes.try_recv().ok()).collect();
        if events.is_empty() || self.in_batch_mode() {
            return;
        }

        if let Err(e) = self.reindex(&events) {
            warn!(error = %e, "Failed to update search index");
        }
    }

    fn reindex(&mut self, events: &[ChangeEvent]) -> DbResult<()> {
        let mut seen = HashSet::new();
        let mut client_ids = Vec::new();
        for event in events {
            let Some(id) = event.record.get("id").and_then(Value::as_str) else {
                continue;
            };
            let affected = match event.collection.as_str() {
                CLIENTS => vec![id.to_string()],
                PATIENTS => self.store.primary_keys_by_index(CLIENTS, PETS_INDEX, &[id])?,
                _ => Vec::new(),
            };
            for client_id in affected {
                if seen.insert(client_id.clone()) {
                    client_ids.push(client_id);
                }
            }
        }

        let mut tickets = Vec::with_capacity(client_ids.len());
        for client in self.existing_clients(&client_ids)? {
            if let Some(summary) = self.summarize(&client)? {
                tickets.push(self.search.queue_update(summary)?);
            }
        }
        for ticket in tickets {
            self.search.wait_done(ticket)?;
        }
        self.search.persist()?;

        debug!(clients = client_ids.len(), "Reindexed clients");
        Ok(())
    }

    /// Stored clients among `ids`. Absent and undecodable ones are skipped.
    fn existing_clients<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<Vec<Client>> {
        Ok(self
            .store
            .get_existing(CLIENTS, ids)?
            .into_iter()
            .filter_map(|record| decode_or_warn(record, Client::from_value))
            .collect())
    }
}

/// Decode a stored record, logging and dropping it if it is unreadable.
fn decode_or_warn<T>(record: Value, decode: fn(Value) -> ModelResult<T>) -> Option<T> {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match decode(record) {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!(id = %id, error = %e, "Skipping unreadable record");
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::search::DebugInfo;

    #[test]
    fn test_open_in_memory() {
        let (_dir, db) = setup_db();
        assert!(!db.in_batch_mode());
        assert_eq!(db.store().count(CLIENTS).unwrap(), 0);
    }

    #[test]
    fn test_batch_mode_is_reentrant() {
        let (_dir, mut db) = setup_db();
        db.enter_batch_mode();
        db.enter_batch_mode();
        db.exit_batch_mode().unwrap();
        assert!(db.in_batch_mode());
        db.exit_batch_mode().unwrap();
        assert!(!db.in_batch_mode());

        // Clamped at zero
        db.exit_batch_mode().unwrap();
        assert!(!db.in_batch_mode());
    }

    #[test]
    fn test_writes_in_batch_mode_are_not_indexed_until_exit() {
        let (_dir, mut db) = setup_db();
        db.enter_batch_mode();

        let mut client = Client::new();
        client.set_name("Ann Smith");
        let id = db.update_client(&mut client).unwrap();
        assert_eq!(
            db.search_worker().debug(Some(id.as_str())).unwrap(),
            DebugInfo::Document(None)
        );

        db.exit_batch_mode().unwrap();
        assert!(matches!(
            db.search_worker().debug(Some(id.as_str())).unwrap(),
            DebugInfo::Document(Some(_))
        ));
    }

    #[test]
    fn test_destroy_requires_phrase() {
        let (_dir, mut db) = setup_db();
        db.update_client(&mut Client::new()).unwrap();
        assert!(matches!(db.destroy("yes"), Err(DbError::Declined)));
    }

    #[test]
    fn test_destroy_clears_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::in_memory(dir.path());
        config.store.path = Some(dir.path().join("vetshelf.sqlite"));

        let mut db = Database::open(&config).unwrap();
        let mut client = Client::new();
        client.set_name("Ann");
        db.update_client(&mut client).unwrap();
        assert!(config.search.snapshot_path.exists());

        db.destroy(DESTROY_CONFIRMATION).unwrap();
        assert!(!config.search.snapshot_path.exists());
        assert!(!dir.path().join("vetshelf.sqlite").exists());
    }

    #[test]
    fn test_save_dispatches_on_entity() {
        let (_dir, mut db) = setup_db();
        let mut entity = Entity::from(Patient::new());
        let id = db.save(&mut entity).unwrap();
        assert!(id.starts_with("p-"));
        assert_eq!(entity.id(), Some(id.as_str()));
        assert!(!entity.is_dirty());
    }
}
