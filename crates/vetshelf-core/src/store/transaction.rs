//! Multi-collection transactions.

use rusqlite::TransactionBehavior;
use serde_json::Value;

use super::documents::{get_all, write};
use super::{
    find_collection, ChangeEvent, ChangeListener, CollectionSpec, DocumentStore, StoreError,
    StoreResult,
};

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// A transaction scoped to a fixed set of collections.
///
/// Writes become visible to other readers and fire change notifications
/// only on [`commit`](StoreTransaction::commit). Dropping the handle without
/// committing rolls everything back silently.
pub struct StoreTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
    collections: &'static [CollectionSpec],
    scope: Vec<&'static str>,
    mode: TransactionMode,
    listener: Option<&'a ChangeListener>,
    pending: Vec<ChangeEvent>,
}

impl DocumentStore {
    /// Begin a transaction over `collections`.
    pub fn raw_transaction(
        &mut self,
        collections: &[&str],
        mode: TransactionMode,
    ) -> StoreResult<StoreTransaction<'_>> {
        let mut scope = Vec::with_capacity(collections.len());
        for name in collections {
            scope.push(self.spec(name)?.name);
        }

        let behavior = match mode {
            TransactionMode::ReadOnly => TransactionBehavior::Deferred,
            TransactionMode::ReadWrite => TransactionBehavior::Immediate,
        };
        let tx = self.conn.transaction_with_behavior(behavior)?;

        Ok(StoreTransaction {
            tx,
            collections: self.collections,
            scope,
            mode,
            listener: self.listener.as_ref(),
            pending: Vec::new(),
        })
    }
}

impl<'a> StoreTransaction<'a> {
    fn spec(&self, collection: &str) -> StoreResult<&'static CollectionSpec> {
        let spec = find_collection(self.collections, collection)?;
        if !self.scope.contains(&spec.name) {
            return Err(StoreError::OutOfScope(collection.to_string()));
        }
        Ok(spec)
    }

    fn writable_spec(&self, collection: &str) -> StoreResult<&'static CollectionSpec> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        self.spec(collection)
    }

    /// Fetch records, seeing this transaction's own uncommitted writes.
    pub fn get<S: AsRef<str>>(
        &self,
        collection: &str,
        index: Option<&str>,
        keys: &[S],
    ) -> StoreResult<Vec<Value>> {
        get_all(&self.tx, self.spec(collection)?, index, keys)
    }

    /// Upsert a record.
    pub fn put(&mut self, collection: &str, record: &Value) -> StoreResult<()> {
        let spec = self.writable_spec(collection)?;
        write(&self.tx, spec, record, false)?;
        self.pending.push(ChangeEvent {
            collection: spec.name.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    /// Insert a record whose primary key must be new.
    pub fn add(&mut self, collection: &str, record: &Value) -> StoreResult<()> {
        let spec = self.writable_spec(collection)?;
        write(&self.tx, spec, record, true)?;
        self.pending.push(ChangeEvent {
            collection: spec.name.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    /// Commit, then notify the change listener once per written record.
    pub fn commit(self) -> StoreResult<()> {
        let StoreTransaction {
            tx,
            listener,
            pending,
            ..
        } = self;

        tx.commit()?;

        if let Some(listener) = listener {
            for event in &pending {
                listener(event);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    fn store_with_listener() -> (DocumentStore, mpsc::Receiver<ChangeEvent>) {
        let mut store = setup_store();
        let (tx, rx) = mpsc::channel();
        store.set_change_listener(Box::new(move |event: &ChangeEvent| {
            let _ = tx.send(event.clone());
        }));
        (store, rx)
    }

    #[test]
    fn test_put_notifies_once() {
        let (mut store, rx) = store_with_listener();

        store.put(CLIENTS, &json!({"id": "c-1"})).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].collection, CLIENTS);
        assert_eq!(events[0].record["id"], "c-1");
    }

    #[test]
    fn test_failed_put_does_not_notify() {
        let (mut store, rx) = store_with_listener();

        assert!(store.put(CLIENTS, &json!({"name": "no key"})).is_err());
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_commit_is_atomic_and_notifies_after() {
        let (mut store, rx) = store_with_listener();

        let mut tx = store
            .raw_transaction(&[CLIENTS, PATIENTS], TransactionMode::ReadWrite)
            .unwrap();
        tx.put(PATIENTS, &json!({"id": "p-1"})).unwrap();
        tx.put(CLIENTS, &json!({"id": "c-1", "pets": ["p-1"]})).unwrap();

        // Own writes are visible inside the transaction
        assert_eq!(tx.get(PATIENTS, None, &["p-1"]).unwrap().len(), 1);
        assert_eq!(rx.try_iter().count(), 0);

        tx.commit().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].collection, PATIENTS);
        assert_eq!(events[1].collection, CLIENTS);
        assert_eq!(store.count(PATIENTS).unwrap(), 1);
    }

    #[test]
    fn test_abort_on_failure_rolls_back() {
        let (mut store, rx) = store_with_listener();
        store.put(CLIENTS, &json!({"id": "c-1"})).unwrap();
        let _ = rx.try_iter().count();

        {
            let mut tx = store
                .raw_transaction(&[CLIENTS, PATIENTS], TransactionMode::ReadWrite)
                .unwrap();
            tx.put(PATIENTS, &json!({"id": "p-1"})).unwrap();
            let failed = tx.add(CLIENTS, &json!({"id": "c-1"}));
            assert!(matches!(failed, Err(StoreError::DuplicateKey { .. })));
            // dropped without commit
        }

        assert_eq!(store.count(PATIENTS).unwrap(), 0);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_scope_and_mode_enforced() {
        let mut store = setup_store();

        let mut tx = store
            .raw_transaction(&[CLIENTS], TransactionMode::ReadWrite)
            .unwrap();
        assert!(matches!(
            tx.put(PATIENTS, &json!({"id": "p-1"})),
            Err(StoreError::OutOfScope(_))
        ));
        drop(tx);

        let mut tx = store
            .raw_transaction(&[CLIENTS], TransactionMode::ReadOnly)
            .unwrap();
        assert!(matches!(
            tx.put(CLIENTS, &json!({"id": "c-1"})),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn test_unknown_collection_in_scope() {
        let mut store = setup_store();
        assert!(matches!(
            store.raw_transaction(&["visits"], TransactionMode::ReadOnly),
            Err(StoreError::UnknownCollection(_))
        ));
    }
}
