//! Record reads, writes and ordered scans.

use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;

use super::{
    CollectionSpec, Direction, DocumentStore, KeyRange, StoreError, StoreResult, TransactionMode,
};

impl DocumentStore {
    /// Fetch records by primary key, or by index key when `index` is given.
    ///
    /// Output order follows `keys`. Fails with `MissingDocument` if any key
    /// matches nothing. An index key matching several records yields the
    /// one with the lowest primary key.
    pub fn get<S: AsRef<str>>(
        &self,
        collection: &str,
        index: Option<&str>,
        keys: &[S],
    ) -> StoreResult<Vec<Value>> {
        get_all(&self.conn, self.spec(collection)?, index, keys)
    }

    /// Fetch records by primary key, skipping keys that are absent.
    pub fn get_existing<S: AsRef<str>>(
        &self,
        collection: &str,
        keys: &[S],
    ) -> StoreResult<Vec<Value>> {
        let spec = self.spec(collection)?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = lookup(&self.conn, spec, None, key.as_ref())? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Distinct primary keys of every record whose `index` contains any of
    /// `keys`, in order of first appearance.
    pub fn primary_keys_by_index<S: AsRef<str>>(
        &self,
        collection: &str,
        index: &str,
        keys: &[S],
    ) -> StoreResult<Vec<String>> {
        let spec = self.spec(collection)?;
        spec.index(index)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT doc_key FROM index_entries
            WHERE collection = ?1 AND index_name = ?2 AND index_key = ?3
            ORDER BY doc_key
            "#,
        )?;

        let mut seen = HashSet::new();
        let mut primary_keys = Vec::new();
        for key in keys {
            let rows = stmt.query_map(params![spec.name, index, key.as_ref()], |row| {
                row.get::<_, String>(0)
            })?;
            for doc_key in rows {
                let doc_key = doc_key?;
                if seen.insert(doc_key.clone()) {
                    primary_keys.push(doc_key);
                }
            }
        }
        Ok(primary_keys)
    }

    /// Upsert one record in its own transaction.
    pub fn put(&mut self, collection: &str, record: &Value) -> StoreResult<()> {
        let mut tx = self.raw_transaction(&[collection], TransactionMode::ReadWrite)?;
        tx.put(collection, record)?;
        tx.commit()
    }

    /// Insert one record in its own transaction; fails with `DuplicateKey`
    /// if the primary key is taken.
    pub fn add(&mut self, collection: &str, record: &Value) -> StoreResult<()> {
        let mut tx = self.raw_transaction(&[collection], TransactionMode::ReadWrite)?;
        tx.add(collection, record)?;
        tx.commit()
    }

    /// Walk `(key, record)` pairs in key order, by primary key or by
    /// `index`. Rows are pulled from a cursor one at a time; `f` returning
    /// `false` stops the walk.
    pub fn for_each<F>(
        &self,
        collection: &str,
        index: Option<&str>,
        range: &KeyRange,
        direction: Direction,
        mut f: F,
    ) -> StoreResult<()>
    where
        F: FnMut(&str, Value) -> bool,
    {
        let spec = self.spec(collection)?;

        let (sql, params) = match index {
            None => {
                let (clause, range_params) = range.sql("key");
                let sql = format!(
                    "SELECT key, body FROM documents WHERE collection = ?{} ORDER BY key {}",
                    clause,
                    direction.sql()
                );
                let mut params = vec![spec.name.to_string()];
                params.extend(range_params);
                (sql, params)
            }
            Some(index) => {
                spec.index(index)?;
                let (clause, range_params) = range.sql("e.index_key");
                let sql = format!(
                    r#"
                    SELECT e.index_key, d.body
                    FROM index_entries e
                    JOIN documents d ON d.collection = e.collection AND d.key = e.doc_key
                    WHERE e.collection = ? AND e.index_name = ?{}
                    ORDER BY e.index_key {dir}, e.doc_key {dir}
                    "#,
                    clause,
                    dir = direction.sql()
                );
                let mut params = vec![spec.name.to_string(), index.to_string()];
                params.extend(range_params);
                (sql, params)
            }
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let body: String = row.get(1)?;
            let record: Value = serde_json::from_str(&body)?;
            if !f(&key, record) {
                break;
            }
        }
        Ok(())
    }

    /// Bounded range query returning at most `limit` records.
    pub fn query(
        &self,
        collection: &str,
        index: Option<&str>,
        range: &KeyRange,
        limit: usize,
        direction: Direction,
    ) -> StoreResult<Vec<Value>> {
        let mut results = Vec::new();
        if limit == 0 {
            return Ok(results);
        }
        self.for_each(collection, index, range, direction, |_, record| {
            results.push(record);
            results.len() < limit
        })?;
        Ok(results)
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let spec = self.spec(collection)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            [spec.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

pub(crate) fn lookup(
    conn: &Connection,
    spec: &CollectionSpec,
    index: Option<&str>,
    key: &str,
) -> StoreResult<Option<Value>> {
    let body: Option<String> = match index {
        None => conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![spec.name, key],
                |row| row.get(0),
            )
            .optional()?,
        Some(index) => {
            spec.index(index)?;
            conn.query_row(
                r#"
                SELECT d.body
                FROM index_entries e
                JOIN documents d ON d.collection = e.collection AND d.key = e.doc_key
                WHERE e.collection = ?1 AND e.index_name = ?2 AND e.index_key = ?3
                ORDER BY e.doc_key
                LIMIT 1
                "#,
                params![spec.name, index, key],
                |row| row.get(0),
            )
            .optional()?
        }
    };

    body.map(|b| serde_json::from_str(&b))
        .transpose()
        .map_err(Into::into)
}

pub(crate) fn get_all<S: AsRef<str>>(
    conn: &Connection,
    spec: &CollectionSpec,
    index: Option<&str>,
    keys: &[S],
) -> StoreResult<Vec<Value>> {
    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        let key = key.as_ref();
        match lookup(conn, spec, index, key)? {
            Some(record) => records.push(record),
            None => return Err(StoreError::MissingDocument(key.to_string())),
        }
    }
    Ok(records)
}

/// Write a record and rebuild its index rows. Returns the primary key.
pub(crate) fn write(
    conn: &Connection,
    spec: &CollectionSpec,
    record: &Value,
    insert_only: bool,
) -> StoreResult<String> {
    let key = spec.primary_key(record)?;
    let body = serde_json::to_string(record)?;

    if insert_only {
        let inserted = conn.execute(
            "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)",
            params![spec.name, key, body],
        );
        match inserted {
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateKey {
                    collection: spec.name.to_string(),
                    key,
                });
            }
            other => {
                other?;
            }
        }
    } else {
        conn.execute(
            r#"
            INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
            ON CONFLICT(collection, key) DO UPDATE SET
                body = excluded.body,
                updated_at = datetime('now')
            "#,
            params![spec.name, key, body],
        )?;
    }

    conn.execute(
        "DELETE FROM index_entries WHERE collection = ?1 AND doc_key = ?2",
        params![spec.name, key],
    )?;

    let mut stmt = conn.prepare_cached(
        r#"
        INSERT OR IGNORE INTO index_entries (collection, index_name, index_key, doc_key)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;
    for index in spec.indexes {
        for index_key in index.keys(record) {
            stmt.execute(params![spec.name, index.name, index_key, key])?;
        }
    }

    Ok(key)
}
