//! SQLite schema definition.

/// Schema for the generic document store.
///
/// Every collection shares the `documents` table; secondary index keys live
/// in `index_entries`, one row per (index key, document) pair, so a
/// multi-valued field produces several rows.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    body TEXT NOT NULL,                          -- JSON record
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, key)
);

-- ============================================================================
-- Secondary Indexes
-- ============================================================================

CREATE TABLE IF NOT EXISTS index_entries (
    collection TEXT NOT NULL,
    index_name TEXT NOT NULL,
    index_key TEXT NOT NULL,
    doc_key TEXT NOT NULL,
    PRIMARY KEY (collection, index_name, index_key, doc_key),
    FOREIGN KEY (collection, doc_key)
        REFERENCES documents(collection, key) ON DELETE CASCADE
);

-- Lets a put drop a document's previous index rows cheaply
CREATE INDEX IF NOT EXISTS idx_index_entries_doc ON index_entries(collection, doc_key);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn test_index_entries_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO documents (collection, key, body) VALUES ('clients', 'c-1', '{}')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO index_entries (collection, index_name, index_key, doc_key) VALUES ('clients', 'pets', 'p-1', 'c-1')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM documents WHERE key = 'c-1'", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_index_entry_requires_document() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO index_entries (collection, index_name, index_key, doc_key) VALUES ('clients', 'pets', 'p-1', 'c-missing')",
            [],
        );
        assert!(result.is_err());
    }
}
