//! SqliteClassificationStore: decisions persisted across CI runs.

use super::schema::CLASSIFICATION_SCHEMA;
use super::ClassificationStore;
use crate::classify::{ErrorClassification, ErrorSignature};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str =
    "SELECT run_id, test_name, signature, category, source, details_json, classified_at FROM classifications";

/// SQLite-backed classification store.
#[derive(Clone)]
pub struct SqliteClassificationStore {
    conn: Arc<Mutex<Connection>>,
}

/// Raw column values; decoded outside the rusqlite row callback.
struct StoredRow {
    run_id: String,
    test_name: String,
    signature: Option<String>,
    category: String,
    source: String,
    details_json: String,
    classified_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            test_name: row.get(1)?,
            signature: row.get(2)?,
            category: row.get(3)?,
            source: row.get(4)?,
            details_json: row.get(5)?,
            classified_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<ErrorClassification, StoreError> {
        let classified_at = DateTime::parse_from_rfc3339(&self.classified_at)
            .map_err(|e| StoreError::Serialization(format!("classified_at: {e}")))?
            .with_timezone(&Utc);
        Ok(ErrorClassification {
            run_id: self.run_id,
            test_name: self.test_name,
            signature: self.signature.map(ErrorSignature::from_stored),
            category: self.category.parse().map_err(StoreError::Serialization)?,
            source: self.source.parse().map_err(StoreError::Serialization)?,
            details: serde_json::from_str(&self.details_json)?,
            classified_at,
        })
    }
}

impl SqliteClassificationStore {
    /// Open a file-backed store, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");
        conn.execute_batch(CLASSIFICATION_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM classifications", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    fn query_one(
        &self,
        sql: &str,
        key: &str,
    ) -> Result<Option<ErrorClassification>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(sql, [key], StoredRow::from_row)
            .optional()?;
        row.map(StoredRow::decode).transpose()
    }
}

impl ClassificationStore for SqliteClassificationStore {
    fn lookup(
        &self,
        signature: &ErrorSignature,
    ) -> Result<Option<ErrorClassification>, StoreError> {
        self.query_one(
            &format!("{SELECT_COLUMNS} WHERE signature = ?1 ORDER BY seq DESC LIMIT 1"),
            signature.as_str(),
        )
    }

    fn lookup_run(&self, run_id: &str) -> Result<Option<ErrorClassification>, StoreError> {
        self.query_one(&format!("{SELECT_COLUMNS} WHERE run_id = ?1"), run_id)
    }

    /// Upserts the whole batch in one transaction; a failure leaves no partial batch.
    fn persist(&self, batch: &[ErrorClassification]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in batch {
            let details_json = serde_json::to_string(&record.details)?;
            tx.execute(
                r#"
                INSERT INTO classifications (
                    run_id, test_name, signature, category, source,
                    details_json, classified_at, seq
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM classifications)
                )
                ON CONFLICT(run_id) DO UPDATE SET
                    test_name = excluded.test_name,
                    signature = excluded.signature,
                    category = excluded.category,
                    source = excluded.source,
                    details_json = excluded.details_json,
                    classified_at = excluded.classified_at,
                    seq = excluded.seq
                "#,
                params![
                    record.run_id,
                    record.test_name,
                    record.signature.as_ref().map(ErrorSignature::as_str),
                    record.category.as_str(),
                    record.source.as_str(),
                    details_json,
                    record.classified_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(records = batch.len(), "persisted classifications");
        Ok(())
    }
}
