//! SqliteStore: SQLite-backed object store.
//!
//! All collections share one `records` table keyed by `(collection, id)`.
//! Record bodies are stored as JSON text; secondary indices are expression
//! indexes over `json_extract`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::schema::{self, CollectionSchema, DEFAULT_COLLECTIONS, RECORDS_SCHEMA};
use super::Store;
use crate::error::{StoreError, StoreResult};

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    collections: Arc<Vec<CollectionSchema>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("collections", &self.collections)
            .finish()
    }
}

impl SqliteStore {
    /// Open a file-backed store, creating parent directories as needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Create store from existing connection.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        Self::with_collections(conn, DEFAULT_COLLECTIONS.to_vec())
    }

    /// Create store with an explicit set of collections.
    pub fn with_collections(
        conn: Connection,
        collections: Vec<CollectionSchema>,
    ) -> StoreResult<Self> {
        Self::init_connection(&conn, &collections)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            collections: Arc::new(collections),
        })
    }

    fn init_connection(conn: &Connection, collections: &[CollectionSchema]) -> StoreResult<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL");
        let _ = conn.execute_batch("PRAGMA busy_timeout = 5000");
        conn.execute_batch(RECORDS_SCHEMA)?;
        for c in collections {
            for index in c.indexes {
                conn.execute_batch(&schema::index_ddl(c.name, index))?;
            }
        }
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn schema(&self, collection: &str) -> StoreResult<&CollectionSchema> {
        self.collections
            .iter()
            .find(|c| c.name == collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn record_key(&self, schema: &CollectionSchema, record: &Value) -> StoreResult<String> {
        record
            .get(schema.key_path)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| StoreError::InvalidRecord {
                collection: schema.name.to_string(),
                reason: format!("missing string key at '{}'", schema.key_path),
            })
    }

    fn decode_rows(rows: Vec<(String, String)>) -> StoreResult<Vec<Value>> {
        rows.into_iter()
            .map(|(id, body)| {
                serde_json::from_str(&body).map_err(|e| StoreError::Corrupt {
                    key: id,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        self.schema(collection)?;
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| {
            serde_json::from_str(&b).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn put(&self, collection: &str, record: Value) -> StoreResult<()> {
        let schema = self.schema(collection)?;
        let key = self.record_key(schema, &record)?;
        let body = serde_json::to_string(&record)?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
            ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body
            "#,
            params![collection, key, body],
        )?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.schema(collection)?;
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, key],
        )?;
        Ok(())
    }

    async fn clear(&self, collection: &str) -> StoreResult<()> {
        self.schema(collection)?;
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![collection],
        )?;
        debug!(collection, removed, "cleared collection");
        Ok(())
    }

    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.schema(collection)?;
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Self::decode_rows(rows)
    }

    async fn get_all_from_index(&self, collection: &str, index: &str) -> StoreResult<Vec<Value>> {
        let schema = self.schema(collection)?;
        if !schema.has_index(index) {
            return Err(StoreError::UnknownIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }

        let sql = format!(
            "SELECT id, body FROM records WHERE collection = ?1 \
             ORDER BY json_extract(body, '{}') ASC, id ASC",
            schema::index_path(index)
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Self::decode_rows(rows)
    }

    async fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()> {
        self.schema(collection)?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let attempted = keys.len();
        let tx = conn.transaction().map_err(|e| StoreError::Transaction {
            attempted,
            message: e.to_string(),
        })?;
        {
            let mut stmt = tx
                .prepare("DELETE FROM records WHERE collection = ?1 AND id = ?2")
                .map_err(|e| StoreError::Transaction {
                    attempted,
                    message: e.to_string(),
                })?;
            for key in keys {
                stmt.execute(params![collection, key])
                    .map_err(|e| StoreError::Transaction {
                        attempted,
                        message: format!("delete {}: {}", key, e),
                    })?;
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(|e| StoreError::Transaction {
            attempted,
            message: e.to_string(),
        })
    }

    async fn replace_all(&self, collection: &str, records: Vec<Value>) -> StoreResult<()> {
        let schema = *self.schema(collection)?;
        let attempted = records.len();

        let mut encoded = Vec::with_capacity(records.len());
        for record in &records {
            let key = self.record_key(&schema, record)?;
            encoded.push((key, serde_json::to_string(record)?));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| StoreError::Transaction {
            attempted,
            message: e.to_string(),
        })?;
        tx.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![collection],
        )
        .map_err(|e| StoreError::Transaction {
            attempted,
            message: e.to_string(),
        })?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
                )
                .map_err(|e| StoreError::Transaction {
                    attempted,
                    message: e.to_string(),
                })?;
            for (key, body) in &encoded {
                stmt.execute(params![collection, key, body])
                    .map_err(|e| StoreError::Transaction {
                        attempted,
                        message: format!("insert {}: {}", key, e),
                    })?;
            }
        }
        tx.commit().map_err(|e| StoreError::Transaction {
            attempted,
            message: e.to_string(),
        })
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        self.schema(collection)?;
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
