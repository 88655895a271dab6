//! libSQL implementation of the key-value persistence boundary

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use libsql::{params, Connection};
use tokio::sync::Mutex;

use super::Database;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Durable store backed by a local libSQL database.
///
/// The connection sits behind a mutex so multi-statement transactions from
/// concurrent callers never interleave.
pub struct LibSqlStore {
    db: Mutex<Database>,
}

impl LibSqlStore {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (or create) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// All keys of `collection`, most recently written first
    pub async fn keys(&self, collection: &str) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT key FROM entries WHERE collection = ? ORDER BY updated_at DESC, key ASC",
                params![collection],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }

    async fn upsert(conn: &Connection, collection: &str, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO entries (collection, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(collection, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![collection, key, value, now],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for LibSqlStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT value FROM entries WHERE collection = ? AND key = ?",
                params![collection, key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        Self::upsert(db.connection(), collection, key, value).await
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM entries WHERE collection = ? AND key = ?",
                params![collection, key],
            )
            .await?;
        Ok(())
    }

    async fn bulk_set(&self, collection: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        for (key, value) in entries {
            if let Err(e) = Self::upsert(conn, collection, key, value).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }
        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM entries WHERE collection = ?",
                params![collection],
            )
            .await?;
        Ok(())
    }
}
