//! SQLite-backed keyed store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;

use super::KeyedStore;
use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_entries (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    expires_at INTEGER,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at);
";

/// Durable keyed store on a single SQLite table.
///
/// Expiry is lazy: expired rows are ignored on read and removed by
/// [`SqliteKvStore::cleanup_expired`].
#[derive(Clone)]
pub struct SqliteKvStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Delete every expired row. Returns the number removed.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        let removed = db.execute(
            "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        if removed > 0 {
            debug!(removed, "Cleaned up expired keys");
        }
        Ok(removed)
    }

    fn expiry_millis(now: i64, ttl: Duration) -> i64 {
        now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl KeyedStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        let value = db
            .query_row(
                "SELECT value FROM kv_entries
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let expires_at = ttl.map(|d| Self::expiry_millis(now, d));
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO kv_entries (key, value, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![key, value, expires_at, now],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        let live = db.execute(
            "DELETE FROM kv_entries
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            params![key, now],
        )?;
        // Drop any expired leftover under the same key as well
        db.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(live > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        let updated = db.execute(
            "UPDATE kv_entries SET expires_at = ?1, updated_at = ?2
             WHERE key = ?3 AND (expires_at IS NULL OR expires_at > ?2)",
            params![Self::expiry_millis(now, ttl), now, key],
        )?;
        Ok(updated > 0)
    }
}
