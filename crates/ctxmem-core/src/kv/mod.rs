//! Keyed store with TTL semantics.
//!
//! The short-term and working tiers persist whole containers under a single
//! key. Any store that can get, set with a TTL, delete and re-expire a key is
//! enough; nothing else is required of the backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::Result;

#[cfg(feature = "db")]
mod sqlite;

#[cfg(feature = "db")]
pub use sqlite::SqliteKvStore;

/// Keyed byte store with per-key expiry.
///
/// `ttl = None` stores the value without expiry. Expired keys behave exactly
/// like missing keys.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Delete `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Reset the TTL of an existing key. Returns false if the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local keyed store.
///
/// Shares nothing across processes; meant for tests and for embedding the
/// subsystem where durability is not needed.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let slots = self.slots.read().await;
        slots.values().filter(|s| s.is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyedStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        match slots.get(key) {
            Some(slot) if slot.is_live(now) => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let slot = Slot {
            value: value.to_vec(),
            expires_at: ttl.and_then(|d| Instant::now().checked_add(d)),
        };
        self.slots.write().await.insert(key.to_string(), slot);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.slots.write().await.remove(key);
        Ok(removed.is_some_and(|s| s.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        match slots.get_mut(key) {
            Some(slot) if slot.is_live(now) => {
                slot.expires_at = now.checked_add(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
