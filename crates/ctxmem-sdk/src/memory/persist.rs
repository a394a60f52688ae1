//! Whole-container JSON persistence over a keyed store.
//!
//! Each write replaces the container under its key; concurrent writers to
//! the same key race and the last one wins.

use std::time::Duration;

use ctxmem_core::KeyedStore;
use serde::{de::DeserializeOwned, Serialize};

use crate::{SDKError, SDKResult};

/// Key of a session's short-term buffer
pub fn short_term_key(session_id: &str, agent_id: &str) -> String {
    format!("stm:{}:{}", agent_id, session_id)
}

/// Key of a session's working memory
pub fn working_key(session_id: &str, agent_id: &str) -> String {
    format!("wm:{}:{}", agent_id, session_id)
}

/// Key of a session's last-consolidated marker
pub fn consolidation_key(session_id: &str, agent_id: &str) -> String {
    format!("consolidation:last:{}:{}", agent_id, session_id)
}

/// Load and decode the value under `key`. Undecodable bytes are an error.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyedStore, key: &str) -> SDKResult<Option<T>> {
    match store.get(key).await? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SDKError::corrupt(key, e)),
    }
}

/// Encode and store `value` under `key` with `ttl`.
pub async fn save_json<T: Serialize>(
    store: &dyn KeyedStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> SDKResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes, Some(ttl)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxmem_core::MemoryKvStore;

    #[test]
    fn test_keys_are_scoped_by_agent_and_session() {
        assert_eq!(short_term_key("s1", "a1"), "stm:a1:s1");
        assert_eq!(working_key("s1", "a1"), "wm:a1:s1");
        assert_eq!(consolidation_key("s1", "a1"), "consolidation:last:a1:s1");
        assert_ne!(short_term_key("s1", "a1"), short_term_key("s1", "a2"));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = MemoryKvStore::new();
        let value: Option<Vec<u32>> = load_json(&store, "nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_load_garbage_is_corrupt() {
        let store = MemoryKvStore::new();
        store.set("k", b"{not json", None).await.unwrap();

        let err = load_json::<Vec<u32>>(&store, "k").await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryKvStore::new();
        save_json(&store, "k", &vec![1u32, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Vec<u32>> = load_json(&store, "k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }
}
