//! Short-term memory: the per-session dialogue buffer.

use std::sync::Arc;
use std::time::Duration;

use ctxmem_core::KeyedStore;
use tracing::debug;

use super::persist::{load_json, save_json, short_term_key};
use super::types::{MemoryEntry, NewMemoryEntry, ShortTermMemory};
use crate::config::ShortTermConfig;
use crate::SDKResult;

/// Reads and writes short-term buffers in the keyed store
pub struct ShortTermMemoryStore {
    store: Arc<dyn KeyedStore>,
    config: ShortTermConfig,
}

impl ShortTermMemoryStore {
    pub fn new(store: Arc<dyn KeyedStore>, config: ShortTermConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ShortTermConfig {
        &self.config
    }

    /// Existing buffer, or an empty one with default ceilings.
    pub async fn get_conversation(&self, session_id: &str, agent_id: &str) -> SDKResult<ShortTermMemory> {
        let key = short_term_key(session_id, agent_id);
        let stm = load_json(self.store.as_ref(), &key).await?;
        Ok(stm.unwrap_or_else(|| ShortTermMemory::new(session_id, agent_id, &self.config)))
    }

    /// Append a turn, evict down to the ceilings, persist with a fresh TTL.
    pub async fn add_message(&self, entry: NewMemoryEntry) -> SDKResult<MemoryEntry> {
        let entry = entry.into_entry();
        let mut stm = self.get_conversation(&entry.session_id, &entry.agent_id).await?;

        let evicted = stm.push(entry.clone());
        if !evicted.is_empty() {
            debug!(
                session_id = %entry.session_id,
                agent_id = %entry.agent_id,
                evicted = evicted.len(),
                "Evicted oldest short-term entries"
            );
        }

        self.save(&mut stm).await?;
        Ok(entry)
    }

    /// Evict oldest entries until the buffer fits `budget` tokens, and persist.
    pub async fn trim_to_token_limit(
        &self,
        session_id: &str,
        agent_id: &str,
        budget: usize,
    ) -> SDKResult<ShortTermMemory> {
        let mut stm = self.get_conversation(session_id, agent_id).await?;
        let evicted = stm.trim_to(budget);

        if !evicted.is_empty() {
            debug!(
                session_id = %session_id,
                agent_id = %agent_id,
                evicted = evicted.len(),
                budget,
                "Trimmed short-term memory"
            );
            self.save(&mut stm).await?;
        }

        Ok(stm)
    }

    /// Last `limit` turns in order, or all of them if fewer exist
    pub async fn get_recent_messages(
        &self,
        session_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> SDKResult<Vec<MemoryEntry>> {
        let stm = self.get_conversation(session_id, agent_id).await?;
        Ok(stm.recent(limit))
    }

    /// Delete the buffer. Returns whether one existed.
    pub async fn clear_conversation(&self, session_id: &str, agent_id: &str) -> SDKResult<bool> {
        let key = short_term_key(session_id, agent_id);
        let removed = self.store.delete(&key).await?;
        debug!(session_id = %session_id, agent_id = %agent_id, removed, "Cleared short-term memory");
        Ok(removed)
    }

    /// Reset the buffer's expiry. Returns false if there is no buffer.
    pub async fn set_expiration(&self, session_id: &str, agent_id: &str, ttl: Duration) -> SDKResult<bool> {
        let key = short_term_key(session_id, agent_id);
        let Some(mut stm) = load_json::<ShortTermMemory>(self.store.as_ref(), &key).await? else {
            return Ok(false);
        };

        stm.touch(ttl);
        save_json(self.store.as_ref(), &key, &stm, ttl).await?;
        Ok(true)
    }

    async fn save(&self, stm: &mut ShortTermMemory) -> SDKResult<()> {
        let ttl = self.config.ttl();
        stm.touch(ttl);
        let key = short_term_key(&stm.session_id, &stm.agent_id);
        save_json(self.store.as_ref(), &key, stm, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Role;
    use ctxmem_core::MemoryKvStore;

    fn store_with(config: ShortTermConfig) -> (Arc<MemoryKvStore>, ShortTermMemoryStore) {
        let kv = Arc::new(MemoryKvStore::new());
        let stm = ShortTermMemoryStore::new(kv.clone(), config);
        (kv, stm)
    }

    fn turn(role: Role, content: &str) -> NewMemoryEntry {
        NewMemoryEntry::new("s1", "a1", role, content)
    }

    #[tokio::test]
    async fn test_unseen_session_is_empty() {
        let (_, stm) = store_with(ShortTermConfig::default());
        let conv = stm.get_conversation("s1", "a1").await.unwrap();

        assert!(conv.is_empty());
        assert_eq!(conv.total_tokens, 0);
        assert_eq!(conv.max_entries, 50);
        assert_eq!(conv.max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_add_message_persists_in_order() {
        let (_, stm) = store_with(ShortTermConfig::default());
        stm.add_message(turn(Role::User, "Hello")).await.unwrap();
        stm.add_message(turn(Role::Assistant, "Hi there")).await.unwrap();

        let conv = stm.get_conversation("s1", "a1").await.unwrap();
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.entries[0].role, Role::User);
        assert_eq!(conv.entries[1].content, "Hi there");
        assert_eq!(conv.total_tokens, conv.entries.iter().map(|e| e.token_count).sum::<usize>());
    }

    #[tokio::test]
    async fn test_ceilings_hold_after_every_add() {
        let config = ShortTermConfig {
            max_entries: 4,
            max_tokens: 12,
            ..Default::default()
        };
        let (_, stm) = store_with(config);

        for i in 0..20 {
            let content = "w".repeat((i % 5) * 4 + 1);
            stm.add_message(turn(Role::User, &content)).await.unwrap();

            let conv = stm.get_conversation("s1", "a1").await.unwrap();
            assert!(conv.len() <= 4);
            assert!(conv.total_tokens <= 12);
            assert_eq!(conv.total_tokens, conv.entries.iter().map(|e| e.token_count).sum::<usize>());
        }
    }

    #[tokio::test]
    async fn test_trim_to_token_limit_persists() {
        let (_, stm) = store_with(ShortTermConfig::default());
        for i in 0..4 {
            stm.add_message(turn(Role::User, &format!("message {}", i))).await.unwrap();
        }

        let trimmed = stm.trim_to_token_limit("s1", "a1", 6).await.unwrap();
        assert!(trimmed.total_tokens <= 6);
        assert_eq!(trimmed.entries.back().unwrap().content, "message 3");

        let reloaded = stm.get_conversation("s1", "a1").await.unwrap();
        assert_eq!(reloaded, trimmed);
    }

    #[tokio::test]
    async fn test_get_recent_messages() {
        let (_, stm) = store_with(ShortTermConfig::default());
        for i in 0..3 {
            stm.add_message(turn(Role::User, &format!("m{}", i))).await.unwrap();
        }

        let recent = stm.get_recent_messages("s1", "a1", 2).await.unwrap();
        assert_eq!(recent.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(), vec!["m1", "m2"]);
        assert_eq!(stm.get_recent_messages("s1", "a1", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_clear_and_set_expiration() {
        let (_, stm) = store_with(ShortTermConfig::default());
        assert!(!stm.set_expiration("s1", "a1", Duration::from_secs(10)).await.unwrap());

        stm.add_message(turn(Role::User, "hi")).await.unwrap();
        assert!(stm.set_expiration("s1", "a1", Duration::from_secs(10)).await.unwrap());

        assert!(stm.clear_conversation("s1", "a1").await.unwrap());
        assert!(stm.get_conversation("s1", "a1").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_expires_after_ttl() {
        let config = ShortTermConfig {
            ttl_seconds: 60,
            ..Default::default()
        };
        let (_, stm) = store_with(config);
        stm.add_message(turn(Role::User, "hi")).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(stm.get_conversation("s1", "a1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_accepted() {
        let config = ShortTermConfig {
            ttl_seconds: u64::MAX,
            ..Default::default()
        };
        let (_, stm) = store_with(config);
        stm.add_message(turn(Role::User, "hi")).await.unwrap();

        assert_eq!(stm.get_conversation("s1", "a1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_buffer_is_an_error() {
        let (kv, stm) = store_with(ShortTermConfig::default());
        kv.set(&short_term_key("s1", "a1"), b"garbage", None).await.unwrap();

        let err = stm.get_conversation("s1", "a1").await.unwrap_err();
        assert!(err.is_corrupt());
    }
}
