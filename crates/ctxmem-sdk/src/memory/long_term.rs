//! Long-term memory: agent-scoped durable entries in the semantic store.
//!
//! Each agent owns one collection. Entry fields other than id and content
//! travel in the record metadata. When long-term memory is disabled every
//! operation succeeds without touching the semantic store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ctxmem_core::{SearchFilters, SemanticRecord, SemanticStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::types::{ContentType, LongTermMemoryEntry};
use crate::config::LongTermConfig;
use crate::SDKResult;

/// Source type recorded on entries written by consolidation
pub const CONSOLIDATION_SOURCE: &str = "consolidation";

/// Entry fields stored as record metadata
#[derive(Debug, Serialize, Deserialize)]
struct RecordMeta {
    agent_id: String,
    #[serde(default)]
    tenant_id: Option<String>,
    content_type: ContentType,
    source_type: String,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    token_count: usize,
    created_at: DateTime<Utc>,
    #[serde(default)]
    extra: Value,
}

impl RecordMeta {
    fn from_entry(entry: &LongTermMemoryEntry) -> Self {
        Self {
            agent_id: entry.agent_id.clone(),
            tenant_id: entry.tenant_id.clone(),
            content_type: entry.content_type,
            source_type: entry.source_type.clone(),
            source_id: entry.source_id.clone(),
            session_id: entry.session_id.clone(),
            token_count: entry.token_count,
            created_at: entry.created_at,
            extra: entry.metadata.clone(),
        }
    }
}

fn entry_from_record(record: SemanticRecord) -> Option<LongTermMemoryEntry> {
    let meta: RecordMeta = match serde_json::from_value(record.metadata) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(record_id = %record.id, error = %e, "Skipping long-term record with malformed metadata");
            return None;
        }
    };

    Some(LongTermMemoryEntry {
        id: record.id,
        agent_id: meta.agent_id,
        tenant_id: meta.tenant_id,
        content_type: meta.content_type,
        content: record.content,
        source_type: meta.source_type,
        source_id: meta.source_id,
        session_id: meta.session_id,
        token_count: meta.token_count,
        relevance_score: record.score,
        access_count: record.access_count,
        created_at: meta.created_at,
        accessed_at: record.accessed_at,
        metadata: meta.extra,
    })
}

/// Summary entry whose metadata lists the short-term entries it covers
pub fn summary_entry(
    agent_id: &str,
    session_id: &str,
    summary: &str,
    source_entry_ids: &[String],
) -> LongTermMemoryEntry {
    LongTermMemoryEntry::new(agent_id, ContentType::Summary, summary)
        .with_session(session_id)
        .with_source(CONSOLIDATION_SOURCE, Some(session_id.to_string()))
        .with_metadata(json!({
            "source_entries": source_entry_ids,
            "source_count": source_entry_ids.len(),
        }))
}

/// Treat a missing collection as an empty one
fn or_empty<T: Default>(result: ctxmem_core::Result<T>) -> SDKResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_collection_not_found() => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Agent-scoped long-term memory over a semantic store
pub struct LongTermMemoryStore {
    semantic: Arc<dyn SemanticStore>,
    config: LongTermConfig,
}

impl LongTermMemoryStore {
    pub fn new(semantic: Arc<dyn SemanticStore>, config: LongTermConfig) -> Self {
        Self { semantic, config }
    }

    pub fn config(&self) -> &LongTermConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Collection holding an agent's entries
    pub fn collection(&self, agent_id: &str) -> String {
        format!("{}{}", self.config.collection_prefix, agent_id)
    }

    /// Entries ranked against `query`, best first. `top_k = 0` uses the configured default.
    pub async fn search_memory(&self, agent_id: &str, query: &str, top_k: usize) -> SDKResult<Vec<LongTermMemoryEntry>> {
        self.search_memory_filtered(agent_id, query, top_k, &SearchFilters::new())
            .await
    }

    /// Ranked search restricted to one content type
    pub async fn search_by_type(
        &self,
        agent_id: &str,
        query: &str,
        top_k: usize,
        content_type: ContentType,
    ) -> SDKResult<Vec<LongTermMemoryEntry>> {
        let filters = SearchFilters::new().eq("content_type", content_type.as_str());
        self.search_memory_filtered(agent_id, query, top_k, &filters).await
    }

    async fn search_memory_filtered(
        &self,
        agent_id: &str,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> SDKResult<Vec<LongTermMemoryEntry>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        let top_k = if top_k == 0 { self.config.default_top_k } else { top_k };
        let collection = self.collection(agent_id);
        let records = or_empty(self.semantic.search(&collection, query, top_k, filters).await)?;

        debug!(agent_id = %agent_id, hits = records.len(), top_k, "Searched long-term memory");
        Ok(records.into_iter().filter_map(entry_from_record).collect())
    }

    /// Write an entry. Returns it, or `None` when long-term memory is disabled.
    pub async fn store_memory(&self, entry: LongTermMemoryEntry) -> SDKResult<Option<LongTermMemoryEntry>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let collection = self.collection(&entry.agent_id);
        let metadata = serde_json::to_value(RecordMeta::from_entry(&entry))?;
        self.semantic
            .insert(&collection, &entry.id, &entry.content, metadata)
            .await?;

        debug!(
            agent_id = %entry.agent_id,
            entry_id = %entry.id,
            content_type = %entry.content_type,
            "Stored long-term memory"
        );
        Ok(Some(entry))
    }

    /// Write a consolidation summary recording which short-term entries it covers.
    pub async fn store_summary(
        &self,
        agent_id: &str,
        session_id: &str,
        summary: &str,
        source_entry_ids: &[String],
    ) -> SDKResult<Option<LongTermMemoryEntry>> {
        let entry = summary_entry(agent_id, session_id, summary, source_entry_ids);
        self.store_memory(entry).await
    }

    /// Write a single atomic fact.
    pub async fn store_fact(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        fact: &str,
    ) -> SDKResult<Option<LongTermMemoryEntry>> {
        let mut entry = LongTermMemoryEntry::new(agent_id, ContentType::Fact, fact);
        if let Some(session_id) = session_id {
            entry = entry.with_session(session_id);
        }

        self.store_memory(entry).await
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete_memory(&self, agent_id: &str, entry_id: &str) -> SDKResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let collection = self.collection(agent_id);
        or_empty(self.semantic.delete(&collection, entry_id).await)
    }

    /// Most recently written entries, newest first
    pub async fn get_recent_memories(&self, agent_id: &str, limit: usize) -> SDKResult<Vec<LongTermMemoryEntry>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        let collection = self.collection(agent_id);
        let records = or_empty(self.semantic.recent(&collection, limit).await)?;
        Ok(records.into_iter().filter_map(entry_from_record).collect())
    }

    /// Number of entries stored for the agent
    pub async fn get_memory_count(&self, agent_id: &str) -> SDKResult<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let collection = self.collection(agent_id);
        or_empty(self.semantic.count(&collection).await)
    }

    /// Remove least recently accessed entries until at most `max_entries` remain.
    ///
    /// Returns the number removed.
    pub async fn prune_old_memories(&self, agent_id: &str, max_entries: usize) -> SDKResult<usize> {
        let count = self.get_memory_count(agent_id).await?;
        let excess = count.saturating_sub(max_entries);
        if excess == 0 {
            return Ok(0);
        }

        let collection = self.collection(agent_id);
        let removed = or_empty(
            self.semantic
                .evict_least_recently_accessed(&collection, excess)
                .await,
        )?;

        info!(agent_id = %agent_id, removed, remaining = count - removed, "Pruned long-term memory");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxmem_core::InMemorySemanticStore;

    fn ltm() -> (Arc<InMemorySemanticStore>, LongTermMemoryStore) {
        let semantic = Arc::new(InMemorySemanticStore::new());
        let store = LongTermMemoryStore::new(semantic.clone(), LongTermConfig::default());
        (semantic, store)
    }

    fn disabled() -> LongTermMemoryStore {
        let config = LongTermConfig {
            enabled: false,
            ..Default::default()
        };
        LongTermMemoryStore::new(Arc::new(InMemorySemanticStore::new()), config)
    }

    #[tokio::test]
    async fn test_search_unknown_agent_is_empty() {
        let (_, store) = ltm();
        let results = store.search_memory("nobody", "anything", 5).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(store.get_memory_count("nobody").await.unwrap(), 0);
        assert!(store.get_recent_memories("nobody", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_and_search_roundtrip() {
        let (_, store) = ltm();
        store
            .store_fact("a1", Some("s1"), "The user prefers Rust for systems work")
            .await
            .unwrap();
        store
            .store_fact("a1", None, "The office is closed on Fridays")
            .await
            .unwrap();

        let results = store.search_memory("a1", "rust systems", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content_type, ContentType::Fact);
        assert!(results[0].content.contains("Rust"));
        assert_eq!(results[0].session_id.as_deref(), Some("s1"));
        assert!(results[0].relevance_score > 0.0);
    }

    #[tokio::test]
    async fn test_store_summary_records_sources() {
        let (_, store) = ltm();
        let ids = vec!["e1".to_string(), "e2".to_string()];
        let stored = store
            .store_summary("a1", "s1", "Discussed deployment plans", &ids)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.content_type, ContentType::Summary);
        assert_eq!(stored.source_type, CONSOLIDATION_SOURCE);

        let recent = store.get_recent_memories("a1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].metadata["source_entries"], json!(["e1", "e2"]));
        assert_eq!(recent[0].metadata["source_count"], 2);
    }

    #[tokio::test]
    async fn test_search_by_type() {
        let (_, store) = ltm();
        store.store_fact("a1", None, "deploys happen on tuesday").await.unwrap();
        store
            .store_summary("a1", "s1", "talked about deploys and tuesday", &[])
            .await
            .unwrap();

        let summaries = store
            .search_by_type("a1", "deploys tuesday", 5, ContentType::Summary)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].content_type, ContentType::Summary);
    }

    #[tokio::test]
    async fn test_collections_are_agent_scoped() {
        let (_, store) = ltm();
        store.store_fact("a1", None, "agent one secret").await.unwrap();

        assert!(store.search_memory("a2", "secret", 5).await.unwrap().is_empty());
        assert_eq!(store.collection("a1"), "ltm-a1");
    }

    #[tokio::test]
    async fn test_prune_removes_excess() {
        let (_, store) = ltm();
        for i in 0..5 {
            store.store_fact("a1", None, &format!("fact number {}", i)).await.unwrap();
        }

        assert_eq!(store.prune_old_memories("a1", 10).await.unwrap(), 0);
        assert_eq!(store.prune_old_memories("a1", 3).await.unwrap(), 2);
        assert_eq!(store.get_memory_count("a1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_memory() {
        let (_, store) = ltm();
        let entry = store.store_fact("a1", None, "temporary").await.unwrap().unwrap();

        assert!(store.delete_memory("a1", &entry.id).await.unwrap());
        assert!(!store.delete_memory("a1", &entry.id).await.unwrap());
        assert!(!store.delete_memory("a2", &entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_skipped() {
        let (semantic, store) = ltm();
        semantic
            .insert("ltm-a1", "bad", "orphan record", json!({"unexpected": true}))
            .await
            .unwrap();
        store.store_fact("a1", None, "orphan facts are fine").await.unwrap();

        let results = store.search_memory("a1", "orphan", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "orphan facts are fine");
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let store = disabled();
        assert!(store.store_fact("a1", None, "ignored").await.unwrap().is_none());
        assert!(store.search_memory("a1", "ignored", 5).await.unwrap().is_empty());
        assert_eq!(store.get_memory_count("a1").await.unwrap(), 0);
        assert_eq!(store.prune_old_memories("a1", 0).await.unwrap(), 0);
        assert!(!store.delete_memory("a1", "x").await.unwrap());
    }
}
