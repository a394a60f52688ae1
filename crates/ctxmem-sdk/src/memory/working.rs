//! Working memory: per-session cache of documents and retrieved fragments.

use std::sync::Arc;

use ctxmem_core::KeyedStore;
use tracing::debug;

use super::persist::{load_json, save_json, working_key};
use super::similarity::{QuerySimilarity, WordOverlap};
use super::types::{LoadedDocument, RetrievedChunk, WorkingMemory};
use crate::config::WorkingConfig;
use crate::SDKResult;

/// Reads and writes working memory in the keyed store
pub struct WorkingMemoryStore {
    store: Arc<dyn KeyedStore>,
    config: WorkingConfig,
    similarity: Arc<dyn QuerySimilarity>,
}

impl WorkingMemoryStore {
    pub fn new(store: Arc<dyn KeyedStore>, config: WorkingConfig) -> Self {
        Self {
            store,
            config,
            similarity: Arc::new(WordOverlap),
        }
    }

    /// Replace the query similarity measure used for staleness checks
    pub fn with_similarity(mut self, similarity: Arc<dyn QuerySimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn config(&self) -> &WorkingConfig {
        &self.config
    }

    /// Existing cache, or an empty one with default ceilings.
    pub async fn get_working_memory(&self, session_id: &str, agent_id: &str) -> SDKResult<WorkingMemory> {
        let key = working_key(session_id, agent_id);
        let wm = load_json(self.store.as_ref(), &key).await?;
        Ok(wm.unwrap_or_else(|| WorkingMemory::new(session_id, agent_id, &self.config)))
    }

    /// Replace the cached chunks, dropping everything from the first chunk
    /// that would overflow the token ceiling.
    pub async fn set_document_context(
        &self,
        session_id: &str,
        agent_id: &str,
        chunks: Vec<RetrievedChunk>,
    ) -> SDKResult<WorkingMemory> {
        let mut wm = self.get_working_memory(session_id, agent_id).await?;
        let dropped = wm.set_chunks(chunks);

        debug!(
            session_id = %session_id,
            agent_id = %agent_id,
            chunks = wm.retrieved_chunks.len(),
            dropped,
            total_tokens = wm.total_tokens,
            "Set document context"
        );

        self.save(&mut wm).await?;
        Ok(wm)
    }

    /// Insert or replace a loaded document; a new one at the ceiling evicts the oldest.
    pub async fn load_document(
        &self,
        session_id: &str,
        agent_id: &str,
        doc: LoadedDocument,
    ) -> SDKResult<WorkingMemory> {
        let mut wm = self.get_working_memory(session_id, agent_id).await?;
        if let Some(evicted) = wm.upsert_document(doc) {
            debug!(
                session_id = %session_id,
                agent_id = %agent_id,
                document_id = %evicted.document_id,
                "Evicted oldest loaded document"
            );
        }

        self.save(&mut wm).await?;
        Ok(wm)
    }

    /// Remove a document and its chunks. Returns whether anything was removed.
    pub async fn unload_document(&self, session_id: &str, agent_id: &str, document_id: &str) -> SDKResult<bool> {
        let mut wm = self.get_working_memory(session_id, agent_id).await?;
        if !wm.remove_document(document_id) {
            return Ok(false);
        }

        debug!(session_id = %session_id, agent_id = %agent_id, document_id, "Unloaded document");
        self.save(&mut wm).await?;
        Ok(true)
    }

    /// Record the query that produced the current cache
    pub async fn update_last_query(&self, session_id: &str, agent_id: &str, query: &str) -> SDKResult<()> {
        let mut wm = self.get_working_memory(session_id, agent_id).await?;
        wm.record_query(query);
        self.save(&mut wm).await
    }

    /// Whether the cache should be refreshed before answering `new_query`.
    ///
    /// Stale when nothing is cached, when no query was recorded, or when the
    /// similarity of the two queries falls below `threshold`.
    pub async fn is_context_stale(
        &self,
        session_id: &str,
        agent_id: &str,
        new_query: &str,
        threshold: f64,
    ) -> SDKResult<bool> {
        let wm = self.get_working_memory(session_id, agent_id).await?;
        Ok(self.is_stale(&wm, new_query, threshold))
    }

    /// Staleness check against an already loaded cache
    pub fn is_stale(&self, wm: &WorkingMemory, new_query: &str, threshold: f64) -> bool {
        let Some(last_query) = wm.last_query.as_deref() else {
            return true;
        };
        if wm.retrieved_chunks.is_empty() {
            return true;
        }

        self.similarity.similarity(last_query, new_query) < threshold
    }

    /// Delete the cache. Returns whether one existed.
    pub async fn clear_working_memory(&self, session_id: &str, agent_id: &str) -> SDKResult<bool> {
        let key = working_key(session_id, agent_id);
        let removed = self.store.delete(&key).await?;
        debug!(session_id = %session_id, agent_id = %agent_id, removed, "Cleared working memory");
        Ok(removed)
    }

    async fn save(&self, wm: &mut WorkingMemory) -> SDKResult<()> {
        let ttl = self.config.ttl();
        wm.touch(ttl);
        let key = working_key(&wm.session_id, &wm.agent_id);
        save_json(self.store.as_ref(), &key, wm, ttl).await
    }
}
