//! Memory Orchestrator
//!
//! The single entry point over the three tiers. It owns the collaborators,
//! splits token budgets across tiers, starts background consolidation after
//! writes, and runs every operation under the configured deadline.

use std::sync::Arc;
use std::time::Duration;

use ctxmem_core::{CompletionClient, KeyedStore, SemanticStore};
use tracing::{debug, warn};

use super::consolidation::ConsolidationEngine;
use super::format::format_memory;
use super::long_term::LongTermMemoryStore;
use super::short_term::ShortTermMemoryStore;
use super::similarity::QuerySimilarity;
use super::types::{
    ConsolidationRequest, ConsolidationResult, FormattedMemory, LoadedDocument, LongTermMemoryEntry,
    MemoryEntry, MemoryState, MemoryStateRequest, MemoryStats, NewMemoryEntry, RetrievedChunk, ShortTermMemory,
    WorkingMemory,
};
use super::working::WorkingMemoryStore;
use crate::config::MemoryConfig;
use crate::tasks::{RunnerStats, Submission, TaskRunner};
use crate::utils::within;
use crate::SDKResult;

/// Facade over short-term, working and long-term memory
pub struct MemoryOrchestrator {
    store: Arc<dyn KeyedStore>,
    short_term: Arc<ShortTermMemoryStore>,
    working: Arc<WorkingMemoryStore>,
    long_term: Arc<LongTermMemoryStore>,
    consolidation: Arc<ConsolidationEngine>,
    runner: Arc<TaskRunner>,
    config: MemoryConfig,
    operation_timeout: Option<Duration>,
}

impl MemoryOrchestrator {
    /// Wire the tiers over the given collaborators.
    ///
    /// Without a completion client the orchestrator works normally but never
    /// consolidates.
    pub fn new(
        store: Arc<dyn KeyedStore>,
        semantic: Arc<dyn SemanticStore>,
        completion: Option<Arc<dyn CompletionClient>>,
        config: MemoryConfig,
    ) -> Self {
        let store_handle = store.clone();
        let short_term = Arc::new(ShortTermMemoryStore::new(store.clone(), config.short_term.clone()));
        let working = Arc::new(WorkingMemoryStore::new(store.clone(), config.working.clone()));
        let long_term = Arc::new(LongTermMemoryStore::new(semantic, config.long_term.clone()));
        let consolidation = Arc::new(ConsolidationEngine::new(
            store,
            short_term.clone(),
            long_term.clone(),
            completion,
            config.consolidation.clone(),
        ));

        Self {
            store: store_handle,
            short_term,
            working,
            long_term,
            consolidation,
            runner: Arc::new(TaskRunner::new(4)),
            config,
            operation_timeout: None,
        }
    }

    /// Use a shared background runner
    pub fn with_runner(mut self, runner: Arc<TaskRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Run every operation under `timeout`
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Replace the query similarity used for staleness checks
    pub fn with_similarity(mut self, similarity: Arc<dyn QuerySimilarity>) -> Self {
        let working = WorkingMemoryStore::new(self.store.clone(), self.config.working.clone())
            .with_similarity(similarity);
        self.working = Arc::new(working);
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn short_term(&self) -> &ShortTermMemoryStore {
        &self.short_term
    }

    pub fn working(&self) -> &WorkingMemoryStore {
        &self.working
    }

    pub fn long_term(&self) -> &LongTermMemoryStore {
        &self.long_term
    }

    pub fn consolidation(&self) -> &ConsolidationEngine {
        &self.consolidation
    }

    /// Read the requested tiers.
    ///
    /// Long-term memory is searched only when it is enabled, requested, and a
    /// query is given. A failed search is logged and leaves that tier empty.
    pub async fn get_memory_state(&self, req: &MemoryStateRequest) -> SDKResult<MemoryState> {
        within(self.operation_timeout, self.read_state(req)).await
    }

    async fn read_state(&self, req: &MemoryStateRequest) -> SDKResult<MemoryState> {
        let short_term = if req.include_short_term {
            Some(
                self.short_term
                    .get_conversation(&req.session_id, &req.agent_id)
                    .await?,
            )
        } else {
            None
        };

        let working = if req.include_working {
            Some(
                self.working
                    .get_working_memory(&req.session_id, &req.agent_id)
                    .await?,
            )
        } else {
            None
        };

        let long_term = match req.query.as_deref() {
            Some(query) if req.include_long_term && self.long_term.is_enabled() => {
                let top_k = req.top_k.unwrap_or(self.config.long_term.default_top_k);
                match self.long_term.search_memory(&req.agent_id, query, top_k).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(
                            session_id = %req.session_id,
                            agent_id = %req.agent_id,
                            error = %e,
                            "Long-term search failed, continuing without it"
                        );
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        Ok(MemoryState {
            short_term,
            working,
            long_term,
        })
    }

    /// Render the requested tiers into one string bounded by `budget`
    /// (the configured default when `None`).
    pub async fn get_formatted_memory(
        &self,
        req: &MemoryStateRequest,
        budget: Option<usize>,
    ) -> SDKResult<FormattedMemory> {
        within(self.operation_timeout, async {
            let budget = budget.unwrap_or(self.config.budget.default_budget);
            let state = self.read_state(req).await?;

            let formatted = format_memory(
                state.short_term.as_ref(),
                state.working.as_ref(),
                &state.long_term,
                budget,
                &self.config.budget,
            );

            debug!(
                session_id = %req.session_id,
                agent_id = %req.agent_id,
                budget,
                total_tokens = formatted.total_tokens,
                truncated = formatted.truncated,
                "Formatted memory"
            );
            Ok(formatted)
        })
        .await
    }

    /// Append a turn, then start a background consolidation check.
    ///
    /// Returns once the turn is stored. The consolidation outcome is never
    /// reported to the caller; it may not run at all when the runner is busy
    /// or the process exits first.
    pub async fn add_memory(&self, entry: NewMemoryEntry) -> SDKResult<MemoryEntry> {
        let entry = within(self.operation_timeout, self.short_term.add_message(entry)).await?;
        self.schedule_consolidation(&entry.session_id, &entry.agent_id);
        Ok(entry)
    }

    fn schedule_consolidation(&self, session_id: &str, agent_id: &str) -> Option<Submission> {
        if !self.config.consolidation.auto_consolidate
            || !self.consolidation.can_consolidate()
            || !self.long_term.is_enabled()
        {
            return None;
        }

        let engine = self.consolidation.clone();
        let session = session_id.to_string();
        let agent = agent_id.to_string();
        let key = format!("consolidate:{}:{}", agent_id, session_id);

        let submission = self.runner.submit(key, async move {
            engine.consolidate_if_due(&session, &agent).await.map(|_| ())
        });
        debug!(session_id = %session_id, agent_id = %agent_id, ?submission, "Scheduled consolidation check");
        Some(submission)
    }

    /// Replace cached chunks and, when given, record the query that produced them.
    pub async fn update_working_memory(
        &self,
        session_id: &str,
        agent_id: &str,
        chunks: Vec<RetrievedChunk>,
        query: Option<&str>,
    ) -> SDKResult<WorkingMemory> {
        within(self.operation_timeout, async {
            let mut wm = self
                .working
                .set_document_context(session_id, agent_id, chunks)
                .await?;
            if let Some(query) = query {
                self.working.update_last_query(session_id, agent_id, query).await?;
                wm.record_query(query);
            }
            Ok(wm)
        })
        .await
    }

    pub async fn load_document(
        &self,
        session_id: &str,
        agent_id: &str,
        doc: LoadedDocument,
    ) -> SDKResult<WorkingMemory> {
        within(self.operation_timeout, self.working.load_document(session_id, agent_id, doc)).await
    }

    pub async fn unload_document(&self, session_id: &str, agent_id: &str, document_id: &str) -> SDKResult<bool> {
        within(
            self.operation_timeout,
            self.working.unload_document(session_id, agent_id, document_id),
        )
        .await
    }

    /// Consolidate now and report the outcome. Completion failures are errors.
    pub async fn consolidate_memory(&self, req: &ConsolidationRequest) -> SDKResult<ConsolidationResult> {
        within(self.operation_timeout, self.consolidation.consolidate_session(req)).await
    }

    /// Counters across all tiers for one (session, agent)
    pub async fn get_memory_stats(&self, session_id: &str, agent_id: &str) -> SDKResult<MemoryStats> {
        within(self.operation_timeout, async {
            let stm = self.short_term.get_conversation(session_id, agent_id).await?;
            let wm = self.working.get_working_memory(session_id, agent_id).await?;
            let long_term_entries = self.long_term.get_memory_count(agent_id).await?;
            let last_consolidated_at = self
                .consolidation
                .last_consolidated(session_id, agent_id)
                .await?;

            Ok(MemoryStats {
                session_id: session_id.to_string(),
                agent_id: agent_id.to_string(),
                short_term_entries: stm.len(),
                short_term_tokens: stm.total_tokens,
                working_documents: wm.loaded_documents.len(),
                working_chunks: wm.retrieved_chunks.len(),
                working_tokens: wm.total_tokens,
                long_term_enabled: self.long_term.is_enabled(),
                long_term_entries,
                last_query: wm.last_query,
                last_consolidated_at,
            })
        })
        .await
    }

    /// Drop the session's short-term and working memory. Long-term memory is agent
    /// scoped and stays.
    pub async fn clear_session(&self, session_id: &str, agent_id: &str) -> SDKResult<()> {
        within(self.operation_timeout, async {
            self.short_term.clear_conversation(session_id, agent_id).await?;
            self.working.clear_working_memory(session_id, agent_id).await?;
            debug!(session_id = %session_id, agent_id = %agent_id, "Cleared session memory");
            Ok(())
        })
        .await
    }

    /// Whether cached document context is stale for `new_query`
    pub async fn needs_document_refresh(&self, session_id: &str, agent_id: &str, new_query: &str) -> SDKResult<bool> {
        within(
            self.operation_timeout,
            self.working.is_context_stale(
                session_id,
                agent_id,
                new_query,
                self.config.working.staleness_threshold,
            ),
        )
        .await
    }

    /// Free-text search over an agent's long-term memory
    pub async fn search_long_term(
        &self,
        agent_id: &str,
        query: &str,
        top_k: Option<usize>,
    ) -> SDKResult<Vec<LongTermMemoryEntry>> {
        let top_k = top_k.unwrap_or(self.config.long_term.default_top_k);
        within(self.operation_timeout, self.long_term.search_memory(agent_id, query, top_k)).await
    }

    /// Store one fact directly in long-term memory
    pub async fn store_fact(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        fact: &str,
    ) -> SDKResult<Option<LongTermMemoryEntry>> {
        within(self.operation_timeout, self.long_term.store_fact(agent_id, session_id, fact)).await
    }

    /// Trim an agent's long-term memory to the configured per-agent maximum
    pub async fn prune_long_term(&self, agent_id: &str) -> SDKResult<usize> {
        within(
            self.operation_timeout,
            self.long_term
                .prune_old_memories(agent_id, self.config.long_term.max_entries_per_agent),
        )
        .await
    }

    /// Recent turns for the session
    pub async fn get_conversation(&self, session_id: &str, agent_id: &str) -> SDKResult<ShortTermMemory> {
        within(self.operation_timeout, self.short_term.get_conversation(session_id, agent_id)).await
    }

    /// Background runner counters
    pub fn runner_stats(&self) -> RunnerStats {
        self.runner.stats()
    }

    /// Wait for running background consolidations to finish
    pub async fn wait_for_background(&self) {
        self.runner.wait_idle().await;
    }
}
