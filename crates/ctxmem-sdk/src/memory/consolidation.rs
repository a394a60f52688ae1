//! Consolidation: folding a session's short-term buffer into long-term memory.
//!
//! A run summarizes the oldest buffered turns with the completion endpoint,
//! optionally extracts atomic facts, writes both to long-term memory and
//! records a "last consolidated" marker for the session. Buffered turns are
//! left in place; the short-term ceilings and TTL retire them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ctxmem_core::{estimate_tokens, ChatMessage, CompletionClient, CompletionRequest, KeyedStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::format::format_short_term;
use super::long_term::{summary_entry, LongTermMemoryStore, CONSOLIDATION_SOURCE};
use super::persist::{consolidation_key, load_json, save_json};
use super::short_term::ShortTermMemoryStore;
use super::types::{ConsolidationRequest, ConsolidationResult, ContentType, FactExtraction, LongTermMemoryEntry, MemoryEntry};
use crate::config::ConsolidationConfig;
use crate::utils::{elapsed_since, now_utc};
use crate::{SDKError, SDKResult};

/// Lifetime of the last-consolidated marker, independent of session TTLs
pub const MARKER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const SUMMARY_PROMPT: &str = "You maintain long-term memory for an AI assistant. \
Summarize the conversation below in a few sentences. Keep decisions, stated preferences \
and facts about the user; drop greetings and filler. Reply with the summary only.";

const FACTS_PROMPT: &str = "You extract durable facts from conversations. \
List every self-contained fact worth remembering from the conversation below. \
Reply with a JSON array of strings and nothing else. Reply with [] if there are none.";

#[derive(Debug, Serialize, Deserialize)]
struct ConsolidationMarker {
    consolidated_at: DateTime<Utc>,
    entries_processed: usize,
}

/// Decides when to consolidate and performs consolidation runs
pub struct ConsolidationEngine {
    store: Arc<dyn KeyedStore>,
    short_term: Arc<ShortTermMemoryStore>,
    long_term: Arc<LongTermMemoryStore>,
    completion: Option<Arc<dyn CompletionClient>>,
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        short_term: Arc<ShortTermMemoryStore>,
        long_term: Arc<LongTermMemoryStore>,
        completion: Option<Arc<dyn CompletionClient>>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            store,
            short_term,
            long_term,
            completion,
            config,
        }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Whether a completion endpoint is available
    pub fn can_consolidate(&self) -> bool {
        self.completion.is_some()
    }

    /// When the session was last consolidated, if the marker is still live
    pub async fn last_consolidated(&self, session_id: &str, agent_id: &str) -> SDKResult<Option<DateTime<Utc>>> {
        let key = consolidation_key(session_id, agent_id);
        let marker: Option<ConsolidationMarker> = load_json(self.store.as_ref(), &key).await?;
        Ok(marker.map(|m| m.consolidated_at))
    }

    /// True if the session was never consolidated or the interval has elapsed.
    pub async fn should_consolidate(&self, session_id: &str, agent_id: &str) -> SDKResult<bool> {
        let due = match self.last_consolidated(session_id, agent_id).await? {
            None => true,
            Some(at) => elapsed_since(at) > self.config.interval(),
        };
        Ok(due)
    }

    /// Consolidate only if due. Used for background evaluation after a write.
    pub async fn consolidate_if_due(&self, session_id: &str, agent_id: &str) -> SDKResult<ConsolidationResult> {
        if !self.should_consolidate(session_id, agent_id).await? {
            debug!(session_id = %session_id, agent_id = %agent_id, "Consolidation not due");
            return Ok(ConsolidationResult::skipped(0));
        }

        self.consolidate_session(&ConsolidationRequest::new(session_id, agent_id))
            .await
    }

    /// Fold the oldest buffered turns into a long-term summary.
    ///
    /// Without `force`, buffers with fewer than 2 turns or fewer tokens than
    /// the configured minimum are left alone and nothing is written.
    pub async fn consolidate_session(&self, req: &ConsolidationRequest) -> SDKResult<ConsolidationResult> {
        let started = Instant::now();
        let skipped = |started: Instant| ConsolidationResult::skipped(started.elapsed().as_millis() as u64);

        if !self.long_term.is_enabled() {
            debug!(session_id = %req.session_id, "Long-term memory disabled, skipping consolidation");
            return Ok(skipped(started));
        }

        let stm = self
            .short_term
            .get_conversation(&req.session_id, &req.agent_id)
            .await?;

        if stm.is_empty() {
            return Ok(skipped(started));
        }
        if !req.force && (stm.len() < 2 || stm.total_tokens < self.config.min_tokens) {
            debug!(
                session_id = %req.session_id,
                agent_id = %req.agent_id,
                entries = stm.len(),
                tokens = stm.total_tokens,
                "Buffer below consolidation threshold"
            );
            return Ok(skipped(started));
        }

        let limit = if req.max_entries == 0 {
            self.config.max_entries
        } else {
            req.max_entries
        };
        let entries = stm.oldest(limit);
        let original_tokens: usize = entries.iter().map(|e| e.token_count).sum();

        let summary = self.generate_summary(&entries).await?;
        let summary_tokens = estimate_tokens(&summary);

        let source_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let mut summary = summary_entry(&req.agent_id, &req.session_id, &summary, &source_ids);
        summary.tenant_id = req.tenant_id.clone();
        self.long_term.store_memory(summary).await?;

        let mut facts_created = 0;
        if self.config.extract_facts {
            let extraction = self.extract_facts(&entries).await?;
            if let FactExtraction::Malformed { raw } = &extraction {
                warn!(
                    session_id = %req.session_id,
                    agent_id = %req.agent_id,
                    response_len = raw.len(),
                    "Fact extraction returned malformed JSON"
                );
            }

            for fact in extraction.into_facts() {
                let mut entry = LongTermMemoryEntry::new(&req.agent_id, ContentType::Fact, fact)
                    .with_session(&req.session_id)
                    .with_source(CONSOLIDATION_SOURCE, Some(req.session_id.clone()));
                entry.tenant_id = req.tenant_id.clone();
                if self.long_term.store_memory(entry).await?.is_some() {
                    facts_created += 1;
                }
            }
        }

        let marker = ConsolidationMarker {
            consolidated_at: now_utc(),
            entries_processed: entries.len(),
        };
        let key = consolidation_key(&req.session_id, &req.agent_id);
        save_json(self.store.as_ref(), &key, &marker, MARKER_TTL).await?;

        let result = ConsolidationResult {
            entries_processed: entries.len(),
            summaries_created: 1,
            facts_created,
            tokens_consolidated: original_tokens,
            tokens_saved: original_tokens as i64 - summary_tokens as i64,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: marker.consolidated_at,
        };

        info!(
            session_id = %req.session_id,
            agent_id = %req.agent_id,
            entries = result.entries_processed,
            facts = result.facts_created,
            tokens_saved = result.tokens_saved,
            forced = req.force,
            "Consolidated session"
        );

        Ok(result)
    }

    /// Ask the completion endpoint for a prose summary of `entries`.
    pub async fn generate_summary(&self, entries: &[MemoryEntry]) -> SDKResult<String> {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(SUMMARY_PROMPT),
                ChatMessage::user(format_short_term(entries)),
            ],
            self.config.summary_max_tokens,
            self.config.summary_temperature,
        );

        let summary = self.client()?.complete(request).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(SDKError::completion("summary was empty"));
        }
        Ok(summary.to_string())
    }

    /// Ask the completion endpoint for a JSON array of facts about `entries`.
    pub async fn extract_facts(&self, entries: &[MemoryEntry]) -> SDKResult<FactExtraction> {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(FACTS_PROMPT),
                ChatMessage::user(format_short_term(entries)),
            ],
            self.config.facts_max_tokens,
            self.config.facts_temperature,
        );

        let raw = self.client()?.complete(request).await?;
        Ok(parse_facts(&raw))
    }

    fn client(&self) -> SDKResult<&Arc<dyn CompletionClient>> {
        self.completion
            .as_ref()
            .ok_or_else(|| SDKError::invalid_operation("no completion endpoint configured"))
    }
}

/// Parse a fact list, tolerating code fences and prose around the array.
pub fn parse_facts(raw: &str) -> FactExtraction {
    let trimmed = strip_code_fence(raw.trim());

    let parsed = serde_json::from_str::<Vec<String>>(trimmed).ok().or_else(|| {
        let start = trimmed.find('[')?;
        let end = trimmed.rfind(']')?;
        (start < end)
            .then(|| serde_json::from_str::<Vec<String>>(&trimmed[start..=end]).ok())
            .flatten()
    });

    match parsed {
        Some(facts) => FactExtraction::Extracted(
            facts
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        ),
        None => FactExtraction::Malformed { raw: raw.to_string() },
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
