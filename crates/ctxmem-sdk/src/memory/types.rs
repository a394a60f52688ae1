//! Memory Type Definitions
//!
//! Defines the containers persisted by each tier and the request/result types
//! exchanged with the orchestrator. Containers keep their own invariants: every
//! mutating method leaves `total_tokens` equal to the sum of what they hold.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ctxmem_core::estimate_tokens;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{ShortTermConfig, WorkingConfig};
use crate::utils::now_utc;

// ─────────────────────────────────────────────────────────────────────────────
// Dialogue turns
// ─────────────────────────────────────────────────────────────────────────────

/// Speaker of a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Label used when rendering a transcript
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A buffered dialogue turn. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: Role,
    pub content: String,
    pub token_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

/// Input for appending a turn; missing id, timestamp and token count are filled in.
#[derive(Debug, Clone)]
pub struct NewMemoryEntry {
    pub id: Option<String>,
    pub session_id: String,
    pub agent_id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub role: Role,
    pub content: String,
    pub token_count: Option<usize>,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Value,
}

impl NewMemoryEntry {
    pub fn new(
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            tenant_id: None,
            user_id: None,
            role,
            content: content.into(),
            token_count: None,
            timestamp: None,
            metadata: Value::Null,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = Some(token_count);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Materialize the entry, assigning anything the caller left out.
    pub fn into_entry(self) -> MemoryEntry {
        let token_count = self
            .token_count
            .unwrap_or_else(|| estimate_tokens(&self.content));

        MemoryEntry {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            session_id: self.session_id,
            agent_id: self.agent_id,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            token_count,
            timestamp: self.timestamp.unwrap_or_else(now_utc),
            metadata: self.metadata,
        }
    }
}

/// Per-session dialogue buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermMemory {
    pub session_id: String,
    pub agent_id: String,
    pub entries: VecDeque<MemoryEntry>,
    pub total_tokens: usize,
    pub max_tokens: usize,
    pub max_entries: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ShortTermMemory {
    /// Empty buffer with the configured ceilings
    pub fn new(session_id: &str, agent_id: &str, config: &ShortTermConfig) -> Self {
        let now = now_utc();
        Self {
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            entries: VecDeque::new(),
            total_tokens: 0,
            max_tokens: config.max_tokens,
            max_entries: config.max_entries,
            created_at: now,
            updated_at: now,
            expires_at: expires_after(now, config.ttl()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append and evict down to the buffer's own ceilings.
    ///
    /// Returns the evicted entries, oldest first. An entry larger than the
    /// token ceiling evicts everything, itself included.
    pub fn push(&mut self, entry: MemoryEntry) -> Vec<MemoryEntry> {
        self.total_tokens += entry.token_count;
        self.entries.push_back(entry);

        let mut evicted = Vec::new();
        while self.entries.len() > self.max_entries {
            evicted.extend(self.pop_oldest());
        }
        evicted.extend(self.trim_to(self.max_tokens));
        evicted
    }

    /// Evict oldest entries until `total_tokens <= budget`.
    pub fn trim_to(&mut self, budget: usize) -> Vec<MemoryEntry> {
        let mut evicted = Vec::new();
        while self.total_tokens > budget {
            match self.pop_oldest() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    /// Last `limit` entries in insertion order
    pub fn recent(&self, limit: usize) -> Vec<MemoryEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// First `limit` entries in insertion order
    pub fn oldest(&self, limit: usize) -> Vec<MemoryEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Mark a write and slide the expiry forward
    pub fn touch(&mut self, ttl: Duration) {
        self.updated_at = now_utc();
        self.expires_at = expires_after(self.updated_at, ttl);
    }

    fn pop_oldest(&mut self) -> Option<MemoryEntry> {
        let entry = self.entries.pop_front()?;
        self.total_tokens = self.total_tokens.saturating_sub(entry.token_count);
        Some(entry)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Working memory
// ─────────────────────────────────────────────────────────────────────────────

/// A document whose fragments may be cached in working memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub document_id: String,
    pub document_name: String,
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default)]
    pub chunk_count: usize,
    #[serde(default)]
    pub token_count: usize,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedDocument {
    pub fn new(document_id: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            document_name: document_name.into(),
            notebook_id: None,
            chunk_count: 0,
            token_count: 0,
            loaded_at: now_utc(),
        }
    }
}

/// A retrieved document fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    pub content: String,
    #[serde(default)]
    pub chunk_number: u32,
    #[serde(default)]
    pub relevance_score: f64,
}

impl RetrievedChunk {
    pub fn new(
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            document_name: document_name.into(),
            content: content.into(),
            chunk_number: 0,
            relevance_score: 0.0,
        }
    }

    pub fn with_chunk_number(mut self, chunk_number: u32) -> Self {
        self.chunk_number = chunk_number;
        self
    }

    pub fn with_relevance(mut self, relevance_score: f64) -> Self {
        self.relevance_score = relevance_score;
        self
    }

    pub fn token_count(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Per-session cache of loaded documents and retrieved fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemory {
    pub session_id: String,
    pub agent_id: String,
    pub loaded_documents: Vec<LoadedDocument>,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub total_tokens: usize,
    pub max_tokens: usize,
    pub max_documents: usize,
    #[serde(default)]
    pub last_query: Option<String>,
    #[serde(default)]
    pub last_query_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WorkingMemory {
    /// Empty cache with the configured ceilings
    pub fn new(session_id: &str, agent_id: &str, config: &WorkingConfig) -> Self {
        let now = now_utc();
        Self {
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            loaded_documents: Vec::new(),
            retrieved_chunks: Vec::new(),
            total_tokens: 0,
            max_tokens: config.max_tokens,
            max_documents: config.max_documents,
            last_query: None,
            last_query_time: None,
            created_at: now,
            updated_at: now,
            expires_at: expires_after(now, config.ttl()),
        }
    }

    /// Replace the cached chunks.
    ///
    /// Chunks are kept in input order (callers pass them sorted by relevance)
    /// until the next one would exceed `max_tokens`; that chunk and everything
    /// after it are dropped. Returns how many were dropped.
    pub fn set_chunks(&mut self, chunks: Vec<RetrievedChunk>) -> usize {
        let offered = chunks.len();
        let mut kept = Vec::with_capacity(offered);
        let mut total = 0;

        for chunk in chunks {
            let tokens = chunk.token_count();
            if total + tokens > self.max_tokens {
                break;
            }
            total += tokens;
            kept.push(chunk);
        }

        self.retrieved_chunks = kept;
        self.total_tokens = total;
        offered - self.retrieved_chunks.len()
    }

    /// Insert or replace a document by id.
    ///
    /// A replacement keeps the original position and `loaded_at`. A new
    /// document at the ceiling evicts the single oldest-loaded document,
    /// which is returned. With a ceiling of 0 the new document itself is
    /// returned and nothing is stored.
    pub fn upsert_document(&mut self, doc: LoadedDocument) -> Option<LoadedDocument> {
        if let Some(existing) = self
            .loaded_documents
            .iter_mut()
            .find(|d| d.document_id == doc.document_id)
        {
            let loaded_at = existing.loaded_at;
            *existing = LoadedDocument { loaded_at, ..doc };
            return None;
        }

        if self.max_documents == 0 {
            return Some(doc);
        }

        let evicted = if self.loaded_documents.len() >= self.max_documents {
            Some(self.loaded_documents.remove(0))
        } else {
            None
        };
        self.loaded_documents.push(doc);
        evicted
    }

    /// Remove a document and every chunk that came from it.
    ///
    /// Returns whether anything was removed.
    pub fn remove_document(&mut self, document_id: &str) -> bool {
        let docs_before = self.loaded_documents.len();
        let chunks_before = self.retrieved_chunks.len();

        self.loaded_documents.retain(|d| d.document_id != document_id);
        self.retrieved_chunks.retain(|c| c.document_id != document_id);
        self.recalculate_tokens();

        docs_before != self.loaded_documents.len() || chunks_before != self.retrieved_chunks.len()
    }

    /// Record the query that produced the current cache
    pub fn record_query(&mut self, query: &str) {
        self.last_query = Some(query.to_string());
        self.last_query_time = Some(now_utc());
    }

    /// Mark a write and slide the expiry forward
    pub fn touch(&mut self, ttl: Duration) {
        self.updated_at = now_utc();
        self.expires_at = expires_after(self.updated_at, ttl);
    }

    fn recalculate_tokens(&mut self) {
        self.total_tokens = self.retrieved_chunks.iter().map(RetrievedChunk::token_count).sum();
    }
}

fn expires_after(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ─────────────────────────────────────────────────────────────────────────────
// Long-term memory
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of distilled long-term content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Fact,
    Summary,
    Insight,
}

impl ContentType {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(Self::Fact),
            "summary" => Some(Self::Summary),
            "insight" => Some(Self::Insight),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Summary => "summary",
            Self::Insight => "insight",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent-scoped durable memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemoryEntry {
    pub id: String,
    pub agent_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub content_type: ContentType,
    pub content: String,
    pub source_type: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub token_count: usize,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub access_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Value,
}

impl LongTermMemoryEntry {
    pub fn new(agent_id: impl Into<String>, content_type: ContentType, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            tenant_id: None,
            content_type,
            token_count: estimate_tokens(&content),
            content,
            source_type: "manual".into(),
            source_id: None,
            session_id: None,
            relevance_score: 0.0,
            access_count: 0,
            created_at: now_utc(),
            accessed_at: None,
            metadata: Value::Null,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_source(mut self, source_type: impl Into<String>, source_id: Option<String>) -> Self {
        self.source_type = source_type.into();
        self.source_id = source_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consolidation
// ─────────────────────────────────────────────────────────────────────────────

/// Request to fold a session's buffer into long-term memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Run even when the buffer is below the size thresholds
    #[serde(default)]
    pub force: bool,
    /// Oldest entries to fold; 0 uses the configured default
    #[serde(default)]
    pub max_entries: usize,
}

impl ConsolidationRequest {
    pub fn new(session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Outcome of a consolidation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub entries_processed: usize,
    pub summaries_created: usize,
    pub facts_created: usize,
    pub tokens_consolidated: usize,
    /// Original tokens minus summary tokens; negative when the summary is longer
    pub tokens_saved: i64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ConsolidationResult {
    /// A run that did nothing
    pub fn skipped(duration_ms: u64) -> Self {
        Self {
            entries_processed: 0,
            summaries_created: 0,
            facts_created: 0,
            tokens_consolidated: 0,
            tokens_saved: 0,
            duration_ms,
            timestamp: now_utc(),
        }
    }
}

/// Result of asking the completion endpoint for facts
#[derive(Debug, Clone, PartialEq)]
pub enum FactExtraction {
    /// The response parsed; the list may be empty
    Extracted(Vec<String>),
    /// The response was not a JSON array of strings
    Malformed { raw: String },
}

impl FactExtraction {
    /// Facts, treating a malformed response as none
    pub fn into_facts(self) -> Vec<String> {
        match self {
            Self::Extracted(facts) => facts,
            Self::Malformed { .. } => Vec::new(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator requests and views
// ─────────────────────────────────────────────────────────────────────────────

/// Which tiers to read for a (session, agent) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStateRequest {
    pub session_id: String,
    pub agent_id: String,
    #[serde(default = "default_true")]
    pub include_short_term: bool,
    #[serde(default = "default_true")]
    pub include_working: bool,
    /// Long-term is searched only when enabled, requested and a query is given
    #[serde(default = "default_true")]
    pub include_long_term: bool,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl MemoryStateRequest {
    pub fn new(session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            include_short_term: true,
            include_working: true,
            include_long_term: true,
            query: None,
            top_k: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn only_long_term(mut self) -> Self {
        self.include_short_term = false;
        self.include_working = false;
        self.include_long_term = true;
        self
    }
}

/// Snapshot of the requested tiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryState {
    pub short_term: Option<ShortTermMemory>,
    pub working: Option<WorkingMemory>,
    pub long_term: Vec<LongTermMemoryEntry>,
}

/// All tiers rendered into one token-bounded string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormattedMemory {
    pub text: String,
    pub short_term_text: String,
    pub working_text: String,
    pub long_term_text: String,
    pub short_term_tokens: usize,
    pub working_tokens: usize,
    pub long_term_tokens: usize,
    pub total_tokens: usize,
    pub budget: usize,
    /// Included tokens exceed the budget
    pub truncated: bool,
    /// Short-term entries were dropped to fit their share
    pub short_term_trimmed: bool,
    /// Working memory did not fit its share and was left out
    pub working_omitted: bool,
}

/// Read-only counters across tiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub session_id: String,
    pub agent_id: String,
    pub short_term_entries: usize,
    pub short_term_tokens: usize,
    pub working_documents: usize,
    pub working_chunks: usize,
    pub working_tokens: usize,
    pub long_term_enabled: bool,
    pub long_term_entries: usize,
    pub last_query: Option<String>,
    pub last_consolidated_at: Option<DateTime<Utc>>,
}
