//! Tiered Conversational Memory
//!
//! Three tiers, each scoped differently:
//! - Short-term: the recent turns of one (session, agent), bounded by count and tokens
//! - Working: document chunks cached for the current query, bounded by documents and tokens
//! - Long-term: agent-scoped summaries and facts held in a semantic store
//!
//! # Architecture
//!
//! Memory flows upward through consolidation:
//! 1. Every turn is appended to short-term memory
//! 2. After a write, a background check asks whether the session is due
//! 3. Due sessions have their oldest turns summarized into long-term memory
//!
//! Retrieval merges the tiers into one prompt string under a token budget.

mod consolidation;
mod format;
mod long_term;
mod orchestrator;
mod persist;
mod short_term;
mod similarity;
mod types;
mod working;

#[cfg(test)]
mod testing;

// Re-export public types
pub use types::{
    ConsolidationRequest, ConsolidationResult, ContentType, FactExtraction, FormattedMemory, LoadedDocument,
    LongTermMemoryEntry, MemoryEntry, MemoryState, MemoryStateRequest, MemoryStats, NewMemoryEntry,
    RetrievedChunk, Role, ShortTermMemory, WorkingMemory,
};

pub use consolidation::{parse_facts, ConsolidationEngine};
pub use format::{format_long_term, format_memory, format_short_term, format_working, split_budget};
pub use long_term::{LongTermMemoryStore, CONSOLIDATION_SOURCE};
pub use orchestrator::MemoryOrchestrator;
pub use persist::{consolidation_key, short_term_key, working_key};
pub use short_term::ShortTermMemoryStore;
pub use similarity::{QuerySimilarity, WordOverlap};
pub use working::WorkingMemoryStore;
