//! ctxmem SDK - Tiered Memory for Conversational Agents
//!
//! This crate gives an agent three kinds of memory behind one orchestrator:
//!
//! - **Short-term** - recent conversation turns per (session, agent)
//! - **Working** - document chunks cached for the current query
//! - **Long-term** - agent-scoped summaries and facts in a semantic store
//!
//! Writes to short-term memory start a background check that folds old turns
//! into long-term summaries through a text-completion endpoint. Reads merge
//! the tiers into one prompt string under a token budget.
//!
//! # Collaborators (from ctxmem-core)
//!
//! - **kv** - keyed store with TTLs (SQLite or in-process)
//! - **semantic** - semantic search store (HTTP service or in-process)
//! - **completion** - OpenAI-compatible completion endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use ctxmem_sdk::{MemoryStateRequest, NewMemoryEntry, Role, SDK, SDKConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let sdk = SDK::new(SDKConfig::load()?)?;
//!
//!     sdk.memory()
//!         .add_memory(NewMemoryEntry::new("session-1", "agent-1", Role::User, "I prefer tea"))
//!         .await?;
//!
//!     let context = sdk
//!         .memory()
//!         .get_formatted_memory(&MemoryStateRequest::new("session-1", "agent-1").with_query("tea"), None)
//!         .await?;
//!     println!("{}", context.text);
//!
//!     sdk.shutdown().await;
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export collaborators from ctxmem-core
// ─────────────────────────────────────────────────────────────────────────────

/// Collaborator traits, backends and token estimation
pub use ctxmem_core;

// ─────────────────────────────────────────────────────────────────────────────
// SDK modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod memory;
pub mod tasks;
pub mod utils;

mod config;
mod error;
mod sdk;

// Re-export main SDK types
pub use config::{
    BudgetConfig, CompletionConfig, ConfigValidationError, ConsolidationConfig, LongTermConfig, MemoryConfig,
    RunnerConfig, SDKConfig, SemanticConfig, ShortTermConfig, StoreConfig, WorkingConfig, CONFIG_ENV,
};
pub use error::{SDKError, SDKResult};
pub use sdk::SDK;

pub use memory::{
    ConsolidationRequest, ConsolidationResult, ContentType, FormattedMemory, LoadedDocument, LongTermMemoryEntry,
    MemoryEntry, MemoryOrchestrator, MemoryState, MemoryStateRequest, MemoryStats, NewMemoryEntry, RetrievedChunk,
    Role, ShortTermMemory, WorkingMemory,
};
pub use tasks::{RunnerStats, Submission, TaskRunner};
