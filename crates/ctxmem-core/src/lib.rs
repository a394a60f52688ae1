//! ctxmem-core - Core library for ctxmem
//!
//! This crate provides the collaborators the memory subsystem talks to:
//!
//! - **kv**: Keyed store with TTL semantics (SQLite and in-process backends)
//! - **semantic**: Agent-scoped semantic search store (HTTP and in-process backends)
//! - **completion**: Text-completion endpoint (OpenAI-compatible HTTP client)
//! - **tokens**: Token estimation shared by every tier

pub mod completion;
pub mod error;
pub mod kv;
pub mod semantic;
pub mod tokens;

// Re-export commonly used types
pub use completion::{ChatMessage, ChatRole, CompletionClient, CompletionRequest};
pub use error::{Error, Result};
pub use kv::{KeyedStore, MemoryKvStore};
pub use semantic::{InMemorySemanticStore, SearchFilters, SemanticRecord, SemanticStore};
pub use tokens::{estimate_tokens, word_set};

#[cfg(feature = "db")]
pub use kv::SqliteKvStore;

#[cfg(feature = "client")]
pub use completion::HttpCompletionClient;

#[cfg(feature = "client")]
pub use semantic::HttpSemanticStore;
