//! Semantic search store.
//!
//! Long-term memory is stored in one collection per agent. The store ranks
//! records against free-text queries; how it does so (vector index, BM25, ...)
//! is the collaborator's business.
//!
//! A search against a collection that does not exist yet reports
//! [`Error::CollectionNotFound`](crate::Error::CollectionNotFound). Callers
//! that treat "no collection" as "no results" fold it themselves.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::tokens::word_set;

#[cfg(feature = "client")]
mod http;

#[cfg(feature = "client")]
pub use http::HttpSemanticStore;

/// A ranked record returned by the semantic store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRecord {
    pub id: String,
    pub content: String,
    /// Relevance to the query (0.0 - 1.0); 0.0 for non-search listings
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub access_count: u32,
    #[serde(default)]
    pub accessed_at: Option<DateTime<Utc>>,
}

/// Exact-match metadata filters applied to a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub equals: BTreeMap<String, Value>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Whether a record's metadata satisfies every filter.
    pub fn matches(&self, metadata: &Value) -> bool {
        self.equals
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Agent-scoped semantic store.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    /// Rank records in `collection` against `query`, best first.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SemanticRecord>>;

    /// Insert a record, creating the collection if needed.
    async fn insert(&self, collection: &str, id: &str, content: &str, metadata: Value) -> Result<()>;

    /// Number of records in `collection`.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Most recently inserted records, newest first.
    async fn recent(&self, collection: &str, limit: usize) -> Result<Vec<SemanticRecord>>;

    /// Remove up to `count` records, least recently accessed first.
    async fn evict_least_recently_accessed(&self, collection: &str, count: usize) -> Result<usize>;

    /// Delete a single record. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    content: String,
    metadata: Value,
    inserted_seq: u64,
    accessed_seq: u64,
    access_count: u32,
    accessed_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn to_record(&self, score: f64) -> SemanticRecord {
        SemanticRecord {
            id: self.id.clone(),
            content: self.content.clone(),
            score,
            metadata: self.metadata.clone(),
            access_count: self.access_count,
            accessed_at: self.accessed_at,
        }
    }
}

#[derive(Debug, Default)]
struct Collections {
    clock: u64,
    records: HashMap<String, Vec<StoredRecord>>,
}

impl Collections {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Process-local semantic store ranking by word overlap.
///
/// Score is the fraction of query words present in the record. Search hits
/// count as accesses, which drives least-recently-accessed eviction.
#[derive(Debug, Default)]
pub struct InMemorySemanticStore {
    inner: RwLock<Collections>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(collection: &str) -> Error {
        Error::CollectionNotFound(collection.to_string())
    }
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SemanticRecord>> {
        let query_words = word_set(query);
        let mut inner = self.inner.write().await;
        let now = inner.tick();

        let records = inner
            .records
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection))?;

        if query_words.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f64)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| filters.matches(&r.metadata))
            .filter_map(|(idx, r)| {
                let words = word_set(&r.content);
                let hits = query_words.intersection(&words).count();
                (hits > 0).then(|| (idx, hits as f64 / query_words.len() as f64))
            })
            .collect();

        // Best score first; ties go to the older record
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        let accessed_at = Utc::now();
        let results = scored
            .into_iter()
            .map(|(idx, score)| {
                let record = &mut records[idx];
                record.access_count += 1;
                record.accessed_seq = now;
                record.accessed_at = Some(accessed_at);
                record.to_record(score)
            })
            .collect();

        Ok(results)
    }

    async fn insert(&self, collection: &str, id: &str, content: &str, metadata: Value) -> Result<()> {
        let mut inner = self.inner.write().await;
        let seq = inner.tick();
        let records = inner.records.entry(collection.to_string()).or_default();

        // Re-inserting an id replaces the record
        records.retain(|r| r.id != id);
        records.push(StoredRecord {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
            inserted_seq: seq,
            accessed_seq: seq,
            access_count: 0,
            accessed_at: None,
        });
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(collection)
            .map(Vec::len)
            .ok_or_else(|| Self::not_found(collection))
    }

    async fn recent(&self, collection: &str, limit: usize) -> Result<Vec<SemanticRecord>> {
        let inner = self.inner.read().await;
        let records = inner
            .records
            .get(collection)
            .ok_or_else(|| Self::not_found(collection))?;

        let mut sorted: Vec<&StoredRecord> = records.iter().collect();
        sorted.sort_by(|a, b| b.inserted_seq.cmp(&a.inserted_seq));
        Ok(sorted.into_iter().take(limit).map(|r| r.to_record(0.0)).collect())
    }

    async fn evict_least_recently_accessed(&self, collection: &str, count: usize) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let records = inner
            .records
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection))?;

        let mut order: Vec<(u64, String)> = records
            .iter()
            .map(|r| (r.accessed_seq, r.id.clone()))
            .collect();
        order.sort();

        let victims: Vec<String> = order.into_iter().take(count).map(|(_, id)| id).collect();
        records.retain(|r| !victims.contains(&r.id));
        Ok(victims.len())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(records) = inner.records.get_mut(collection) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < before)
    }
}
