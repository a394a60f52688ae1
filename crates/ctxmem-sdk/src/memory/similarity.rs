//! Query similarity for staleness checks.
//!
//! Working memory compares the query that produced its cache against a new
//! query. The comparison is a trait so an embedding-backed measure can replace
//! the word-overlap one without touching callers.

use ctxmem_core::word_set;

/// Similarity between two queries in `[0, 1]`
pub trait QuerySimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Jaccard similarity of lowercased word sets.
///
/// Two queries with no words are identical (1.0); one empty and one not share
/// nothing (0.0).
#[derive(Debug, Clone, Copy, Default)]
pub struct WordOverlap;

impl QuerySimilarity for WordOverlap {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let words_a = word_set(a);
        let words_b = word_set(b);

        if words_a.is_empty() && words_b.is_empty() {
            return 1.0;
        }

        let intersection = words_a.intersection(&words_b).count();
        let union = words_a.union(&words_b).count();

        intersection as f64 / union as f64
    }
}
