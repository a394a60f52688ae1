//! Token estimation.
//!
//! Every tier counts tokens with the same heuristic so budgets computed in one
//! place stay comparable with counts stored in another.

use std::collections::HashSet;

/// Approximate characters per token for English text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token count of a piece of text.
///
/// Uses a heuristic of ~4 characters per token, rounded up. This is an
/// approximation and will differ from any real tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Lowercased set of the words in `text`.
///
/// Words are split on whitespace and stripped of leading/trailing
/// punctuation; tokens that are pure punctuation are dropped.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
