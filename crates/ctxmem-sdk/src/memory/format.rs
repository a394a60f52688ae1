//! Rendering tiers into prompt text under a token budget.

use ctxmem_core::estimate_tokens;

use super::types::{FormattedMemory, LongTermMemoryEntry, MemoryEntry, RetrievedChunk, ShortTermMemory, WorkingMemory};
use crate::config::BudgetConfig;

const SHORT_TERM_HEADER: &str = "[Recent conversation]\n";
const WORKING_HEADER: &str = "[Working documents]\n";
const LONG_TERM_HEADER: &str = "[Long-term memory]\n";

/// One `Role: content` line per turn
pub fn format_short_term<'a>(entries: impl IntoIterator<Item = &'a MemoryEntry>) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry.role.label());
        out.push_str(": ");
        out.push_str(&entry.content);
        out.push('\n');
    }
    out
}

/// Chunks grouped under one `Document: name` header per document, in order
/// of first appearance, with a blank line between groups.
pub fn format_working(chunks: &[RetrievedChunk]) -> String {
    let mut groups: Vec<(&str, &str, Vec<&str>)> = Vec::new();

    for chunk in chunks {
        match groups.iter_mut().find(|(id, _, _)| *id == chunk.document_id) {
            Some((_, _, contents)) => contents.push(chunk.content.as_str()),
            None => groups.push((
                chunk.document_id.as_str(),
                chunk.document_name.as_str(),
                vec![chunk.content.as_str()],
            )),
        }
    }

    let mut out = String::new();
    for (i, (_, name, contents)) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str("Document: ");
        out.push_str(name);
        out.push('\n');
        for content in contents {
            out.push_str(content);
            out.push('\n');
        }
    }
    out
}

fn long_term_line(entry: &LongTermMemoryEntry) -> String {
    format!("- [{}] {}\n", entry.content_type, entry.content)
}

/// One `- [type] content` line per entry
pub fn format_long_term(entries: &[LongTermMemoryEntry]) -> String {
    entries.iter().map(long_term_line).collect()
}

/// Token shares of `budget` for (short-term, working, long-term)
pub fn split_budget(budget: usize, shares: &BudgetConfig) -> (usize, usize, usize) {
    let share = |percent: u8| {
        let percent = percent as usize;
        budget / 100 * percent + budget % 100 * percent / 100
    };
    (
        share(shares.short_term_percent),
        share(shares.working_percent),
        share(shares.long_term_percent),
    )
}

/// Merge the tiers into one string bounded by `budget`.
///
/// Short-term is trimmed oldest-first to its share (on a copy; nothing is
/// persisted). Working memory is all or nothing. Long-term entries are taken
/// in rank order until the next one would overflow its share.
pub fn format_memory(
    short_term: Option<&ShortTermMemory>,
    working: Option<&WorkingMemory>,
    long_term: &[LongTermMemoryEntry],
    budget: usize,
    shares: &BudgetConfig,
) -> FormattedMemory {
    let (short_share, working_share, long_share) = split_budget(budget, shares);

    let mut short_term_trimmed = false;
    let short_term_text = match short_term {
        Some(stm) => {
            let mut copy = stm.clone();
            short_term_trimmed = !copy.trim_to(short_share).is_empty();
            format_short_term(&copy.entries)
        }
        None => String::new(),
    };

    let mut working_omitted = false;
    let working_text = match working {
        Some(wm) if wm.total_tokens <= working_share => format_working(&wm.retrieved_chunks),
        Some(wm) => {
            working_omitted = !wm.retrieved_chunks.is_empty();
            String::new()
        }
        None => String::new(),
    };

    let mut long_term_text = String::new();
    let mut long_term_used = 0;
    for entry in long_term {
        let line = long_term_line(entry);
        let tokens = estimate_tokens(&line);
        if long_term_used + tokens > long_share {
            break;
        }
        long_term_used += tokens;
        long_term_text.push_str(&line);
    }

    let mut text = String::new();
    for (header, body) in [
        (SHORT_TERM_HEADER, &short_term_text),
        (WORKING_HEADER, &working_text),
        (LONG_TERM_HEADER, &long_term_text),
    ] {
        if body.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(header);
        text.push_str(body);
    }

    let total_tokens = estimate_tokens(&text);
    FormattedMemory {
        short_term_tokens: estimate_tokens(&short_term_text),
        working_tokens: estimate_tokens(&working_text),
        long_term_tokens: estimate_tokens(&long_term_text),
        total_tokens,
        budget,
        truncated: total_tokens > budget,
        short_term_trimmed,
        working_omitted,
        text,
        short_term_text,
        working_text,
        long_term_text,
    }
}
