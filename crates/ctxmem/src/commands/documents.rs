//! Working-memory commands: document loading and staleness checks.

use anyhow::{Context, Result};
use colored::Colorize;
use ctxmem_sdk::ctxmem_core::estimate_tokens;
use ctxmem_sdk::{LoadedDocument, RetrievedChunk, SDK};
use serde_json::json;

use super::print_json;
use crate::cli::Scope;

/// Check whether the cached context should be refreshed for `query`.
pub async fn stale(sdk: &SDK, scope: &Scope, query: &str, json: bool) -> Result<()> {
    let stale = sdk
        .memory()
        .needs_document_refresh(&scope.session, &scope.agent, query)
        .await
        .context("Failed to check document context")?;

    if json {
        return print_json(&json!({ "stale": stale }));
    }

    if stale {
        println!("{} Context is stale, retrieve documents again", "↻".yellow());
    } else {
        println!("{} Cached context still matches the query", "✓".green());
    }
    Ok(())
}

/// Build the chunk list for `doc_id`: other documents' chunks are kept, this
/// document's chunks are replaced by `texts`.
fn merge_chunks(existing: Vec<RetrievedChunk>, doc_id: &str, doc_name: &str, texts: Vec<String>) -> Vec<RetrievedChunk> {
    let mut chunks: Vec<RetrievedChunk> = existing.into_iter().filter(|c| c.document_id != doc_id).collect();
    chunks.extend(
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| RetrievedChunk::new(doc_id, doc_name, text).with_chunk_number(i as u32)),
    );
    chunks
}

/// Load a document, optionally with retrieved chunk texts.
#[allow(clippy::too_many_arguments)]
pub async fn load(
    sdk: &SDK,
    scope: &Scope,
    id: &str,
    name: &str,
    notebook: Option<String>,
    chunks: Vec<String>,
    query: Option<String>,
    json: bool,
) -> Result<()> {
    let mut doc = LoadedDocument::new(id, name);
    doc.notebook_id = notebook;
    doc.chunk_count = chunks.len();
    doc.token_count = chunks.iter().map(|c| estimate_tokens(c)).sum();

    let memory = sdk.memory();
    let mut wm = memory
        .load_document(&scope.session, &scope.agent, doc)
        .await
        .context("Failed to load document")?;

    if !chunks.is_empty() || query.is_some() {
        let merged = merge_chunks(wm.retrieved_chunks, id, name, chunks);
        wm = memory
            .update_working_memory(&scope.session, &scope.agent, merged, query.as_deref())
            .await
            .context("Failed to update document context")?;
    }

    if json {
        return print_json(&wm);
    }

    println!("{} Loaded {}", "✓".green(), name.cyan());
    println!(
        "  Working memory: {} documents, {} chunks, {}/{} tokens",
        wm.loaded_documents.len(),
        wm.retrieved_chunks.len(),
        wm.total_tokens,
        wm.max_tokens
    );
    Ok(())
}

/// Unload a document and its chunks.
pub async fn unload(sdk: &SDK, scope: &Scope, id: &str) -> Result<()> {
    let removed = sdk
        .memory()
        .unload_document(&scope.session, &scope.agent, id)
        .await
        .context("Failed to unload document")?;

    if removed {
        println!("{} Unloaded {}", "✓".green(), id.cyan());
    } else {
        println!("{} Document {} was not loaded", "○".dimmed(), id);
    }
    Ok(())
}
