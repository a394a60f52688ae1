//! Long-term memory commands: facts, search, pruning.

use anyhow::{Context, Result};
use colored::Colorize;
use ctxmem_sdk::SDK;
use serde_json::json;

use super::print_json;

/// Store a fact for an agent.
pub async fn fact(sdk: &SDK, agent: &str, session: Option<&str>, text: &str, json: bool) -> Result<()> {
    let stored = sdk
        .memory()
        .store_fact(agent, session, text)
        .await
        .context("Failed to store fact")?;

    if json {
        return print_json(&stored);
    }

    match stored {
        Some(entry) => {
            println!("{} Stored fact for {}", "✓".green(), agent.cyan());
            println!("  ID: {}", entry.id);
        }
        None => println!("{} Long-term memory is disabled", "○".dimmed()),
    }
    Ok(())
}

/// Search an agent's long-term memory.
pub async fn search(sdk: &SDK, agent: &str, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let results = sdk
        .memory()
        .search_long_term(agent, query, top_k)
        .await
        .context("Long-term search failed")?;

    if json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("{}", "No matching memories".dimmed());
        return Ok(());
    }

    println!("{} {} result(s) for \"{}\"", "🔍".cyan(), results.len(), query);
    println!();
    for entry in &results {
        println!(
            "  {} [{}] {}",
            format!("{:.2}", entry.relevance_score).dimmed(),
            entry.content_type.as_str().green(),
            entry.content
        );
    }
    Ok(())
}

/// Prune an agent's long-term memory.
pub async fn prune(sdk: &SDK, agent: &str) -> Result<()> {
    let max = sdk.config().memory.long_term.max_entries_per_agent;
    let removed = sdk
        .memory()
        .prune_long_term(agent)
        .await
        .context("Failed to prune long-term memory")?;

    if removed == 0 {
        println!("{} {} is within {} entries", "✓".green(), agent.cyan(), max);
    } else {
        println!(
            "{} Removed {} least recently used entries for {}",
            "✓".green(),
            removed.to_string().yellow(),
            agent.cyan()
        );
    }
    Ok(())
}
