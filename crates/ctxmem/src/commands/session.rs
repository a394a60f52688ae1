//! Session commands: conversation turns, rendered context, stats, consolidation.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use ctxmem_sdk::{ConsolidationRequest, MemoryStateRequest, NewMemoryEntry, Role, SDK};

use super::print_json;
use crate::cli::Scope;

/// Parse a role name
fn parse_role(role: &str) -> Result<Role> {
    Role::from_str(role).ok_or_else(|| anyhow!("Invalid role: {}. Use: user, assistant, or system", role))
}

fn state_request(scope: &Scope, query: Option<String>, top_k: Option<usize>) -> MemoryStateRequest {
    let mut req = MemoryStateRequest::new(scope.session.as_str(), scope.agent.as_str());
    if let Some(query) = query {
        req = req.with_query(query);
    }
    if let Some(top_k) = top_k {
        req = req.with_top_k(top_k);
    }
    req
}

/// Append a turn to short-term memory.
pub async fn add(
    sdk: &SDK,
    scope: &Scope,
    content: &str,
    role: &str,
    tenant: Option<String>,
    user: Option<String>,
    json: bool,
) -> Result<()> {
    let role = parse_role(role)?;

    let mut entry = NewMemoryEntry::new(scope.session.as_str(), scope.agent.as_str(), role, content);
    if let Some(tenant) = tenant {
        entry = entry.with_tenant(tenant);
    }
    if let Some(user) = user {
        entry = entry.with_user(user);
    }

    let stored = sdk
        .memory()
        .add_memory(entry)
        .await
        .context("Failed to add turn")?;

    if json {
        return print_json(&stored);
    }

    println!("{} Added {} turn", "✓".green(), role.as_str().cyan());
    println!("  ID:     {}", stored.id);
    println!("  Tokens: {}", stored.token_count);
    Ok(())
}

/// Print the budgeted prompt context.
pub async fn context(
    sdk: &SDK,
    scope: &Scope,
    query: Option<String>,
    budget: Option<usize>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let req = state_request(scope, query, top_k);
    let formatted = sdk
        .memory()
        .get_formatted_memory(&req, budget)
        .await
        .context("Failed to format memory")?;

    if json {
        return print_json(&formatted);
    }

    if formatted.text.is_empty() {
        println!("{}", "No memory for this session".dimmed());
    } else {
        println!("{}", formatted.text);
    }

    let usage = format!("{}/{} tokens", formatted.total_tokens, formatted.budget);
    let usage = if formatted.truncated { usage.red() } else { usage.green() };
    eprintln!(
        "{} short-term {} | working {} | long-term {} | {}",
        "─".dimmed(),
        formatted.short_term_tokens,
        formatted.working_tokens,
        formatted.long_term_tokens,
        usage
    );
    if formatted.short_term_trimmed {
        eprintln!("  {} Older turns trimmed to fit", "!".yellow());
    }
    if formatted.working_omitted {
        eprintln!("  {} Working documents omitted (over their share)", "!".yellow());
    }
    Ok(())
}

/// Show each tier's raw contents.
pub async fn state(
    sdk: &SDK,
    scope: &Scope,
    query: Option<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let req = state_request(scope, query, top_k);
    let state = sdk
        .memory()
        .get_memory_state(&req)
        .await
        .context("Failed to read memory state")?;

    if json {
        return print_json(&state);
    }

    if let Some(stm) = &state.short_term {
        println!("{} ({} turns, {} tokens)", "Short-term".yellow().bold(), stm.len(), stm.total_tokens);
        for entry in &stm.entries {
            println!("  {} {}", format!("{}:", entry.role.label()).dimmed(), entry.content);
        }
        println!();
    }

    if let Some(wm) = &state.working {
        println!(
            "{} ({} documents, {} chunks, {} tokens)",
            "Working".cyan().bold(),
            wm.loaded_documents.len(),
            wm.retrieved_chunks.len(),
            wm.total_tokens
        );
        for doc in &wm.loaded_documents {
            println!("  {} {} ({})", "•".cyan(), doc.document_name, doc.document_id.dimmed());
        }
        if let Some(query) = &wm.last_query {
            println!("  Last query: {}", query.italic());
        }
        println!();
    }

    println!("{} ({} matches)", "Long-term".green().bold(), state.long_term.len());
    for entry in &state.long_term {
        println!("  [{}] {}", entry.content_type.as_str().green(), entry.content);
    }
    Ok(())
}

/// Show memory statistics.
pub async fn stats(sdk: &SDK, scope: &Scope, json: bool) -> Result<()> {
    let stats = sdk
        .memory()
        .get_memory_stats(&scope.session, &scope.agent)
        .await
        .context("Failed to get memory stats")?;

    if json {
        return print_json(&stats);
    }

    println!("{} Memory Statistics", "📊".cyan());
    println!();
    println!("  Session: {}", stats.session_id.bold());
    println!("  Agent:   {}", stats.agent_id.bold());
    println!();
    println!(
        "    Short-term: {} turns, {} tokens",
        stats.short_term_entries.to_string().yellow(),
        stats.short_term_tokens
    );
    println!(
        "    Working:    {} documents, {} chunks, {} tokens",
        stats.working_documents.to_string().cyan(),
        stats.working_chunks,
        stats.working_tokens
    );
    if stats.long_term_enabled {
        println!("    Long-term:  {} entries", stats.long_term_entries.to_string().green());
    } else {
        println!("    Long-term:  {}", "disabled".dimmed());
    }
    println!();
    match stats.last_consolidated_at {
        Some(at) => println!("  Last consolidated: {}", at.to_rfc3339()),
        None => println!("  Last consolidated: {}", "never".dimmed()),
    }
    Ok(())
}

/// Consolidate the session now.
pub async fn consolidate(
    sdk: &SDK,
    scope: &Scope,
    force: bool,
    max_entries: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut req = ConsolidationRequest::new(scope.session.as_str(), scope.agent.as_str());
    if force {
        req = req.forced();
    }
    if let Some(max_entries) = max_entries {
        req = req.with_max_entries(max_entries);
    }

    let result = sdk
        .memory()
        .consolidate_memory(&req)
        .await
        .context("Consolidation failed")?;

    if json {
        return print_json(&result);
    }

    if result.entries_processed == 0 {
        println!("{} Nothing to consolidate (use --force to override thresholds)", "○".dimmed());
        return Ok(());
    }

    println!("{} Consolidated {} turns", "✓".green(), result.entries_processed);
    println!("  Summaries:    {}", result.summaries_created);
    println!("  Facts:        {}", result.facts_created);
    println!("  Tokens saved: {}", result.tokens_saved);
    println!("  Took:         {}ms", result.duration_ms);
    Ok(())
}

/// Clear short-term and working memory.
pub async fn clear(sdk: &SDK, scope: &Scope) -> Result<()> {
    sdk.memory()
        .clear_session(&scope.session, &scope.agent)
        .await
        .context("Failed to clear session")?;

    println!(
        "{} Cleared session {} for agent {}",
        "✓".green(),
        scope.session.cyan(),
        scope.agent.cyan()
    );
    Ok(())
}
