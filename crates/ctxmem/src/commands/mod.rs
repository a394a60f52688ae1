//! Command implementations for the ctxmem CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod documents;
pub mod long_term;
pub mod session;

use anyhow::Result;
use ctxmem_sdk::SDK;

use crate::cli::Commands;

/// Dispatch a store-backed command.
pub async fn execute(command: Commands, sdk: &SDK, json: bool) -> Result<()> {
    match command {
        Commands::Add {
            scope,
            content,
            role,
            tenant,
            user,
        } => session::add(sdk, &scope, &content, &role, tenant, user, json).await,
        Commands::Context {
            scope,
            query,
            budget,
            top_k,
        } => session::context(sdk, &scope, query, budget, top_k, json).await,
        Commands::State { scope, query, top_k } => session::state(sdk, &scope, query, top_k, json).await,
        Commands::Stats { scope } => session::stats(sdk, &scope, json).await,
        Commands::Consolidate {
            scope,
            force,
            max_entries,
        } => session::consolidate(sdk, &scope, force, max_entries, json).await,
        Commands::Clear { scope } => session::clear(sdk, &scope).await,

        Commands::Stale { scope, query } => documents::stale(sdk, &scope, &query, json).await,
        Commands::LoadDoc {
            scope,
            id,
            name,
            notebook,
            chunks,
            query,
        } => documents::load(sdk, &scope, &id, &name, notebook, chunks, query, json).await,
        Commands::UnloadDoc { scope, id } => documents::unload(sdk, &scope, &id).await,

        Commands::Fact { agent, session, text } => long_term::fact(sdk, &agent, session.as_deref(), &text, json).await,
        Commands::Search { agent, query, top_k } => long_term::search(sdk, &agent, &query, top_k, json).await,
        Commands::Prune { agent } => long_term::prune(sdk, &agent).await,

        Commands::Config(_) => anyhow::bail!("config commands do not open the memory stores"),
    }
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
