//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tiered memory for conversational agents
#[derive(Parser, Debug)]
#[command(name = "ctxmem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ~/.ctxmem/config.toml)
    #[arg(long, global = true, env = "CTXMEM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// The (session, agent) pair a command works on
#[derive(Args, Debug, Clone)]
pub struct Scope {
    /// Session ID
    #[arg(short, long, env = "CTXMEM_SESSION")]
    pub session: String,

    /// Agent ID
    #[arg(short, long, env = "CTXMEM_AGENT")]
    pub agent: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a conversation turn to short-term memory
    Add {
        #[command(flatten)]
        scope: Scope,

        /// Turn content
        content: String,

        /// Speaker: user, assistant, or system
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Tenant ID recorded with the turn
        #[arg(long)]
        tenant: Option<String>,

        /// User ID recorded with the turn
        #[arg(long)]
        user: Option<String>,
    },

    /// Render the budgeted prompt context for a session
    Context {
        #[command(flatten)]
        scope: Scope,

        /// Query used to pull long-term memory
        #[arg(short, long)]
        query: Option<String>,

        /// Token budget (default from config)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Long-term results to consider
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show the raw contents of each tier
    State {
        #[command(flatten)]
        scope: Scope,

        /// Query used to pull long-term memory
        #[arg(short, long)]
        query: Option<String>,

        /// Long-term results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show memory statistics for a session
    Stats {
        #[command(flatten)]
        scope: Scope,
    },

    /// Summarize old turns into long-term memory now
    Consolidate {
        #[command(flatten)]
        scope: Scope,

        /// Consolidate even below the entry and token thresholds
        #[arg(short, long)]
        force: bool,

        /// Oldest turns to fold in (default from config)
        #[arg(long)]
        max_entries: Option<usize>,
    },

    /// Check whether cached document context is stale for a query
    Stale {
        #[command(flatten)]
        scope: Scope,

        /// The new query
        query: String,
    },

    /// Load a document into working memory
    LoadDoc {
        #[command(flatten)]
        scope: Scope,

        /// Document ID
        id: String,

        /// Document display name
        name: String,

        /// Notebook the document belongs to
        #[arg(long)]
        notebook: Option<String>,

        /// Retrieved chunk text (repeatable)
        #[arg(short = 'c', long = "chunk", action = clap::ArgAction::Append)]
        chunks: Vec<String>,

        /// Query the chunks were retrieved for
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Unload a document and its chunks from working memory
    UnloadDoc {
        #[command(flatten)]
        scope: Scope,

        /// Document ID
        id: String,
    },

    /// Clear a session's short-term and working memory
    Clear {
        #[command(flatten)]
        scope: Scope,
    },

    /// Store a fact in an agent's long-term memory
    Fact {
        /// Agent ID
        #[arg(short, long, env = "CTXMEM_AGENT")]
        agent: String,

        /// Session the fact came from
        #[arg(short, long)]
        session: Option<String>,

        /// Fact text
        text: String,
    },

    /// Search an agent's long-term memory
    Search {
        /// Agent ID
        #[arg(short, long, env = "CTXMEM_AGENT")]
        agent: String,

        /// Search text
        query: String,

        /// Results to return (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Trim an agent's long-term memory to the configured maximum
    Prune {
        /// Agent ID
        #[arg(short, long, env = "CTXMEM_AGENT")]
        agent: String,
    },

    /// Configuration management
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write the default configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
