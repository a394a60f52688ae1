//! Configuration commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use ctxmem_sdk::SDKConfig;

use crate::cli::{ConfigAction, ConfigCommand};

/// Execute config command.
pub fn execute(cmd: ConfigCommand, config: &SDKConfig, path: &Path) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => show(config),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Init { force } => init(path, force),
    }
}

fn show(config: &SDKConfig) -> Result<()> {
    let mut shown = config.clone();
    // Keys come from the environment as often as from the file
    if shown.completion.api_key.is_some() {
        shown.completion.api_key = Some("********".into());
    }
    if shown.semantic.api_key.is_some() {
        shown.semantic.api_key = Some("********".into());
    }

    let rendered = toml::to_string_pretty(&shown).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    SDKConfig::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} Wrote default config to {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}
