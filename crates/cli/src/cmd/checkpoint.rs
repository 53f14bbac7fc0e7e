//! Inspect or clear the stored checkpoint

use crate::{locks, system_config, util};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the stored position
pub async fn run_show(config_path: Option<&Path>, raw: bool) -> Result<()> {
    let config = system_config::load(config_path)?;
    let store = config
        .checkpoint
        .open()
        .context("Failed to open checkpoint store")?;

    let position = store.load().await.context("Failed to read checkpoint")?;
    match position {
        Some(position) if raw => println!("{}", position.encode()),
        Some(position) => {
            println!("{}", util::format_position(&position));
            println!("{}", store.describe().dimmed());
        }
        None => println!("{}", "No checkpoint stored".dimmed()),
    }
    Ok(())
}

/// Clear the stored position so the next start backfills
pub async fn run_reset(config_path: Option<&Path>, yes: bool) -> Result<()> {
    let config = system_config::load(config_path)?;
    let namespace = config.namespace();

    let state_dir = util::state_dir()?;
    if let Some(holder) = locks::current_holder(&state_dir, &namespace) {
        anyhow::bail!(
            "{} is being consumed by pid {}; stop it before resetting",
            namespace,
            holder.pid
        );
    }

    let store = config
        .checkpoint
        .open()
        .context("Failed to open checkpoint store")?;

    if !yes && !util::confirm(&format!("Clear checkpoint in {}?", store.describe()))? {
        println!("Aborted");
        return Ok(());
    }

    store.clear().await.context("Failed to clear checkpoint")?;
    println!(
        "{} Checkpoint cleared; next start backfills {}",
        "✓".green(),
        namespace.cyan()
    );
    Ok(())
}
