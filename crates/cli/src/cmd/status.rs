//! Show consumer identity, lock holder and stored checkpoint

use crate::{locks, system_config, util};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = system_config::load(config_path)?;
    let namespace = config.namespace();

    println!("{}", "tailfeed Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Collection:    {}", namespace.cyan());
    println!(
        "Backfill:      {} (concurrency {})",
        if config.backfill.enabled { "enabled" } else { "disabled" },
        config.backfill.concurrency
    );
    println!();

    print!("Consumer:      ");
    let state_dir = util::state_dir()?;
    match locks::current_holder(&state_dir, &namespace) {
        Some(holder) => {
            println!("{}", "Running ✓".green());
            println!("  PID:         {}", holder.pid);
            println!("  Started:     {}", util::format_relative_time(holder.started_at));
        }
        None => {
            println!("{}", "Not running".yellow());
            println!("  {}", "Tip: Start with 'tailfeed start'".dimmed());
        }
    }
    println!();

    let store = config
        .checkpoint
        .open()
        .context("Failed to open checkpoint store")?;
    println!("Checkpoint:");
    println!("  Store:       {}", store.describe());
    match store.load().await {
        Ok(Some(position)) => {
            println!("  Position:    {}", util::format_position(&position).yellow());
            if position.resume_token.is_some() {
                println!("  Resume:      {}", "token stored".dimmed());
            }
        }
        Ok(None) => println!(
            "  {}",
            "No checkpoint (next start performs a backfill)".dimmed()
        ),
        Err(e) => println!("  {} {}", "Unreadable:".red(), e),
    }

    Ok(())
}
