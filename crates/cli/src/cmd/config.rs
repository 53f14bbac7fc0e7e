//! Configuration inspection command

use crate::system_config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration (file + environment)
pub async fn run_list(config_path: Option<&Path>) -> Result<()> {
    let config = system_config::load(config_path)?;

    match system_config::resolve_path(config_path) {
        Some(path) => println!("{}: {}", "Location".dimmed(), path.display().dimmed()),
        None => println!("{}", "No config file; using defaults".dimmed()),
    }
    println!();

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  backfill.concurrency: 1-100,000");
    println!("  checkpoint.backend: file | redis | sled");
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", system_config::example_config());
    Ok(())
}
