//! tailfeed CLI - resumable MongoDB change-feed consumer

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::{locks, logging, processor, status_server, system_config, util};
use std::path::PathBuf;

mod cmd;

/// tailfeed - Resumable change-feed consumer for a MongoDB collection
#[derive(Parser)]
#[command(name = "tailfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: $TAILFEED_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consumer in the foreground
    Start {
        /// Skip the cold-start backfill even if no checkpoint is stored
        #[arg(long)]
        no_backfill: bool,
    },
    /// Show consumer and checkpoint status
    Status,
    /// Inspect or reset the stored checkpoint
    #[command(subcommand)]
    Checkpoint(CheckpointCommands),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Print the stored position
    Show {
        /// Print the serialized value as stored
        #[arg(long)]
        raw: bool,
    },
    /// Clear the stored position (next start backfills)
    Reset {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    List,
    /// Print the default config file path
    Path {
        /// Write the example config there if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    // `start` installs its own subscriber from the loaded config
    if !matches!(cli.command, Commands::Start { .. }) {
        logging::init_simple();
    }

    match cli.command {
        Commands::Start { no_backfill } => cmd::start::run(config, no_backfill).await,
        Commands::Status => cmd::status::run(config).await,
        Commands::Checkpoint(checkpoint_cmd) => match checkpoint_cmd {
            CheckpointCommands::Show { raw } => cmd::checkpoint::run_show(config, raw).await,
            CheckpointCommands::Reset { yes } => cmd::checkpoint::run_reset(config, yes).await,
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(config).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
