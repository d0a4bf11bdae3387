//! # pwm
//!
//! Deterministic password manager with preset sync.
//!
//! ## Commands
//!
//! - `generate`: Derive the password for an identifier
//! - `preset`: List and edit saved presets
//! - `app`: List and edit app mappings
//! - `sync`: Configure, test and run sync
//! - `status`: Show settings and sync status
//!
//! ## Example
//!
//! ```bash
//! # Derive with the stored preset (or the defaults)
//! pwm generate example.com
//!
//! # Derive a short password and remember the parameters
//! pwm generate example.com --iter 2 --short --save
//!
//! # Set up sync (the server must answer first) and run it
//! pwm sync config --host sync.example.com --port 8443
//! pwm sync now
//!
//! # Pause automatic syncs
//! pwm sync auto off
//! ```

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pwm_client::SyncStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::generate::GenerateArgs;
use commands::{app, generate, preset, status, sync, Context};
use config::CliConfig;

/// Deterministic password manager with preset sync.
#[derive(Parser, Debug)]
#[command(name = "pwm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the settings database and pwm.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive the password for an identifier
    Generate(GenerateArgs),

    /// List and edit saved presets
    Preset {
        #[command(subcommand)]
        command: PresetCommand,
    },

    /// List and edit app mappings
    App {
        #[command(subcommand)]
        command: AppCommand,
    },

    /// Configure, test and run sync
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Show settings and sync status
    Status,
}

#[derive(Subcommand, Debug)]
enum PresetCommand {
    /// List saved presets
    List,

    /// Create or update a preset
    Set {
        /// Identifier (usually a domain)
        identifier: String,

        /// Move the preset stored under this identifier
        #[arg(long)]
        rename_from: Option<String>,

        /// Iteration counter
        #[arg(long, short)]
        iter: Option<u32>,

        /// Symbol alphabet
        #[arg(long, short)]
        symbols: Option<String>,

        /// Short 12-character passwords
        #[arg(long, conflicts_with = "long")]
        short: bool,

        /// Long 24-character passwords
        #[arg(long)]
        long: bool,
    },

    /// Remove a preset
    Remove {
        /// Identifier
        identifier: String,
    },
}

#[derive(Subcommand, Debug)]
enum AppCommand {
    /// List app mappings
    List,

    /// Bind an application package to an identifier
    Map {
        /// Application package
        pkg: String,

        /// Identifier whose preset the app uses
        identifier: String,

        /// Move the mapping stored under this package
        #[arg(long)]
        rename_from: Option<String>,
    },

    /// Remove an app mapping
    Remove {
        /// Application package
        pkg: String,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Save the sync server settings
    Config {
        /// Server host name
        #[arg(long)]
        host: String,

        /// Server port
        #[arg(long)]
        port: u16,

        /// User token (will prompt if not provided)
        #[arg(long)]
        token: Option<String>,

        /// Only sync when asked explicitly
        #[arg(long)]
        no_auto: bool,

        /// Save without checking that the server answers
        #[arg(long)]
        no_test: bool,
    },

    /// Check that the configured server answers
    Test,

    /// Turn auto-sync on or off
    Auto {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Forget the server, keeping the token
    Remove,

    /// Sync now
    Now {
        /// Skip the sync if auto-sync is disabled
        #[arg(long)]
        auto_only: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    config::prepare_data_dir(&data_dir).await?;

    let cli_config = CliConfig::load(&data_dir).await?;
    init_tracing(&cli_config.log_level);

    let store = config::open_store(&data_dir).await?;
    let ctx = Context::new(Arc::new(store), cli_config, SyncStatus::global());

    match cli.command {
        Commands::Generate(args) => generate::run(&ctx, &args).await?,
        Commands::Preset { command } => match command {
            PresetCommand::List => preset::list(&ctx).await?,
            PresetCommand::Set {
                identifier,
                rename_from,
                iter,
                symbols,
                short,
                long,
            } => {
                let long_mode = if short {
                    Some(false)
                } else if long {
                    Some(true)
                } else {
                    None
                };
                preset::set(
                    &ctx,
                    &identifier,
                    rename_from.as_deref(),
                    iter,
                    symbols.as_deref(),
                    long_mode,
                )
                .await?;
            }
            PresetCommand::Remove { identifier } => preset::remove(&ctx, &identifier).await?,
        },
        Commands::App { command } => match command {
            AppCommand::List => app::list(&ctx).await?,
            AppCommand::Map {
                pkg,
                identifier,
                rename_from,
            } => app::map(&ctx, &pkg, &identifier, rename_from.as_deref()).await?,
            AppCommand::Remove { pkg } => app::remove(&ctx, &pkg).await?,
        },
        Commands::Sync { command } => match command {
            SyncCommand::Config {
                host,
                port,
                token,
                no_auto,
                no_test,
            } => sync::configure(&ctx, &host, port, token, !no_auto, !no_test).await?,
            SyncCommand::Test => sync::test(&ctx).await?,
            SyncCommand::Auto { state } => sync::set_auto(&ctx, state == Toggle::On).await?,
            SyncCommand::Remove => sync::remove(&ctx).await?,
            SyncCommand::Now { auto_only } => sync::now(&ctx, auto_only).await?,
        },
        Commands::Status => status::run(&ctx).await?,
    }

    Ok(())
}

/// Log to stderr so stdout carries only command output. `RUST_LOG` wins
/// over the configured level.
fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Get the default data directory for pwm.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("de", "blockworker", "pwm")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
