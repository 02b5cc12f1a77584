//! nfe-sync CLI
//!
//! Synchronizes fiscal documents from the Authority's distribution feed.
//!
//! # Commands
//!
//! - `sync` - Run the feed for one taxpayer, or look up one access key
//! - `sync-all` - Run the feed for every configured taxpayer
//! - `pending` - List summaries still waiting for their complete form
//! - `cooldown-reset` - Clear an armed cooldown
//! - `relocate` - Rename legacy sequence-named files
//!
//! # Exit codes
//!
//! `0` success, `1` rejected or runtime error, `2` blocked by cooldown,
//! `3` configuration or argument error.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod commands;
mod config;
mod context;
mod error;

use clap::{Parser, Subcommand};
use commands::sync::SyncOptions;
use context::{Context, PathOverrides};
use error::CliResult;
use nfesync_protocol::Environment;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// NF-e distribution feed synchronization.
#[derive(Parser)]
#[command(name = "nfe-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(global = true, short, long, env = "NFE_SYNC_CONFIG", default_value = "nfe-sync.toml")]
    config: PathBuf,

    /// State file, overriding the configured one
    #[arg(global = true, long, env = "NFE_SYNC_STATE")]
    state: Option<PathBuf>,

    /// Audit log directory, overriding the configured one
    #[arg(global = true, long, env = "NFE_SYNC_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Use the production environment
    #[arg(global = true, long, conflicts_with = "homologation")]
    production: bool,

    /// Use the homologation environment
    #[arg(global = true, long)]
    homologation: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the distribution feed for one taxpayer
    Sync {
        /// Taxpayer name from the configuration
        taxpayer: String,

        /// Start from this NSU instead of the persisted one
        #[arg(long, conflicts_with = "key")]
        nsu: Option<u64>,

        /// Reset the persisted NSU to 0 before syncing
        #[arg(long, conflicts_with = "key")]
        reset_nsu: bool,

        /// Look up a single document by access key
        #[arg(long)]
        key: Option<String>,
    },

    /// Run the distribution feed for every configured taxpayer
    SyncAll,

    /// List summaries still waiting for their complete form
    Pending {
        /// Taxpayer name (all if omitted)
        taxpayer: Option<String>,
    },

    /// Clear the cooldown of a taxpayer
    CooldownReset {
        /// Taxpayer name from the configuration
        taxpayer: String,
    },

    /// Rename legacy sequence-named files into the taxpayer directory
    Relocate {
        /// Taxpayer name from the configuration
        taxpayer: String,

        /// Directory holding the legacy files
        source_dir: PathBuf,

        /// Apply the changes (dry run otherwise)
        #[arg(long)]
        execute: bool,
    },
}

impl Cli {
    fn environment(&self) -> Option<Environment> {
        if self.production {
            Some(Environment::Production)
        } else if self.homologation {
            Some(Environment::Homologation)
        } else {
            None
        }
    }
}

fn run(cli: Cli) -> CliResult<commands::Status> {
    let overrides = PathOverrides {
        state_file: cli.state.clone(),
        log_dir: cli.log_dir.clone(),
    };
    let ctx = Context::load(&cli.config, overrides, cli.environment())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let status = match cli.command {
        Commands::Sync {
            taxpayer,
            nsu,
            reset_nsu,
            key,
        } => {
            let options = SyncOptions {
                start_sequence: nsu,
                reset_sequence: reset_nsu,
                key,
            };
            commands::sync::run(&ctx, &taxpayer, &options, &mut out)?
        }
        Commands::SyncAll => commands::sync_all::run(&ctx, &mut out)?,
        Commands::Pending { taxpayer } => {
            commands::pending::run(&ctx, taxpayer.as_deref(), &mut out)?
        }
        Commands::CooldownReset { taxpayer } => {
            commands::cooldown::run(&ctx, &taxpayer, &mut out)?
        }
        Commands::Relocate {
            taxpayer,
            source_dir,
            execute,
        } => commands::relocate::run(&ctx, &taxpayer, &source_dir, execute, &mut out)?,
    };

    out.flush()?;
    Ok(status)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(status) => status.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
