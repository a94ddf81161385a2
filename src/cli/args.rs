//! Command-line argument parsing for Depot Fetcher
//!
//! This module defines the CLI structure using clap derive macros: version
//! resolution, one-shot downloads, the update watcher and account management.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use crate::app::ContentIdentifier;
use crate::constants::watch;

/// Depot Fetcher - Download depot content from a chunked CDN
#[derive(Parser, Debug)]
#[command(
    name = "depot_fetcher",
    version,
    about = "Resolve and download depot content from a chunked CDN",
    long_about = "Resolves application branches to manifest versions and reconstructs their files from
encrypted, independently fetched chunks. Can also watch branches and download every new version."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the manifest currently live on each branch
    Resolve(ResolveArgs),

    /// Download the live version of a branch
    Download(DownloadArgs),

    /// Check for new versions periodically and download them
    Watch(WatchArgs),

    /// Manage the content service login
    Auth(AuthArgs),
}

/// Application, depot and branches to look up
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Application id
    #[arg(short, long)]
    pub app: u32,

    /// Depot id
    #[arg(short, long)]
    pub depot: u32,

    /// Branch names (repeatable)
    #[arg(short, long = "branch", default_value = watch::DEFAULT_BRANCH)]
    pub branches: Vec<String>,
}

impl TargetArgs {
    pub fn identifier(&self) -> ContentIdentifier {
        ContentIdentifier::new(self.app, self.depot, self.branches.iter())
    }
}

/// Arguments for the resolve command
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Destination directory (defaults to <output_dir>/<branch>)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of concurrent chunk workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Manifest to download instead of the live one
    #[arg(long, value_name = "ID")]
    pub manifest: Option<u64>,

    /// Remove existing content in the destination first
    #[arg(long)]
    pub clean: bool,
}

impl DownloadArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if self.manifest.is_some() && self.target.branches.len() > 1 {
            return Err("--manifest can only be used with a single --branch".to_string());
        }
        Ok(())
    }
}

/// Arguments for the watch command
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Application id (overrides [watch] app_id)
    #[arg(short, long)]
    pub app: Option<u32>,

    /// Depot id (overrides [watch] depot_id)
    #[arg(short, long)]
    pub depot: Option<u32>,

    /// Branch names (override [watch] branches)
    #[arg(short, long = "branch")]
    pub branches: Vec<String>,

    /// Output directory (overrides [watch] output_dir)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Time between checks, e.g. "30m" (overrides [watch] interval)
    #[arg(short, long, value_parser = parse_interval)]
    pub interval: Option<std::time::Duration>,

    /// Run a single check and exit
    #[arg(long)]
    pub once: bool,
}

fn parse_interval(value: &str) -> Result<std::time::Duration, String> {
    humantime_serde::re::humantime::Duration::from_str(value)
        .map(Into::into)
        .map_err(|e| format!("invalid interval '{}': {}", value, e))
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Show credential and token status
    Status,

    /// Log in now and store a refresh token
    Login {
        /// Prompt for credentials and save them to .env
        #[arg(long)]
        save: bool,
    },

    /// Forget the stored refresh token
    Logout,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level from the flags, or `configured` when none is given
    pub fn log_level(&self, configured: tracing::Level) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            configured
        }
    }
}
