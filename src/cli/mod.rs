//! Command-line interface components
//!
//! Argument parsing, command handlers and the download progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    AuthAction, AuthArgs, Cli, Commands, DownloadArgs, GlobalArgs, ResolveArgs, TargetArgs,
    WatchArgs,
};
pub use commands::{handle_auth, handle_download, handle_resolve, handle_watch};
pub use progress::{ProgressConfig, ProgressDisplay, ProgressTally};
