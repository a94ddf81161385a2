//! Depot Fetcher CLI application
//!
//! Resolves depot branches to manifest versions and downloads them from the
//! content CDN, once or on a schedule.

use std::process;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use depot_fetcher::cli::{handle_auth, handle_download, handle_resolve, handle_watch, Cli, Commands};
use depot_fetcher::config::AppConfig;
use depot_fetcher::constants::logging;
use depot_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.global.config.is_none() {
        if let Err(e) = AppConfig::initialize_first_run().await {
            eprintln!("Could not create default configuration: {}", e);
        }
    }
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("Depot Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Resolve(args) => {
            info!("Executing resolve command");
            handle_resolve(args, &config).await
        }
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, &config).await
        }
        Commands::Watch(args) => {
            info!("Executing watch command");
            handle_watch(args, &config).await
        }
        Commands::Auth(args) => {
            info!("Executing auth command");
            handle_auth(args, &config).await
        }
    }
}

/// Initialize logging from the CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let configured = tracing::Level::from_str(&config.logging.level).ok();
    let level = cli.log_level(configured.unwrap_or(tracing::Level::INFO));

    let mut filter = EnvFilter::from_default_env();
    match format!("{}={}", logging::CRATE_TARGET, level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log directive: {}", e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if configured.is_none() {
        warn!(
            "Unknown log level '{}' in configuration, using info",
            config.logging.level
        );
    }
    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    }
}
