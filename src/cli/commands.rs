//! Command handlers for the CLI
//!
//! Each handler builds what it needs from the loaded [`AppConfig`]: the
//! content service gateway, the CDN client, the session hub and the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::watcher::{
    create_shutdown_channel, CheckOutcome, JsonLedger, LogNotifier, SignalHandler, UpdateWatcher,
};
use crate::app::{
    ContentEngine, ContentVersion, GatewayService, HttpCdnClient, SessionHub, WatchConfig,
};
use crate::auth::{
    get_auth_status, prompt_credentials, save_credentials, ConsoleAuthenticator, Credentials,
    FileTokenStore, TokenStore,
};
use crate::cli::args::{AuthAction, AuthArgs, DownloadArgs, ResolveArgs, WatchArgs};
use crate::cli::progress::{ProgressConfig, ProgressDisplay};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Build a session hub for `credentials` from the configuration
fn build_hub(config: &AppConfig, credentials: Credentials) -> Result<Arc<SessionHub>> {
    let client_config = config.client.to_runtime_config();
    let service = GatewayService::new(&config.account.service_url, &client_config)?;
    let token_store = FileTokenStore::new(config.account.token_store_path()?);
    debug!(
        "Using content service {} and token store {}",
        service.base_url(),
        token_store.path().display()
    );

    let hub = SessionHub::new(
        Arc::new(service),
        credentials,
        Arc::new(token_store),
        Arc::new(ConsoleAuthenticator),
    )
    .with_auth_timeout(config.account.auth_timeout);
    Ok(Arc::new(hub))
}

/// Build the full engine with credentials from the environment
fn build_engine(config: &AppConfig) -> Result<ContentEngine> {
    let hub = build_hub(config, Credentials::from_env()?)?;
    let cdn = HttpCdnClient::new(&config.client.to_runtime_config())?;
    Ok(ContentEngine::new(
        hub,
        Arc::new(cdn),
        config.downloader.clone(),
    )?)
}

/// Handle the resolve command
pub async fn handle_resolve(args: ResolveArgs, config: &AppConfig) -> Result<()> {
    let engine = build_engine(config)?;
    let identifier = args.target.identifier();

    let result = engine.resolve(&identifier).await;
    engine.shutdown().await;
    let versions = result?;

    if versions.is_empty() {
        println!(
            "ℹ️  None of the requested branches exist for app {} depot {}",
            identifier.app_id, identifier.depot_id
        );
        return Ok(());
    }

    println!("📋 App {} depot {}", identifier.app_id, identifier.depot_id);
    for version in &versions {
        println!("   {:<20} {}", version.branch, version.manifest_id);
    }
    Ok(())
}

/// Handle the download command
pub async fn handle_download(args: DownloadArgs, config: &AppConfig) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let mut config = config.clone();
    if let Some(workers) = args.workers {
        config.downloader = config.downloader.with_workers(workers);
    }
    let engine = build_engine(&config)?;

    let result = download(&engine, &args, &config).await;
    engine.shutdown().await;
    result
}

async fn download(engine: &ContentEngine, args: &DownloadArgs, config: &AppConfig) -> Result<()> {
    let version = match args.manifest {
        Some(manifest_id) => ContentVersion::new(
            args.target.app,
            args.target.depot,
            args.target.branches[0].clone(),
            manifest_id,
        ),
        None => engine
            .resolve(&args.target.identifier())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::generic("none of the requested branches exist"))?,
    };

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| config.watch.output_dir.join(&version.branch));
    if args.clean {
        clear_destination(&destination).await?;
    }

    println!("📥 Downloading {} into {}", version, destination.display());
    let (tx, rx) = mpsc::channel(config.downloader.progress_buffer_size);
    let display = ProgressDisplay::new(ProgressConfig::default()).spawn(rx);

    let result = engine
        .materialize_with_progress(&destination, &version, tx)
        .await;
    let tally = display.await.unwrap_or_default();
    let summary = result?;

    println!("✅ {}", summary);
    if tally.retries > 0 {
        println!("   {} chunk retries along the way", tally.retries);
    }
    Ok(())
}

async fn clear_destination(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            info!("Removed existing content in {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Merge command-line overrides into the configured watch settings
pub fn watch_config(args: &WatchArgs, configured: &WatchConfig) -> WatchConfig {
    let mut config = configured.clone();
    if let Some(app) = args.app {
        config.app_id = app;
    }
    if let Some(depot) = args.depot {
        config.depot_id = depot;
    }
    if !args.branches.is_empty() {
        config.branches = args.branches.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    config
}

/// Handle the watch command
pub async fn handle_watch(args: WatchArgs, config: &AppConfig) -> Result<()> {
    let watch = watch_config(&args, &config.watch);
    watch.validate()?;

    let engine = Arc::new(build_engine(config)?);
    let ledger = JsonLedger::new(watch.resolved_ledger_path());
    let watcher = UpdateWatcher::new(
        Arc::clone(&engine),
        Arc::new(ledger),
        Arc::new(LogNotifier),
        watch,
    )?;

    if args.once {
        let result = watcher.check_once().await;
        engine.shutdown().await;
        for outcome in result? {
            print_outcome(&outcome);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signals = SignalHandler::new(shutdown_tx).setup();

    println!(
        "👀 Watching app {} depot {} (Ctrl+C to stop)",
        watcher.config().app_id,
        watcher.config().depot_id
    );
    watcher.run(shutdown_rx).await;

    signals.abort();
    engine.shutdown().await;
    Ok(())
}

fn print_outcome(outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::UpToDate { version } => println!("✅ {} is up to date", version),
        CheckOutcome::Downloaded { version, summary } => {
            println!("📥 Downloaded {}: {}", version, summary)
        }
        CheckOutcome::Failed { version, error } => println!("❌ {}: {}", version, error),
    }
}

/// Handle authentication commands
pub async fn handle_auth(args: AuthArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        AuthAction::Status => show_auth_status(config).await,
        AuthAction::Login { save } => login(config, save).await,
        AuthAction::Logout => logout(config).await,
    }
}

async fn show_auth_status(config: &AppConfig) -> Result<()> {
    let mut status = get_auth_status();
    let token_path = config.account.token_store_path()?;
    if let Ok(credentials) = Credentials::from_env() {
        let store = FileTokenStore::new(&token_path);
        status.token_stored = Some(store.get_token(credentials.username()).await?.is_some());
    }

    println!("🔐 Authentication Status");
    println!("========================");
    println!("Username set: {}", yes_no(status.username_set));
    println!("Password set: {}", yes_no(status.password_set));
    println!(".env file present: {}", yes_no(status.dotenv_file_exists));
    if let Some(stored) = status.token_stored {
        println!("Stored token: {}", yes_no(stored));
    }
    println!("Token store: {}", token_path.display());
    println!();
    println!("{}", status.status_message());
    Ok(())
}

async fn login(config: &AppConfig, save: bool) -> Result<()> {
    let credentials = if save {
        let (username, password) = prompt_credentials()?;
        save_credentials(&PathBuf::from(".env"), &username, &password)?;
        println!("💾 Saved credentials to .env");
        Credentials::new(username, Some(password))?
    } else {
        Credentials::from_env()?
    };

    let hub = build_hub(config, credentials)?;
    let result = hub.get_or_create_connection().await;
    hub.dispose().await;
    result?;

    println!("✅ Logged in as {}; token stored", hub.username());
    Ok(())
}

async fn logout(config: &AppConfig) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let store = FileTokenStore::new(config.account.token_store_path()?);

    if store.clear(credentials.username()).await? {
        println!("🗑️  Removed stored token for {}", credentials.username());
    } else {
        println!("ℹ️  No stored token for {}", credentials.username());
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
