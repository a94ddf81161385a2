//! Periodic update watcher
//!
//! Every interval the configured identifier is resolved. A branch whose live
//! manifest differs from the last one recorded in the ledger has its
//! directory cleared and is downloaded again from scratch. Failures are
//! reported to the [`Notifier`] and the loop carries on; shutdown is only
//! observed between checks and while sleeping.

pub mod config;
pub mod ledger;
pub mod notify;
pub mod signals;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::downloader::DownloadSummary;
use crate::app::engine::ContentEngine;
use crate::app::models::ContentVersion;
use crate::errors::{AppError, Result};

pub use config::WatchConfig;
pub use ledger::{JsonLedger, LedgerEntry, MemoryLedger, VersionLedger};
pub use notify::{LogNotifier, Notifier};
pub use signals::{create_shutdown_channel, SignalHandler};

/// Result of checking one branch
#[derive(Debug)]
pub enum CheckOutcome {
    UpToDate {
        version: ContentVersion,
    },
    Downloaded {
        version: ContentVersion,
        summary: DownloadSummary,
    },
    Failed {
        version: ContentVersion,
        error: AppError,
    },
}

impl CheckOutcome {
    pub fn version(&self) -> &ContentVersion {
        match self {
            Self::UpToDate { version }
            | Self::Downloaded { version, .. }
            | Self::Failed { version, .. } => version,
        }
    }
}

pub struct UpdateWatcher {
    engine: Arc<ContentEngine>,
    ledger: Arc<dyn VersionLedger>,
    notifier: Arc<dyn Notifier>,
    config: WatchConfig,
}

impl UpdateWatcher {
    pub fn new(
        engine: Arc<ContentEngine>,
        ledger: Arc<dyn VersionLedger>,
        notifier: Arc<dyn Notifier>,
        config: WatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            ledger,
            notifier,
            config,
        })
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Directory a branch is materialized into
    pub fn branch_dir(&self, branch: &str) -> PathBuf {
        self.config.output_dir.join(branch)
    }

    /// Run one check over every configured branch
    ///
    /// Errors from resolution or reading the ledger fail the whole check;
    /// a failed download only fails its own branch.
    pub async fn check_once(&self) -> Result<Vec<CheckOutcome>> {
        let identifier = self.config.identifier();
        let versions = self.engine.resolve(&identifier).await?;
        if versions.is_empty() {
            warn!(
                "No branches of app {} depot {} resolved",
                identifier.app_id, identifier.depot_id
            );
        }

        let mut outcomes = Vec::with_capacity(versions.len());
        for version in versions {
            let outcome = self.check_version(version).await?;
            self.notifier.notify(&outcome).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn check_version(&self, version: ContentVersion) -> Result<CheckOutcome> {
        let recorded = self
            .ledger
            .latest(version.app_id, version.depot_id, &version.branch)
            .await?;
        if recorded == Some(version.manifest_id) {
            debug!("{} already downloaded", version);
            return Ok(CheckOutcome::UpToDate { version });
        }

        info!("New version available: {}", version);
        let destination = self.branch_dir(&version.branch);
        if let Err(error) = clear_directory(&destination).await {
            return Ok(CheckOutcome::Failed {
                version,
                error: error.into(),
            });
        }

        let summary = match self.engine.materialize(&destination, &version).await {
            Ok(summary) => summary,
            Err(error) => {
                return Ok(CheckOutcome::Failed {
                    version,
                    error: error.into(),
                })
            }
        };

        match self.ledger.record(&version).await {
            Ok(()) => Ok(CheckOutcome::Downloaded { version, summary }),
            Err(error) => Ok(CheckOutcome::Failed {
                version,
                error: error.into(),
            }),
        }
    }

    /// Check, sleep, repeat until `shutdown` fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Watching app {} depot {} every {}",
            self.config.app_id,
            self.config.depot_id,
            humantime_serde::re::humantime::format_duration(self.config.interval)
        );

        loop {
            if shutdown.try_recv().is_ok() {
                info!("Update watcher stopping");
                break;
            }
            if let Err(error) = self.check_once().await {
                self.notifier.check_failed(&error).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.recv() => {
                    info!("Update watcher stopping");
                    break;
                }
            }
        }
    }
}

async fn clear_directory(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("Cleared {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
