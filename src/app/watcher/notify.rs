//! Reporting of watcher outcomes

use async_trait::async_trait;
use tracing::{error, info, warn, Level};

use crate::app::watcher::CheckOutcome;
use crate::errors::AppError;

/// Receives the result of every check
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: &CheckOutcome);

    /// The check could not run at all (resolution or ledger failure)
    async fn check_failed(&self, error: &AppError);
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, outcome: &CheckOutcome) {
        match outcome {
            CheckOutcome::UpToDate { version } => {
                info!("{} is up to date", version);
            }
            CheckOutcome::Downloaded { version, summary } => {
                info!("Downloaded new version {}: {}", version, summary);
            }
            CheckOutcome::Failed { version, error } => match failure_level(error) {
                Level::WARN => warn!(
                    "Failed to download {}, retrying next check: {}",
                    version, error
                ),
                _ => error!("Failed to download {}: {}", version, error),
            },
        }
    }

    async fn check_failed(&self, error: &AppError) {
        match failure_level(error) {
            Level::WARN => warn!(
                "Update check failed ({}), retrying next check: {}",
                error.category(),
                error
            ),
            _ => error!("Update check failed ({}): {}", error.category(), error),
        }
    }
}

/// Recoverable failures are expected to clear up by the next check
fn failure_level(error: &AppError) -> Level {
    if error.is_recoverable() {
        Level::WARN
    } else {
        Level::ERROR
    }
}
