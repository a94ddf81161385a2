//! Watcher configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::models::ContentIdentifier;
use crate::constants::{files, watch};
use crate::errors::{ConfigError, ConfigResult};

/// What to watch and where to put it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub app_id: u32,
    pub depot_id: u32,
    pub branches: Vec<String>,
    /// Each branch is materialized into `output_dir/<branch>`
    pub output_dir: PathBuf,
    /// Versions already downloaded; relative paths live under the output directory
    pub ledger_path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            depot_id: 0,
            branches: vec![watch::DEFAULT_BRANCH.to_string()],
            output_dir: PathBuf::from(files::DEFAULT_OUTPUT_DIR),
            ledger_path: PathBuf::from(watch::LEDGER_FILE),
            interval: watch::DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl WatchConfig {
    pub fn identifier(&self) -> ContentIdentifier {
        ContentIdentifier::new(self.app_id, self.depot_id, self.branches.iter())
    }

    /// Ledger location with relative paths resolved against the output directory
    pub fn resolved_ledger_path(&self) -> PathBuf {
        if self.ledger_path.is_absolute() {
            self.ledger_path.clone()
        } else {
            self.output_dir.join(&self.ledger_path)
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.app_id == 0 {
            return Err(ConfigError::MissingField {
                field: "watch.app_id".to_string(),
            });
        }
        if self.depot_id == 0 {
            return Err(ConfigError::MissingField {
                field: "watch.depot_id".to_string(),
            });
        }
        if self.branches.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigError::MissingField {
                field: "watch.branches".to_string(),
            });
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "watch.interval".to_string(),
                value: "0s".to_string(),
                reason: "interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_needs_ids() {
        let config = WatchConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_valid_config() {
        let config = WatchConfig {
            app_id: 10,
            depot_id: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.identifier().branches(), ["public".to_string()]);
        assert_eq!(
            config.resolved_ledger_path(),
            PathBuf::from("./output").join("versions.json")
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = WatchConfig {
            app_id: 10,
            depot_id: 1,
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
