//! Configuration management for Depot Fetcher
//!
//! Settings come from a TOML file found on a search path, with a commented
//! default file written on first run. Credentials are never read from here;
//! they come from the environment (see [`crate::auth`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, DownloaderConfig, WatchConfig};
use crate::auth::FileTokenStore;
use crate::constants::{auth, files, http, limits, logging, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Content service account settings
    pub account: AccountConfig,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Chunk download settings
    pub downloader: DownloaderConfig,
    /// Update watcher settings
    pub watch: WatchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where the content service lives and how sessions are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Base URL of the content service gateway
    pub service_url: String,
    /// Refresh token file (None = user config directory)
    pub token_store: Option<PathBuf>,
    /// Upper bound on an interactive login
    #[serde(with = "humantime_serde")]
    pub auth_timeout: Duration,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            service_url: files::DEFAULT_SERVICE_URL.to_string(),
            token_store: None,
            auth_timeout: auth::AUTH_SESSION_TIMEOUT,
        }
    }
}

impl AccountConfig {
    /// Token file location, falling back to the user config directory
    pub fn token_store_path(&self) -> ConfigResult<PathBuf> {
        match &self.token_store {
            Some(path) => Ok(path.clone()),
            None => FileTokenStore::default_path().ok_or_else(|| ConfigError::MissingField {
                field: "account.token_store".to_string(),
            }),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    pub http2: bool,
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_per_host: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// CDN requests per second across all workers
    pub rate_limit_rps: u32,
    pub cdn_scheme: String,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        let runtime = ClientConfig::default();
        Self {
            http2: runtime.http2,
            tcp_keepalive: runtime.tcp_keepalive,
            tcp_nodelay: runtime.tcp_nodelay,
            pool_idle_timeout: runtime.pool_idle_timeout,
            pool_max_per_host: runtime.pool_max_per_host,
            request_timeout: runtime.request_timeout,
            connect_timeout: runtime.connect_timeout,
            rate_limit_rps: runtime.rate_limit_rps,
            cdn_scheme: runtime.cdn_scheme,
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            http2: self.http2,
            tcp_keepalive: self.tcp_keepalive,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            cdn_scheme: self.cdn_scheme.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no -v/-q flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise the first file found on the
    /// search path wins, and defaults apply when there is none.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }),
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found in standard locations, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Write a commented default file to the user config directory if none exists
    pub async fn initialize_first_run() -> ConfigResult<Option<PathBuf>> {
        let Some(config_path) = Self::default_config_path() else {
            return Ok(None);
        };
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");
        Self::write_default(&config_path).await?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default(path: &Path) -> ConfigResult<()> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(io_err)
    }

    /// Check values the runtime structs cannot represent
    pub fn validate(&self) -> ConfigResult<()> {
        url::Url::parse(&self.account.service_url).map_err(|e| ConfigError::InvalidValue {
            field: "account.service_url".to_string(),
            value: self.account.service_url.clone(),
            reason: e.to_string(),
        })?;
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "rate limit must be greater than zero".to_string(),
            });
        }
        self.downloader
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "downloader".to_string(),
                value: format!("{:?}", self.downloader),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(files::CONFIG_FILE_NAME)];
        search_paths.extend(Self::default_config_path());
        #[cfg(unix)]
        search_paths.push(PathBuf::from(files::SYSTEM_CONFIG_PATH));

        let found = search_paths.into_iter().find(|path| path.exists());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::APP_DIR_NAME).join("config.toml"))
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    fn generate_default_config_content() -> String {
        format!(
            r#"# Depot Fetcher Configuration
# This file was automatically generated on first run.
# Credentials are read from DEPOT_USERNAME / DEPOT_PASSWORD (or .env), never from here.

[account]
service_url = "{service_url}"
# token_store = "/path/to/tokens.json"  # Defaults to the user config directory
auth_timeout = "5m"

[client]
http2 = false
tcp_keepalive = "30s"
tcp_nodelay = true
pool_idle_timeout = "90s"
pool_max_per_host = {pool_max}
request_timeout = "60s"
connect_timeout = "30s"
rate_limit_rps = {rps}
cdn_scheme = "{scheme}"

[downloader]
worker_count = {workers}
max_chunk_retries = {retries}
server_pool_size = {servers}
progress_buffer_size = {buffer}
# Retry a failed chunk on a different server when more than one is available
exclude_failed_server = true

[watch]
# app_id = 10
# depot_id = 1
branches = ["public"]
output_dir = "{output}"
ledger_path = "versions.json"  # Relative to output_dir
interval = "1h"

[logging]
level = "info"  # error, warn, info, debug, trace
"#,
            service_url = files::DEFAULT_SERVICE_URL,
            pool_max = http::POOL_MAX_PER_HOST,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            scheme = http::CDN_SCHEME,
            workers = workers::DEFAULT_WORKER_COUNT,
            retries = workers::MAX_CHUNK_RETRIES,
            servers = workers::DEFAULT_SERVER_POOL_SIZE,
            buffer = workers::PROGRESS_BUFFER_SIZE,
            output = files::DEFAULT_OUTPUT_DIR,
        )
    }
}
