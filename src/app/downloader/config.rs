//! Downloader configuration

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for chunked materialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Number of concurrent chunk workers
    pub worker_count: usize,
    /// Attempts a chunk may accumulate; one more failure aborts the download
    pub max_chunk_retries: u32,
    /// Servers requested from the server directory
    pub server_pool_size: u32,
    /// Capacity of the progress event channel
    pub progress_buffer_size: usize,
    /// Avoid the server that just failed a chunk when picking its retry server
    pub exclude_failed_server: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_chunk_retries: workers::MAX_CHUNK_RETRIES,
            server_pool_size: workers::DEFAULT_SERVER_POOL_SIZE,
            progress_buffer_size: workers::PROGRESS_BUFFER_SIZE,
            exclude_failed_server: true,
        }
    }
}

impl DownloaderConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> DownloadResult<()> {
        if self.worker_count == 0 {
            return Err(DownloadError::Configuration(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(DownloadError::Configuration(format!(
                "worker_count must be at most {}",
                workers::MAX_WORKER_COUNT
            )));
        }
        if self.server_pool_size == 0 {
            return Err(DownloadError::Configuration(
                "server_pool_size must be greater than 0".to_string(),
            ));
        }
        if self.progress_buffer_size == 0 {
            return Err(DownloadError::Configuration(
                "progress_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the worker count
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }
}
