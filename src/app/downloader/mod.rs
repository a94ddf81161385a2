//! Chunked materialization of a depot version
//!
//! 1. Ensure the destination exists.
//! 2. Get the server pool and the manifest.
//! 3. Preallocate every file that has content.
//! 4. Queue every chunk, then let a fixed pool of workers drain the queue.
//!
//! Chunks land at their file offsets in whatever order they complete. The
//! download succeeds only when the queue drains without any chunk running
//! out of attempts.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use depot_fetcher::app::{ChunkedDownloader, ContentVersion};
//!
//! # async fn example(downloader: ChunkedDownloader) -> Result<(), Box<dyn std::error::Error>> {
//! let version = ContentVersion::new(10, 1, "public", 555);
//! let summary = downloader.materialize(Path::new("./output/public"), &version).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod files;
pub mod queue;
pub mod stats;
pub mod worker;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::app::cdn::CdnClient;
use crate::app::manifest::ManifestFetcher;
use crate::app::models::ContentVersion;
use crate::app::session::SessionHub;
use crate::errors::{DownloadError, DownloadResult};

pub use config::DownloaderConfig;
pub use files::{prepare_file, TargetFile};
pub use queue::{ChunkQueue, ChunkTask};
pub use stats::{ChunkProgress, DownloadCounters, DownloadSummary};
pub use worker::{ChunkWorker, WorkerContext};

/// Materializes depot versions into directories
pub struct ChunkedDownloader {
    hub: Arc<SessionHub>,
    cdn: Arc<dyn CdnClient>,
    fetcher: ManifestFetcher,
    config: DownloaderConfig,
}

impl ChunkedDownloader {
    pub fn new(
        hub: Arc<SessionHub>,
        cdn: Arc<dyn CdnClient>,
        config: DownloaderConfig,
    ) -> DownloadResult<Self> {
        config.validate()?;
        Ok(Self {
            fetcher: ManifestFetcher::new(Arc::clone(&hub), Arc::clone(&cdn)),
            hub,
            cdn,
            config,
        })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Download every file of `version` into `destination`
    pub async fn materialize(
        &self,
        destination: &Path,
        version: &ContentVersion,
    ) -> DownloadResult<DownloadSummary> {
        self.materialize_with_progress(destination, version, None)
            .await
    }

    /// Like [`materialize`](Self::materialize), reporting progress on `progress`
    pub async fn materialize_with_progress(
        &self,
        destination: &Path,
        version: &ContentVersion,
        progress: Option<mpsc::Sender<ChunkProgress>>,
    ) -> DownloadResult<DownloadSummary> {
        let started = Instant::now();
        info!("Materializing {} into {}", version, destination.display());

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| DownloadError::Prepare {
                path: destination.to_path_buf(),
                source,
            })?;

        let session = self.hub.get_or_create_connection().await?;
        let servers = session
            .content_servers(self.config.server_pool_size)
            .await?;
        if servers.is_empty() {
            return Err(DownloadError::NoServers {
                depot_id: version.depot_id,
            });
        }
        debug!("Using {} content servers", servers.len());

        let manifest = self.fetcher.fetch(version, &servers).await?;
        let key = session.depot_key(version.depot_id, version.app_id).await?;

        let queue = Arc::new(ChunkQueue::new());
        let mut targets = Vec::new();
        let mut files_skipped = 0;
        for file in &manifest.files {
            if !file.is_materializable() {
                debug!("Skipping metadata-only entry {}", file.path.display());
                files_skipped += 1;
                continue;
            }
            let target = prepare_file(destination, file).await?;
            for chunk in &file.chunks {
                queue.push(ChunkTask::new(Arc::clone(&target), chunk.clone()));
            }
            targets.push(target);
        }

        let total_chunks = queue.len();
        info!(
            "Prepared {} files ({} skipped), {} chunks, {} bytes",
            targets.len(),
            files_skipped,
            total_chunks,
            manifest.total_bytes()
        );

        let ctx = Arc::new(WorkerContext {
            queue,
            cdn: Arc::clone(&self.cdn),
            servers: servers.into(),
            key,
            depot_id: version.depot_id,
            max_chunk_retries: self.config.max_chunk_retries,
            exclude_failed_server: self.config.exclude_failed_server,
            abort: AtomicBool::new(false),
            counters: DownloadCounters::default(),
            progress,
        });
        if let Some(tx) = &ctx.progress {
            let _ = tx.try_send(ChunkProgress::Started {
                total_chunks,
                total_bytes: manifest.total_bytes(),
            });
        }

        let worker_count = self.config.worker_count.min(total_chunks);
        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(ChunkWorker::new(id, Arc::clone(&ctx)).run());
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(DownloadError::WorkerPanic {
                    reason: e.to_string(),
                })
            });
            if let Err(e) = outcome {
                failure.get_or_insert(e);
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        for target in &targets {
            target.sync().await?;
        }

        let summary = ctx
            .counters
            .summary(targets.len(), files_skipped, started.elapsed());
        info!("Materialized {}: {}", version, summary);
        Ok(summary)
    }
}
