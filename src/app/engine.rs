//! The content acquisition engine as one handle
//!
//! Wires the session hub, resolver and downloader together so callers only
//! deal with `resolve` and `materialize`.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::cdn::CdnClient;
use crate::app::downloader::{ChunkProgress, ChunkedDownloader, DownloadSummary, DownloaderConfig};
use crate::app::models::{ContentIdentifier, ContentVersion};
use crate::app::resolver::VersionResolver;
use crate::app::session::SessionHub;
use crate::errors::{DownloadResult, ResolutionResult};

pub struct ContentEngine {
    hub: Arc<SessionHub>,
    resolver: VersionResolver,
    downloader: ChunkedDownloader,
}

impl ContentEngine {
    pub fn new(
        hub: Arc<SessionHub>,
        cdn: Arc<dyn CdnClient>,
        config: DownloaderConfig,
    ) -> DownloadResult<Self> {
        Ok(Self {
            resolver: VersionResolver::new(Arc::clone(&hub)),
            downloader: ChunkedDownloader::new(Arc::clone(&hub), cdn, config)?,
            hub,
        })
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    pub fn downloader(&self) -> &ChunkedDownloader {
        &self.downloader
    }

    pub async fn resolve(
        &self,
        identifier: &ContentIdentifier,
    ) -> ResolutionResult<Vec<ContentVersion>> {
        self.resolver.resolve(identifier).await
    }

    pub async fn materialize(
        &self,
        destination: &Path,
        version: &ContentVersion,
    ) -> DownloadResult<DownloadSummary> {
        self.downloader.materialize(destination, version).await
    }

    pub async fn materialize_with_progress(
        &self,
        destination: &Path,
        version: &ContentVersion,
        progress: mpsc::Sender<ChunkProgress>,
    ) -> DownloadResult<DownloadSummary> {
        self.downloader
            .materialize_with_progress(destination, version, Some(progress))
            .await
    }

    /// Log off and drop session secrets
    pub async fn shutdown(&self) {
        self.hub.dispose().await;
    }
}
