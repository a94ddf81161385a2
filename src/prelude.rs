//! Prelude module for Depot Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use depot_fetcher::prelude::*;` is enough to wire up an engine.
//!
//! # Usage
//!
//! ```rust,no_run
//! use depot_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientConfig::default();
//!     let service = GatewayService::new("http://127.0.0.1:8700/", &client)?;
//!     let hub = Arc::new(SessionHub::new(
//!         Arc::new(service),
//!         Credentials::from_env()?,
//!         Arc::new(MemoryTokenStore::new()),
//!         Arc::new(ConsoleAuthenticator),
//!     ));
//!     let cdn = Arc::new(HttpCdnClient::new(&client)?);
//!     let engine = ContentEngine::new(hub, cdn, DownloaderConfig::default())?;
//!
//!     let identifier = ContentIdentifier::new(10, 1, ["public"]);
//!     for version in engine.resolve(&identifier).await? {
//!         engine.materialize(Path::new("./output/public"), &version).await?;
//!     }
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Engine components
pub use crate::app::{
    CdnClient, ChunkProgress, ChunkedDownloader, ClientConfig, ContentEngine, ContentIdentifier,
    ContentService, ContentVersion, DownloadSummary, DownloaderConfig, GatewayService,
    HttpCdnClient, Manifest, ServerEndpoint, SessionHub, UpdateWatcher, VersionResolver,
    WatchConfig,
};

// Authentication
pub use crate::auth::{
    get_auth_status, AuthStatus, Authenticator, ConsoleAuthenticator, Credentials,
    FileTokenStore, MemoryTokenStore, TokenStore,
};

// Commonly used constants
pub use crate::constants::{
    DEFAULT_RATE_LIMIT_RPS, DEFAULT_WORKER_COUNT, ENV_PASSWORD, ENV_USERNAME, USER_AGENT,
};

pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client = ClientConfig::default();
        let _downloader = DownloaderConfig::default();
        let _watch = WatchConfig::default();
        let _status = get_auth_status();

        assert_eq!(DEFAULT_WORKER_COUNT, 12);
        assert!(USER_AGENT.contains("Depot-Fetcher"));
    }

    #[tokio::test]
    async fn test_memory_token_store_via_prelude() {
        let store = MemoryTokenStore::new();
        store.save_token("alice", "token-1").await.unwrap();
        assert_eq!(
            store.get_token("alice").await.unwrap().as_deref(),
            Some("token-1")
        );
    }
}
