//! Core of the content acquisition engine
//!
//! Leaf first: [`session`] owns the authenticated connection, [`resolver`]
//! maps identifiers to live versions, [`manifest`] fetches a version's file
//! index and [`downloader`] materializes it chunk by chunk over [`cdn`].
//! [`engine`] bundles these behind one handle and [`watcher`] drives it on a
//! schedule.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use depot_fetcher::app::{ContentEngine, ContentIdentifier};
//!
//! # async fn example(engine: ContentEngine) -> Result<(), Box<dyn std::error::Error>> {
//! let identifier = ContentIdentifier::new(10, 1, ["public"]);
//! for version in engine.resolve(&identifier).await? {
//!     let summary = engine
//!         .materialize(Path::new("./output").join(&version.branch).as_path(), &version)
//!         .await?;
//!     println!("{}: {}", version, summary);
//! }
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cdn;
pub mod downloader;
pub mod engine;
pub mod keyvalue;
pub mod manifest;
pub mod models;
pub mod resolver;
pub mod session;
pub mod watcher;

pub use cdn::{CdnClient, ClientConfig, HttpCdnClient};
pub use downloader::{ChunkProgress, ChunkedDownloader, DownloadSummary, DownloaderConfig};
pub use engine::ContentEngine;
pub use keyvalue::KeyValue;
pub use manifest::ManifestFetcher;
pub use models::{
    ChunkDescriptor, ChunkId, ContentIdentifier, ContentVersion, DepotKey, Manifest,
    ManifestFile, ServerEndpoint,
};
pub use resolver::VersionResolver;
pub use session::{ContentService, GatewayService, SessionHandle, SessionHub};
pub use watcher::{CheckOutcome, JsonLedger, LogNotifier, UpdateWatcher, WatchConfig};
