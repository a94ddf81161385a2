//! Depot manifests: the file and chunk index of one version
//!
//! - [`wire`] - payload format, filename decryption and path normalization
//! - [`fetcher`] - request code, depot key and server failover

pub mod fetcher;
pub mod wire;

pub use fetcher::ManifestFetcher;
pub use wire::{decode_manifest, encode_manifest, normalize_path};
