//! CDN transport and payload codec
//!
//! [`CdnClient`] moves raw bytes; [`codec`] turns them into chunk data and
//! manifest documents.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;

use crate::app::models::{ChunkId, ServerEndpoint};
use crate::errors::CdnResult;

pub use codec::{adler32, decode_chunk, encode_chunk, unzip_payload, zip_payload};
pub use config::ClientConfig;
pub use crypto::{symmetric_decrypt, symmetric_encrypt};
pub use http::{HttpCdnClient, HttpHandler};

/// Raw payload transport to CDN servers
#[async_trait]
pub trait CdnClient: Send + Sync {
    /// Download the encoded manifest for a depot version
    async fn download_manifest(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        manifest_id: u64,
        request_code: u64,
    ) -> CdnResult<Bytes>;

    /// Download one encoded chunk
    async fn download_chunk(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        chunk_id: &ChunkId,
    ) -> CdnResult<Bytes>;
}
