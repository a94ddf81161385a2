//! HTTP transport for CDN servers with rate limiting

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::app::cdn::config::ClientConfig;
use crate::app::cdn::CdnClient;
use crate::app::models::{ChunkId, ServerEndpoint};
use crate::constants::format;
use crate::errors::{CdnError, CdnResult};

/// Rate-limited GET requests
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHandler {
    /// Creates a new HttpHandler; `None` when the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> Option<Self> {
        let quota = Quota::per_second(NonZeroU32::new(rate_limit_rps)?);
        Some(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch a URL and return its body; any non-success status is an error
    pub async fn get_bytes(&self, url: &Url) -> CdnResult<Bytes> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CdnError::ServerError {
                host: url.host_str().unwrap_or_default().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// CDN client talking HTTP to depot servers
///
/// Each call makes exactly one request; retrying across servers is the
/// caller's job.
#[derive(Debug)]
pub struct HttpCdnClient {
    http: HttpHandler,
    scheme: String,
}

impl HttpCdnClient {
    pub fn new(config: &ClientConfig) -> CdnResult<Self> {
        let client = config.build_http_client()?;
        let http = HttpHandler::new(client, config.rate_limit_rps).ok_or_else(|| {
            CdnError::Configuration("rate limit must be non-zero".to_string())
        })?;
        Ok(Self {
            http,
            scheme: config.cdn_scheme.clone(),
        })
    }

    fn build_url(&self, server: &ServerEndpoint, path: &str) -> CdnResult<Url> {
        let raw = format!("{}://{}/{}", self.scheme, server.host, path);
        Url::parse(&raw).map_err(|e| CdnError::InvalidUrl {
            url: raw,
            error: e.to_string(),
        })
    }

    pub fn manifest_url(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        manifest_id: u64,
        request_code: u64,
    ) -> CdnResult<Url> {
        self.build_url(
            server,
            &format!(
                "depot/{}/manifest/{}/{}/{}",
                depot_id,
                manifest_id,
                format::MANIFEST_VERSION,
                request_code
            ),
        )
    }

    pub fn chunk_url(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        chunk_id: &ChunkId,
    ) -> CdnResult<Url> {
        self.build_url(server, &format!("depot/{}/chunk/{}", depot_id, chunk_id))
    }
}

#[async_trait]
impl CdnClient for HttpCdnClient {
    async fn download_manifest(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        manifest_id: u64,
        request_code: u64,
    ) -> CdnResult<Bytes> {
        let url = self.manifest_url(server, depot_id, manifest_id, request_code)?;
        self.http.get_bytes(&url).await
    }

    async fn download_chunk(
        &self,
        server: &ServerEndpoint,
        depot_id: u32,
        chunk_id: &ChunkId,
    ) -> CdnResult<Bytes> {
        let url = self.chunk_url(server, depot_id, chunk_id)?;
        self.http.get_bytes(&url).await
    }
}
