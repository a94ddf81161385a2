//! Manifest acquisition with server failover

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::cdn::CdnClient;
use crate::app::manifest::wire::decode_manifest;
use crate::app::models::{ContentVersion, DepotKey, Manifest, ServerEndpoint};
use crate::app::session::SessionHub;
use crate::errors::{CdnError, CdnResult, ManifestError, ManifestResult};

/// Fetches and decodes manifests, trying servers in order
pub struct ManifestFetcher {
    hub: Arc<SessionHub>,
    cdn: Arc<dyn CdnClient>,
}

impl ManifestFetcher {
    pub fn new(hub: Arc<SessionHub>, cdn: Arc<dyn CdnClient>) -> Self {
        Self { hub, cdn }
    }

    /// Fetch the manifest for `version` from the first server that delivers it
    ///
    /// The server list is not re-queried; if every server fails the caller
    /// has to restart the whole operation.
    pub async fn fetch(
        &self,
        version: &ContentVersion,
        servers: &[ServerEndpoint],
    ) -> ManifestResult<Manifest> {
        let session = self
            .hub
            .get_or_create_connection()
            .await
            .map_err(|source| ManifestError::RequestCode {
                manifest_id: version.manifest_id,
                source,
            })?;

        let request_code = session
            .manifest_request_code(
                version.depot_id,
                version.app_id,
                version.manifest_id,
                &version.branch,
            )
            .await
            .map_err(|source| ManifestError::RequestCode {
                manifest_id: version.manifest_id,
                source,
            })?;

        let key = session
            .depot_key(version.depot_id, version.app_id)
            .await
            .map_err(|source| ManifestError::DepotKey {
                depot_id: version.depot_id,
                source,
            })?;

        for (index, server) in servers.iter().enumerate() {
            match self.fetch_from(server, version, request_code, &key).await {
                Ok(manifest) => {
                    info!(
                        "Fetched manifest {} ({} files) from {}",
                        version.manifest_id,
                        manifest.files.len(),
                        server
                    );
                    return Ok(manifest);
                }
                Err(e) => warn!(
                    "Manifest {} from {} failed ({}/{}): {}",
                    version.manifest_id,
                    server,
                    index + 1,
                    servers.len(),
                    e
                ),
            }
        }

        Err(ManifestError::Unavailable {
            depot_id: version.depot_id,
            manifest_id: version.manifest_id,
            attempts: servers.len(),
        })
    }

    async fn fetch_from(
        &self,
        server: &ServerEndpoint,
        version: &ContentVersion,
        request_code: u64,
        key: &DepotKey,
    ) -> CdnResult<Manifest> {
        debug!("Requesting manifest {} from {}", version.manifest_id, server);
        let payload = self
            .cdn
            .download_manifest(server, version.depot_id, version.manifest_id, request_code)
            .await?;
        let manifest = decode_manifest(&payload, key)?;

        if manifest.manifest_id != version.manifest_id || manifest.depot_id != version.depot_id {
            return Err(CdnError::MalformedManifest {
                reason: format!(
                    "server returned depot {} manifest {}",
                    manifest.depot_id, manifest.manifest_id
                ),
            });
        }
        Ok(manifest)
    }
}
