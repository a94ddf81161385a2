//! Version resolution: which manifest is live on each branch
//!
//! Product metadata is a key-value document shaped like
//! `depots/<depot>/manifests/<branch>/gid`. Older documents store the gid
//! directly as `manifests/<branch>`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::keyvalue::KeyValue;
use crate::app::models::{ContentIdentifier, ContentVersion};
use crate::app::session::SessionHub;
use crate::errors::{ResolutionError, ResolutionResult, SessionError};

/// Resolves content identifiers against product metadata
pub struct VersionResolver {
    hub: Arc<SessionHub>,
}

impl VersionResolver {
    pub fn new(hub: Arc<SessionHub>) -> Self {
        Self { hub }
    }

    /// One version per requested branch that exists, in request order
    pub async fn resolve(
        &self,
        identifier: &ContentIdentifier,
    ) -> ResolutionResult<Vec<ContentVersion>> {
        let query_failed = |source: SessionError| ResolutionError::QueryFailed {
            app_id: identifier.app_id,
            source,
        };

        let session = self
            .hub
            .get_or_create_connection()
            .await
            .map_err(query_failed)?;
        let info = session
            .product_info(identifier.app_id)
            .await
            .map_err(query_failed)?
            .ok_or(ResolutionError::NoData {
                app_id: identifier.app_id,
            })?;

        let versions = extract_versions(&info, identifier)?;
        info!(
            "Resolved {} of {} branches for app {} depot {}",
            versions.len(),
            identifier.branches().len(),
            identifier.app_id,
            identifier.depot_id
        );
        Ok(versions)
    }
}

/// Pull the requested branches' manifest ids out of a metadata document
pub fn extract_versions(
    info: &KeyValue,
    identifier: &ContentIdentifier,
) -> ResolutionResult<Vec<ContentVersion>> {
    let depot_key = identifier.depot_id.to_string();
    let Some(manifests) = info.path(&["depots", &depot_key, "manifests"]) else {
        debug!(
            "App {} has no manifests for depot {}",
            identifier.app_id, identifier.depot_id
        );
        return Ok(Vec::new());
    };

    let mut versions = Vec::new();
    for branch in identifier.branches() {
        let Some(entry) = manifests.get(branch) else {
            debug!("Branch '{}' not present for depot {}", branch, depot_key);
            continue;
        };

        let gid = entry
            .as_str()
            .or_else(|| entry.get("gid").and_then(KeyValue::as_str));
        let Some(gid) = gid else {
            return Err(ResolutionError::MissingManifestId {
                depot_id: identifier.depot_id,
                branch: branch.clone(),
            });
        };

        let manifest_id = gid.trim().parse::<u64>().map_err(|_| {
            ResolutionError::MalformedManifestId {
                depot_id: identifier.depot_id,
                branch: branch.clone(),
                value: gid.to_string(),
            }
        })?;

        versions.push(ContentVersion::new(
            identifier.app_id,
            identifier.depot_id,
            branch.clone(),
            manifest_id,
        ));
    }
    Ok(versions)
}
