//! Record of versions already downloaded
//!
//! The watcher skips a branch whose live manifest matches the latest one
//! recorded for the same app, depot and branch. Only that latest entry is
//! kept per key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::ContentVersion;
use crate::errors::{LedgerError, LedgerResult};

/// One downloaded version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: ContentVersion,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence of seen versions
#[async_trait]
pub trait VersionLedger: Send + Sync {
    /// Most recently recorded manifest id for a branch of one depot
    async fn latest(&self, app_id: u32, depot_id: u32, branch: &str) -> LedgerResult<Option<u64>>;

    async fn record(&self, version: &ContentVersion) -> LedgerResult<()>;
}

/// Ledger kept in a JSON file, one entry per app, depot and branch
#[derive(Debug)]
pub struct JsonLedger {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded entries, least recently updated first
    pub async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(LedgerError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl VersionLedger for JsonLedger {
    async fn latest(
        &self,
        app_id: u32,
        depot_id: u32,
        branch: &str,
    ) -> LedgerResult<Option<u64>> {
        let entries = self.entries().await?;
        Ok(entries
            .iter()
            .rev()
            .find(|entry| same_key(&entry.version, app_id, depot_id, branch))
            .map(|entry| entry.version.manifest_id))
    }

    async fn record(&self, version: &ContentVersion) -> LedgerResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.entries().await?;
        entries.retain(|entry| {
            !same_key(&entry.version, version.app_id, version.depot_id, &version.branch)
        });
        entries.push(LedgerEntry {
            version: version.clone(),
            recorded_at: Utc::now(),
        });

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let contents = serde_json::to_vec_pretty(&entries)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(io_err)
    }
}

fn same_key(version: &ContentVersion, app_id: u32, depot_id: u32, branch: &str) -> bool {
    version.app_id == app_id && version.depot_id == depot_id && version.branch == branch
}

/// Ledger held in memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    latest: parking_lot::Mutex<HashMap<(u32, u32, String), u64>>,
}

#[async_trait]
impl VersionLedger for MemoryLedger {
    async fn latest(
        &self,
        app_id: u32,
        depot_id: u32,
        branch: &str,
    ) -> LedgerResult<Option<u64>> {
        Ok(self
            .latest
            .lock()
            .get(&(app_id, depot_id, branch.to_string()))
            .copied())
    }

    async fn record(&self, version: &ContentVersion) -> LedgerResult<()> {
        self.latest.lock().insert(
            (version.app_id, version.depot_id, version.branch.clone()),
            version.manifest_id,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_ledger_latest_per_branch() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = JsonLedger::new(temp_dir.path().join("state").join("versions.json"));

        assert_eq!(ledger.latest(10, 1, "public").await.unwrap(), None);

        ledger
            .record(&ContentVersion::new(10, 1, "public", 555))
            .await
            .unwrap();
        ledger
            .record(&ContentVersion::new(10, 1, "beta", 600))
            .await
            .unwrap();
        ledger
            .record(&ContentVersion::new(10, 1, "public", 556))
            .await
            .unwrap();

        assert_eq!(ledger.latest(10, 1, "public").await.unwrap(), Some(556));
        assert_eq!(ledger.latest(10, 1, "beta").await.unwrap(), Some(600));
        assert_eq!(ledger.entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_json_ledger_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("versions.json");
        std::fs::write(&path, "{").unwrap();

        let ledger = JsonLedger::new(&path);
        assert!(matches!(
            ledger.latest(10, 1, "public").await,
            Err(LedgerError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_ledger() {
        let ledger = MemoryLedger::default();
        ledger
            .record(&ContentVersion::new(10, 1, "public", 1))
            .await
            .unwrap();
        assert_eq!(ledger.latest(10, 1, "public").await.unwrap(), Some(1));
        assert_eq!(ledger.latest(10, 1, "beta").await.unwrap(), None);
        assert_eq!(ledger.latest(10, 2, "public").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_ledger_keys_by_depot() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = JsonLedger::new(temp_dir.path().join("versions.json"));

        ledger
            .record(&ContentVersion::new(10, 1, "public", 555))
            .await
            .unwrap();
        ledger
            .record(&ContentVersion::new(10, 2, "public", 900))
            .await
            .unwrap();
        ledger
            .record(&ContentVersion::new(20, 1, "public", 42))
            .await
            .unwrap();

        assert_eq!(ledger.latest(10, 1, "public").await.unwrap(), Some(555));
        assert_eq!(ledger.latest(10, 2, "public").await.unwrap(), Some(900));
        assert_eq!(ledger.latest(20, 1, "public").await.unwrap(), Some(42));
        assert_eq!(ledger.latest(20, 2, "public").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_ledger_keeps_latest_entry_only() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = JsonLedger::new(temp_dir.path().join("versions.json"));

        for manifest_id in 1..=5 {
            ledger
                .record(&ContentVersion::new(10, 1, "public", manifest_id))
                .await
                .unwrap();
        }

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version.manifest_id, 5);
    }
}
