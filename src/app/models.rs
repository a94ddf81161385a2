//! Data models for depot content
//!
//! Identifiers and versions are plain values created per call. A `Manifest`
//! lives for one materialization and is never cached across runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::format;

/// What to resolve: an application, one of its depots, and the branches of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdentifier {
    pub app_id: u32,
    pub depot_id: u32,
    branches: Vec<String>,
}

impl ContentIdentifier {
    /// Create an identifier, dropping duplicate branch names while keeping order
    pub fn new<I, S>(app_id: u32, depot_id: u32, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for branch in branches {
            let branch = branch.into();
            if !unique.contains(&branch) {
                unique.push(branch);
            }
        }
        Self {
            app_id,
            depot_id,
            branches: unique,
        }
    }

    /// Requested branches in caller order
    pub fn branches(&self) -> &[String] {
        &self.branches
    }
}

/// A resolved depot version: the manifest currently published on a branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentVersion {
    pub app_id: u32,
    pub depot_id: u32,
    pub branch: String,
    pub manifest_id: u64,
}

impl ContentVersion {
    pub fn new(app_id: u32, depot_id: u32, branch: impl Into<String>, manifest_id: u64) -> Self {
        Self {
            app_id,
            depot_id,
            branch: branch.into(),
            manifest_id,
        }
    }
}

impl fmt::Display for ContentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "app {} depot {} [{}] manifest {}",
            self.app_id, self.depot_id, self.branch, self.manifest_id
        )
    }
}

/// Content hash identifying a chunk on the CDN
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; format::CHUNK_ID_LEN]);

impl ChunkId {
    /// Parse a chunk id from its lowercase or uppercase hex form
    pub fn from_hex(value: &str) -> Option<Self> {
        let bytes = hex::decode(value).ok()?;
        let array: [u8; format::CHUNK_ID_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.to_hex())
    }
}

/// One chunk of a file: where its bytes land and how to verify them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub id: ChunkId,
    /// Byte position within the destination file
    pub offset: u64,
    pub compressed_length: u32,
    pub uncompressed_length: u32,
    /// Adler-32 of the uncompressed bytes; zero disables verification
    pub checksum: u32,
}

impl ChunkDescriptor {
    /// End of the byte range this chunk covers
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.uncompressed_length)
    }
}

/// A file described by a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the materialization root, already normalized
    pub path: PathBuf,
    pub total_size: u64,
    pub flags: u32,
    pub chunks: Vec<ChunkDescriptor>,
}

impl ManifestFile {
    /// Files without size or chunks are metadata-only (directories, placeholders)
    pub fn is_materializable(&self) -> bool {
        self.total_size > 0 && !self.chunks.is_empty()
    }
}

/// The file/chunk index of one depot version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub depot_id: u32,
    pub manifest_id: u64,
    pub files: Vec<ManifestFile>,
}

impl Manifest {
    /// Files that produce output on disk
    pub fn materializable_files(&self) -> impl Iterator<Item = &ManifestFile> {
        self.files.iter().filter(|file| file.is_materializable())
    }

    pub fn total_chunks(&self) -> usize {
        self.materializable_files().map(|f| f.chunks.len()).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.materializable_files()
            .flat_map(|f| f.chunks.iter())
            .map(|c| u64::from(c.uncompressed_length))
            .sum()
    }
}

/// An interchangeable CDN server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Host, optionally with a port
    pub host: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            capabilities: Vec::new(),
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Symmetric key for a depot's manifests and chunks
#[derive(Clone, PartialEq, Eq)]
pub struct DepotKey(pub [u8; format::DEPOT_KEY_LEN]);

impl DepotKey {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; format::DEPOT_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; format::DEPOT_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DepotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DepotKey(<redacted>)")
    }
}
