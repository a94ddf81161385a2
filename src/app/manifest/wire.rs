//! Manifest payload format
//!
//! A manifest payload is a PKZip envelope around a JSON document:
//!
//! ```json
//! {
//!   "depot_id": 1, "gid": 555, "filenames_encrypted": true,
//!   "files": [{
//!     "filename": "<base64 ciphertext or plain path>", "size": 10, "flags": 0,
//!     "chunks": [{ "id": "<40 hex>", "checksum": 0, "offset": 0,
//!                  "compressed_length": 5, "uncompressed_length": 5 }]
//!   }]
//! }
//! ```
//!
//! Encrypted filenames use the depot payload cipher. Paths use `/` or `\`
//! and are rebuilt with the host separator.

use std::path::{Component, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::app::cdn::{symmetric_decrypt, symmetric_encrypt, unzip_payload, zip_payload};
use crate::app::models::{ChunkDescriptor, ChunkId, DepotKey, Manifest, ManifestFile};
use crate::errors::{CdnError, CdnResult};

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    depot_id: u32,
    gid: u64,
    #[serde(default)]
    filenames_encrypted: bool,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    filename: String,
    size: u64,
    #[serde(default)]
    flags: u32,
    #[serde(default)]
    chunks: Vec<ChunkEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkEntry {
    id: String,
    #[serde(default)]
    checksum: u32,
    offset: u64,
    compressed_length: u32,
    uncompressed_length: u32,
}

/// Decode a manifest payload downloaded from the CDN
pub fn decode_manifest(payload: &[u8], key: &DepotKey) -> CdnResult<Manifest> {
    let json = unzip_payload(payload)?;
    let document: ManifestDocument =
        serde_json::from_slice(&json).map_err(|e| malformed(format!("invalid document: {}", e)))?;

    let mut files = Vec::with_capacity(document.files.len());
    for entry in document.files {
        let raw_name = if document.filenames_encrypted {
            decrypt_filename(&entry.filename, key)?
        } else {
            entry.filename
        };
        let path = normalize_path(&raw_name)?;

        let mut chunks = Vec::with_capacity(entry.chunks.len());
        for chunk in entry.chunks {
            let descriptor = ChunkDescriptor {
                id: ChunkId::from_hex(&chunk.id)
                    .ok_or_else(|| malformed(format!("invalid chunk id '{}'", chunk.id)))?,
                offset: chunk.offset,
                compressed_length: chunk.compressed_length,
                uncompressed_length: chunk.uncompressed_length,
                checksum: chunk.checksum,
            };
            if descriptor.end() > entry.size {
                return Err(malformed(format!(
                    "chunk {} of {} ends at {} past file size {}",
                    descriptor.id,
                    path.display(),
                    descriptor.end(),
                    entry.size
                )));
            }
            chunks.push(descriptor);
        }

        files.push(ManifestFile {
            path,
            total_size: entry.size,
            flags: entry.flags,
            chunks,
        });
    }

    Ok(Manifest {
        depot_id: document.depot_id,
        manifest_id: document.gid,
        files,
    })
}

/// Encode a manifest the way the CDN serves it
///
/// Filenames are encrypted when a key is given.
pub fn encode_manifest(manifest: &Manifest, key: Option<&DepotKey>) -> CdnResult<Vec<u8>> {
    let mut files = Vec::with_capacity(manifest.files.len());
    for file in &manifest.files {
        let name = file.path.to_string_lossy().replace('\\', "/");
        let filename = match key {
            Some(key) => BASE64.encode(symmetric_encrypt(name.as_bytes(), key, rand::random())?),
            None => name,
        };
        files.push(FileEntry {
            filename,
            size: file.total_size,
            flags: file.flags,
            chunks: file
                .chunks
                .iter()
                .map(|c| ChunkEntry {
                    id: c.id.to_hex(),
                    checksum: c.checksum,
                    offset: c.offset,
                    compressed_length: c.compressed_length,
                    uncompressed_length: c.uncompressed_length,
                })
                .collect(),
        });
    }

    let document = ManifestDocument {
        depot_id: manifest.depot_id,
        gid: manifest.manifest_id,
        filenames_encrypted: key.is_some(),
        files,
    };
    let json = serde_json::to_vec(&document).map_err(|e| malformed(e.to_string()))?;
    zip_payload(&json, true)
}

fn decrypt_filename(encoded: &str, key: &DepotKey) -> CdnResult<String> {
    let ciphertext = BASE64
        .decode(encoded.trim())
        .map_err(|e| malformed(format!("filename is not base64: {}", e)))?;
    let plain = symmetric_decrypt(&ciphertext, key)?;
    let name = String::from_utf8(plain).map_err(|_| malformed("filename is not UTF-8".into()))?;
    Ok(name.trim_end_matches('\0').to_string())
}

/// Turn a manifest path into a relative host path
///
/// Rejects absolute paths, drive prefixes and `..` components.
pub fn normalize_path(raw: &str) -> CdnResult<PathBuf> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(malformed(format!("absolute path '{}'", raw)));
    }

    let mut path = PathBuf::new();
    for part in raw.split(|c: char| c == '/' || c == '\\') {
        match part {
            "" | "." => continue,
            ".." => return Err(malformed(format!("parent traversal in '{}'", raw))),
            _ if part.contains(':') => return Err(malformed(format!("drive prefix in '{}'", raw))),
            _ => path.push(part),
        }
    }

    let is_plain_relative = !path.as_os_str().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !is_plain_relative {
        return Err(malformed(format!("unusable path '{}'", raw)));
    }
    Ok(path)
}

fn malformed(reason: String) -> CdnError {
    CdnError::MalformedManifest { reason }
}
