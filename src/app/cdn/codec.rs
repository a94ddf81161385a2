//! Chunk and manifest payload codec
//!
//! CDN payloads are single-entry PKZip archives (stored or deflate). Chunks
//! are additionally encrypted with the depot key and carry an Adler-32
//! checksum of their uncompressed bytes.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::app::cdn::crypto::{symmetric_decrypt, symmetric_encrypt};
use crate::app::models::{ChunkDescriptor, DepotKey};
use crate::constants::format::{VZIP_MAGIC, ZIP_LOCAL_HEADER_MAGIC};
use crate::errors::{CdnError, CdnResult};

const LOCAL_HEADER_LEN: usize = 30;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// Adler-32 checksum
pub fn adler32(data: &[u8]) -> u32 {
    adler2::adler32_slice(data)
}

/// Decrypt, decompress and verify a chunk against its descriptor
pub fn decode_chunk(raw: &[u8], key: &DepotKey, chunk: &ChunkDescriptor) -> CdnResult<Vec<u8>> {
    let decrypted = symmetric_decrypt(raw, key)?;
    let data = unzip_payload(&decrypted)?;

    if data.len() != chunk.uncompressed_length as usize {
        return Err(CdnError::LengthMismatch {
            expected: chunk.uncompressed_length,
            actual: data.len(),
        });
    }

    if chunk.checksum != 0 {
        let actual = adler32(&data);
        if actual != chunk.checksum {
            return Err(CdnError::ChecksumMismatch {
                expected: chunk.checksum,
                actual,
            });
        }
    }

    Ok(data)
}

/// Compress and encrypt chunk bytes the way the CDN serves them
pub fn encode_chunk(data: &[u8], key: &DepotKey) -> CdnResult<Vec<u8>> {
    let zipped = zip_payload(data, true)?;
    symmetric_encrypt(&zipped, key, rand::random())
}

/// Extract the single entry of a PKZip payload
pub fn unzip_payload(data: &[u8]) -> CdnResult<Vec<u8>> {
    if data.starts_with(&VZIP_MAGIC) {
        return Err(CdnError::UnsupportedCompression {
            magic: "VZip".to_string(),
        });
    }
    if !data.starts_with(&ZIP_LOCAL_HEADER_MAGIC) {
        let prefix = &data[..data.len().min(4)];
        return Err(CdnError::UnsupportedCompression {
            magic: hex::encode(prefix),
        });
    }
    if data.len() < LOCAL_HEADER_LEN {
        return Err(decompress_error("truncated local file header"));
    }

    let flags = read_u16(data, 6);
    let method = read_u16(data, 8);
    let expected_crc = read_u32(data, 14);
    let compressed_size = read_u32(data, 18) as usize;
    let uncompressed_size = read_u32(data, 22) as usize;
    let name_len = usize::from(read_u16(data, 26));
    let extra_len = usize::from(read_u16(data, 28));

    let start = LOCAL_HEADER_LEN + name_len + extra_len;
    if start > data.len() {
        return Err(decompress_error("entry header exceeds payload"));
    }
    let body = if flags & FLAG_DATA_DESCRIPTOR != 0 && compressed_size == 0 {
        &data[start..]
    } else {
        data.get(start..start + compressed_size)
            .ok_or_else(|| decompress_error("entry data exceeds payload"))?
    };

    let out = match method {
        METHOD_STORED => body.to_vec(),
        METHOD_DEFLATE => {
            let mut out = Vec::with_capacity(uncompressed_size);
            DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| decompress_error(&e.to_string()))?;
            out
        }
        other => {
            return Err(CdnError::UnsupportedCompression {
                magic: format!("zip method {}", other),
            })
        }
    };

    if uncompressed_size != 0 && out.len() != uncompressed_size {
        return Err(decompress_error(&format!(
            "entry inflated to {} bytes, header says {}",
            out.len(),
            uncompressed_size
        )));
    }
    if expected_crc != 0 {
        let mut crc = Crc::new();
        crc.update(&out);
        if crc.sum() != expected_crc {
            return Err(decompress_error("entry crc32 mismatch"));
        }
    }

    Ok(out)
}

/// Wrap bytes in a single-entry PKZip payload
pub fn zip_payload(data: &[u8], deflate: bool) -> CdnResult<Vec<u8>> {
    let (method, body) = if deflate {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| decompress_error(&e.to_string()))?;
        let body = encoder
            .finish()
            .map_err(|e| decompress_error(&e.to_string()))?;
        (METHOD_DEFLATE, body)
    } else {
        (METHOD_STORED, data.to_vec())
    };

    let mut crc = Crc::new();
    crc.update(data);
    let name = b"z";

    let mut out = Vec::with_capacity(LOCAL_HEADER_LEN + name.len() + body.len());
    out.extend_from_slice(&ZIP_LOCAL_HEADER_MAGIC);
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&method.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&body);
    Ok(out)
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn decompress_error(reason: &str) -> CdnError {
    CdnError::Decompress {
        reason: reason.to_string(),
    }
}
