//! Depot payload encryption
//!
//! Payloads are AES-256: the first block is the IV encrypted with ECB, the
//! remainder is CBC with PKCS#7 padding.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};

use crate::app::models::DepotKey;
use crate::errors::{CdnError, CdnResult};

const BLOCK_LEN: usize = 16;

/// Decrypt a depot payload with the depot key
pub fn symmetric_decrypt(data: &[u8], key: &DepotKey) -> CdnResult<Vec<u8>> {
    if data.len() < BLOCK_LEN * 2 || data.len() % BLOCK_LEN != 0 {
        return Err(CdnError::Decrypt {
            reason: format!(
                "ciphertext length {} is not a whole number of blocks",
                data.len()
            ),
        });
    }

    let cipher = cipher_for(key)?;

    let mut iv = Block::clone_from_slice(&data[..BLOCK_LEN]);
    cipher.decrypt_block(&mut iv);

    let mut plain = Vec::with_capacity(data.len() - BLOCK_LEN);
    let mut previous = iv;
    for chunk in data[BLOCK_LEN..].chunks_exact(BLOCK_LEN) {
        let mut block = Block::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (byte, prev) in block.iter_mut().zip(previous.iter()) {
            *byte ^= prev;
        }
        plain.extend_from_slice(&block);
        previous = Block::clone_from_slice(chunk);
    }

    let pad = usize::from(*plain.last().unwrap_or(&0));
    let padding_valid = pad > 0
        && pad <= BLOCK_LEN
        && plain[plain.len() - pad..]
            .iter()
            .all(|&b| usize::from(b) == pad);
    if !padding_valid {
        return Err(CdnError::Decrypt {
            reason: "invalid padding".to_string(),
        });
    }
    plain.truncate(plain.len() - pad);
    Ok(plain)
}

/// Encrypt a payload the way the CDN stores it
pub fn symmetric_encrypt(
    plain: &[u8],
    key: &DepotKey,
    iv: [u8; BLOCK_LEN],
) -> CdnResult<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut out = Vec::with_capacity(plain.len() + BLOCK_LEN * 2);
    let mut encrypted_iv = Block::clone_from_slice(&iv);
    cipher.encrypt_block(&mut encrypted_iv);
    out.extend_from_slice(&encrypted_iv);

    let pad = BLOCK_LEN - plain.len() % BLOCK_LEN;
    let mut padded = plain.to_vec();
    padded.resize(plain.len() + pad, pad as u8);

    let mut previous = Block::clone_from_slice(&iv);
    for chunk in padded.chunks_exact(BLOCK_LEN) {
        let mut block = Block::clone_from_slice(chunk);
        for (byte, prev) in block.iter_mut().zip(previous.iter()) {
            *byte ^= prev;
        }
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
        previous = block;
    }
    Ok(out)
}

fn cipher_for(key: &DepotKey) -> CdnResult<Aes256> {
    Aes256::new_from_slice(key.as_bytes()).map_err(|e| CdnError::Decrypt {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_reverses_encrypt() {
        let key = DepotKey([3; 32]);
        let plain = b"hello depot, this spans more than one block".to_vec();
        let encrypted = symmetric_encrypt(&plain, &key, [9; 16]).unwrap();

        assert_eq!(encrypted.len() % 16, 0);
        assert_ne!(&encrypted[16..16 + 16], &plain[..16]);
        assert_eq!(symmetric_decrypt(&encrypted, &key).unwrap(), plain);
    }

    #[test]
    fn test_block_aligned_plaintext_gets_full_padding_block() {
        let key = DepotKey([1; 32]);
        let encrypted = symmetric_encrypt(&[0u8; 16], &key, [0; 16]).unwrap();
        assert_eq!(encrypted.len(), 48);
        assert_eq!(symmetric_decrypt(&encrypted, &key).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_wrong_key_or_length_fails() {
        let encrypted = symmetric_encrypt(b"payload", &DepotKey([1; 32]), [5; 16]).unwrap();
        assert_ne!(
            symmetric_decrypt(&encrypted, &DepotKey([2; 32])).ok(),
            Some(b"payload".to_vec())
        );
        assert!(matches!(
            symmetric_decrypt(&encrypted[..20], &DepotKey([1; 32])),
            Err(CdnError::Decrypt { .. })
        ));
    }
}
