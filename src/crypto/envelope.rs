//! Encrypted block format
//!
//! ```text
//! [version: u8][mode: u8][nonce: 12 bytes][ChaCha20-Poly1305(zstd(body)) + tag]
//! ```
//!
//! The two header bytes are authenticated as associated data. The nonce is a
//! keyed BLAKE3 hash of the compressed plaintext, so sealing the same body
//! under the same key always yields the same block, and the same address.

use super::keyset::{KeyMode, KeySet};
use crate::{Error, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

/// Block format version
pub const ENVELOPE_VERSION: u8 = 1;
/// Size of the ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
const HEADER_SIZE: usize = 2;
const TAG_SIZE: usize = 16;
const COMPRESSION_LEVEL: i32 = 3;

/// Encrypt `plaintext` into a block
pub fn seal(keys: &KeySet, plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = keys.cipher_key()?;
    let header = [ENVELOPE_VERSION, keys.mode().as_byte()];

    let compressed = zstd::encode_all(plaintext, COMPRESSION_LEVEL)
        .map_err(|e| Error::Compression(e.to_string()))?;

    let mut hasher = blake3::Hasher::new_keyed(&key);
    hasher.update(&header);
    hasher.update(&compressed);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&hasher.finalize().as_bytes()[..NONCE_SIZE]);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &compressed,
                aad: &header,
            },
        )
        .map_err(|_| Error::Key("encrypt error".into()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Read the key mode a block was sealed with, without decrypting it
pub fn block_mode(block: &[u8]) -> Result<KeyMode> {
    if block.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(Error::Corruption(format!(
            "block too short: {} bytes",
            block.len()
        )));
    }
    if block[0] != ENVELOPE_VERSION {
        return Err(Error::VersionMismatch {
            expected: ENVELOPE_VERSION as u32,
            found: block[0] as u32,
        });
    }
    KeyMode::from_byte(block[1])
        .ok_or_else(|| Error::Corruption(format!("invalid key mode: {}", block[1])))
}

/// Decrypt a block
pub fn open(keys: &KeySet, block: &[u8]) -> Result<Vec<u8>> {
    let found = block_mode(block)?;
    if found != keys.mode() {
        return Err(Error::KeyMismatch {
            expected: keys.mode(),
            found,
        });
    }

    let key = keys.cipher_key()?;
    let (header, rest) = block.split_at(HEADER_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let compressed = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| Error::Decryption("block does not authenticate under these keys".into()))?;

    zstd::decode_all(compressed.as_slice()).map_err(|e| Error::Compression(e.to_string()))
}
