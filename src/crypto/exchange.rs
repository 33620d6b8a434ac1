//! Key exchange: derive a receive/transmit key pair with a peer
//!
//! Both parties compute the same X25519 result from their exchange key
//! pair and the other's published public key. The bytewise lower public key
//! plays the client role; 64 bytes of key material are split so that the
//! client transmits on the second half and the server on the first. One
//! party's `tx` is therefore always the other's `rx`.

use super::keys::{KeyPair, PublicKey, SharedKey, KEY_SIZE};
use crate::Result;

const EXCHANGE_CONTEXT: &str = "colgraph 2024-06 session keys";

/// Session keys shared with one peer
#[derive(Clone, Debug)]
pub struct SessionKeys {
    /// Key for data the peer wrote
    pub rx: SharedKey,
    /// Key for data written to the peer
    pub tx: SharedKey,
}

impl KeyPair {
    /// Derive session keys with `peer`
    ///
    /// Exchanging with one's own public key yields `rx == tx`.
    pub fn session_keys(&self, peer: &PublicKey) -> Result<SessionKeys> {
        let agreed = self.secret.agree(peer)?;
        let is_client = self.public <= *peer;
        let (client, server) = if is_client {
            (&self.public, peer)
        } else {
            (peer, &self.public)
        };

        let mut hasher = blake3::Hasher::new_derive_key(EXCHANGE_CONTEXT);
        hasher.update(&agreed);
        hasher.update(client.as_bytes());
        hasher.update(server.as_bytes());
        let mut okm = [0u8; KEY_SIZE * 2];
        hasher.finalize_xof().fill(&mut okm);

        let mut first = [0u8; KEY_SIZE];
        let mut second = [0u8; KEY_SIZE];
        first.copy_from_slice(&okm[..KEY_SIZE]);
        second.copy_from_slice(&okm[KEY_SIZE..]);

        if self.public == *peer {
            return Ok(SessionKeys {
                rx: SharedKey::from_bytes(first),
                tx: SharedKey::from_bytes(first),
            });
        }

        let (rx, tx) = if is_client {
            (first, second)
        } else {
            (second, first)
        };
        Ok(SessionKeys {
            rx: SharedKey::from_bytes(rx),
            tx: SharedKey::from_bytes(tx),
        })
    }
}
