//! Key sets: the key material supplied with each graph operation

use super::keys::{PublicKey, SecretKey, SharedKey, KEY_SIZE};
use crate::Result;
use std::fmt;

const ASYMMETRIC_CONTEXT: &str = "colgraph 2024-06 asymmetric node key";

/// Which family of keys sealed a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMode {
    Asymmetric,
    Shared,
}

impl KeyMode {
    pub fn as_byte(&self) -> u8 {
        match self {
            KeyMode::Asymmetric => 0,
            KeyMode::Shared => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(KeyMode::Asymmetric),
            1 => Some(KeyMode::Shared),
            _ => None,
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Asymmetric => f.write_str("asymmetric"),
            KeyMode::Shared => f.write_str("shared"),
        }
    }
}

/// Key material for one operation
///
/// In the asymmetric modes `writer` is always the sender and `reader` the
/// recipient. A sender seals with `{reader: recipient public, writer: own
/// secret}`; the recipient opens with `{reader: own secret, writer: sender
/// public}`. Both sides derive the same cipher key, bound to the direction
/// of the message, so either variant also reads what it wrote.
#[derive(Clone, Debug)]
pub enum KeySet {
    /// Writing side of the public-key mode
    Sealing { reader: PublicKey, writer: SecretKey },
    /// Reading side of the public-key mode
    Opening { reader: SecretKey, writer: PublicKey },
    /// Pre-shared or exchange-derived symmetric key
    Shared { shared: SharedKey },
}

impl KeySet {
    pub fn sealing(reader: PublicKey, writer: SecretKey) -> Self {
        KeySet::Sealing { reader, writer }
    }

    pub fn opening(reader: SecretKey, writer: PublicKey) -> Self {
        KeySet::Opening { reader, writer }
    }

    pub fn shared(shared: SharedKey) -> Self {
        KeySet::Shared { shared }
    }

    /// Keys for a graph encrypted to oneself
    pub fn own(secret: &SecretKey) -> Self {
        KeySet::Sealing {
            reader: secret.public(),
            writer: secret.clone(),
        }
    }

    pub fn mode(&self) -> KeyMode {
        match self {
            KeySet::Sealing { .. } | KeySet::Opening { .. } => KeyMode::Asymmetric,
            KeySet::Shared { .. } => KeyMode::Shared,
        }
    }

    /// The symmetric cipher key these keys resolve to
    pub(crate) fn cipher_key(&self) -> Result<[u8; KEY_SIZE]> {
        match self {
            KeySet::Shared { shared } => Ok(*shared.as_bytes()),
            KeySet::Sealing { reader, writer } => {
                let agreed = writer.agree(reader)?;
                Ok(direction_key(&agreed, &writer.public(), reader))
            }
            KeySet::Opening { reader, writer } => {
                let agreed = reader.agree(writer)?;
                Ok(direction_key(&agreed, writer, &reader.public()))
            }
        }
    }
}

fn direction_key(agreed: &[u8; KEY_SIZE], sender: &PublicKey, recipient: &PublicKey) -> [u8; KEY_SIZE] {
    let mut material = Vec::with_capacity(KEY_SIZE * 3);
    material.extend_from_slice(agreed);
    material.extend_from_slice(sender.as_bytes());
    material.extend_from_slice(recipient.as_bytes());
    blake3::derive_key(ASYMMETRIC_CONTEXT, &material)
}
