//! X25519 key material
//!
//! The same key type serves both the authenticated public-key mode (a box
//! key pair) and key exchange (an exchange key pair). Accounts keep one of
//! each and publish both public halves.

use std::fmt;

use crate::{Error, Result};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret};

/// Size of an X25519 key in bytes
pub const KEY_SIZE: usize = 32;

pub(crate) fn random_bytes() -> Result<[u8; KEY_SIZE]> {
    let mut buff = [0u8; KEY_SIZE];
    getrandom::getrandom(&mut buff).map_err(|e| Error::Key(format!("rng failure: {e}")))?;
    Ok(buff)
}

fn decode_hex(hex: &str) -> Result<[u8; KEY_SIZE]> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut buff = [0u8; KEY_SIZE];
    hex::decode_to_slice(hex, &mut buff).map_err(|e| Error::Key(format!("key hex decode: {e}")))?;
    Ok(buff)
}

/// Public half of an X25519 key pair
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Parse from hex; a "0x" prefix is accepted
    pub fn from_hex(hex: &str) -> Result<Self> {
        decode_hex(hex).map(PublicKey)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn to_x25519(self) -> XPublicKey {
        XPublicKey::from(self.0)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = Error;
    fn try_from(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::Key(format!(
                "invalid public key size, expected {}, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(PublicKey(arr))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..10])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Secret half of an X25519 key pair
#[derive(Clone)]
pub struct SecretKey(StaticSecret);

impl SecretKey {
    /// Generate a new random secret key
    pub fn generate() -> Result<Self> {
        Ok(Self::from_bytes(random_bytes()?))
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        SecretKey(StaticSecret::from(bytes))
    }

    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        decode_hex(hex).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Derive the public key
    pub fn public(&self) -> PublicKey {
        PublicKey(XPublicKey::from(&self.0).to_bytes())
    }

    /// X25519 agreement with a peer's public key
    ///
    /// Rejects non-contributory results, which only a low-order peer key
    /// can produce.
    pub(crate) fn agree(&self, peer: &PublicKey) -> Result<[u8; KEY_SIZE]> {
        let shared = self.0.diffie_hellman(&peer.to_x25519());
        if !shared.was_contributory() {
            return Err(Error::Key(format!(
                "non-contributory key agreement with {:?}",
                peer
            )));
        }
        Ok(*shared.as_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({:?})", self.public())
    }
}

/// A secret key with its public key
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Result<Self> {
        Ok(Self::from_secret(SecretKey::generate()?))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public();
        KeyPair { secret, public }
    }
}

/// A 256-bit symmetric key for shared-mode encryption
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; KEY_SIZE]);

impl SharedKey {
    pub fn generate() -> Result<Self> {
        random_bytes().map(SharedKey)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        SharedKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        decode_hex(hex).map(SharedKey)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let pair = KeyPair::generate().unwrap();

        let secret = SecretKey::from_hex(&pair.secret.to_hex()).unwrap();
        assert_eq!(secret.public(), pair.public);

        let public = PublicKey::from_hex(&format!("0x{}", pair.public.to_hex())).unwrap();
        assert_eq!(public, pair.public);
    }

    #[test]
    fn test_agreement_is_symmetric() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();

        let ab = alice.secret.agree(&bob.public).unwrap();
        let ba = bob.secret.agree(&alice.public).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_low_order_key_rejected() {
        let alice = KeyPair::generate().unwrap();
        let zero = PublicKey::from_bytes([0u8; KEY_SIZE]);
        assert!(alice.secret.agree(&zero).is_err());
    }

    #[test]
    fn test_bad_key_length() {
        assert!(PublicKey::try_from(&[1u8; 16][..]).is_err());
        assert!(SecretKey::from_hex("abcd").is_err());
    }
}
