//! Accounts and the message seam
//!
//! An [`Account`] holds two X25519 key pairs derived from one seed: a box
//! pair for asymmetric node encryption and an exchange pair for deriving
//! shared session keys. Public halves are published to a [`Directory`];
//! graph addresses are delivered through a [`Mailbox`] with a
//! [`MessageType`] tag that tells the reader which keys to use.

mod directory;
mod mailbox;
mod reader;

pub use directory::{Directory, MemoryDirectory, BOX_ENTRY, EXCHANGE_ENTRY};
pub use mailbox::{Mailbox, MemoryMailbox, Message, MessageType};
pub use reader::read_messages;

use crate::crypto::{random_bytes, KeyPair, KeySet, SecretKey, SessionKeys, KEY_SIZE};
use crate::model::Address;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

const BOX_CONTEXT: &str = "colgraph 2024-06 account box key";
const EXCHANGE_CONTEXT: &str = "colgraph 2024-06 account exchange key";

/// Hex BLAKE3 digest over an account's two public keys
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 7 characters, for display
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((cut, _)) => &self.0[..cut],
            None => &self.0,
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short())
    }
}

#[derive(Clone, Debug)]
pub struct Account {
    box_keys: KeyPair,
    exchange_keys: KeyPair,
}

impl Account {
    /// Derive both key pairs from a 32-byte seed
    pub fn from_seed(seed: [u8; KEY_SIZE]) -> Self {
        let box_secret = SecretKey::from_bytes(blake3::derive_key(BOX_CONTEXT, &seed));
        let exchange_secret = SecretKey::from_bytes(blake3::derive_key(EXCHANGE_CONTEXT, &seed));
        Account {
            box_keys: KeyPair::from_secret(box_secret),
            exchange_keys: KeyPair::from_secret(exchange_secret),
        }
    }

    pub fn generate() -> Result<Self> {
        Ok(Self::from_seed(random_bytes()?))
    }

    pub fn id(&self) -> AccountId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.box_keys.public.as_bytes());
        hasher.update(self.exchange_keys.public.as_bytes());
        AccountId(hasher.finalize().to_hex().to_string())
    }

    pub fn box_keys(&self) -> &KeyPair {
        &self.box_keys
    }

    pub fn exchange_keys(&self) -> &KeyPair {
        &self.exchange_keys
    }

    /// Keys for a graph only this account reads
    pub fn own_keys(&self) -> KeySet {
        KeySet::own(&self.box_keys.secret)
    }

    /// Put both public keys in the directory under this account's id
    pub async fn publish(&self, directory: &dyn Directory) -> Result<()> {
        let id = self.id();
        directory.publish(&id, BOX_ENTRY, self.box_keys.public).await?;
        directory
            .publish(&id, EXCHANGE_ENTRY, self.exchange_keys.public)
            .await?;
        tracing::debug!(account = %id.short(), "published account keys");
        Ok(())
    }

    /// Session keys with `peer`, from its published exchange key
    pub async fn shared_with(&self, directory: &dyn Directory, peer: &AccountId) -> Result<SessionKeys> {
        let peer_key = directory.lookup(peer, EXCHANGE_ENTRY).await?;
        self.exchange_keys.session_keys(&peer_key)
    }

    /// Keys to write a graph `peer` opens as a `MessageMe`
    pub async fn message_keys(&self, directory: &dyn Directory, peer: &AccountId) -> Result<KeySet> {
        let peer_box = directory.lookup(peer, BOX_ENTRY).await?;
        Ok(KeySet::sealing(peer_box, self.box_keys.secret.clone()))
    }

    /// Keys to write a graph `peer` opens as `ShareData`
    pub async fn share_keys(&self, directory: &dyn Directory, peer: &AccountId) -> Result<KeySet> {
        Ok(KeySet::shared(self.shared_with(directory, peer).await?.tx))
    }

    /// Deliver a graph address to `peer`
    pub async fn send(
        &self,
        mailbox: &dyn Mailbox,
        address: Address,
        peer: &AccountId,
        kind: MessageType,
    ) -> Result<()> {
        let message = Message {
            from: self.id(),
            to: peer.clone(),
            asset_code: kind.to_string(),
            memo: address,
        };
        tracing::debug!(to = %peer.short(), kind = %kind, memo = %address.short(), "sending message");
        mailbox.deliver(message).await
    }
}
