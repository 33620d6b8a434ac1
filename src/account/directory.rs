//! Published public keys

use super::AccountId;
use crate::crypto::PublicKey;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Directory entry holding an account's box public key
pub const BOX_ENTRY: &str = "libsodium_box_pk";
/// Directory entry holding an account's key-exchange public key
pub const EXCHANGE_ENTRY: &str = "libsodium_kx_pk";

/// Where accounts publish named public keys for others to look up
#[async_trait]
pub trait Directory: Send + Sync {
    async fn publish(&self, account: &AccountId, entry: &str, key: PublicKey) -> Result<()>;

    /// `Error::NotFound` when the account has not published `entry`
    async fn lookup(&self, account: &AccountId, entry: &str) -> Result<PublicKey>;
}

#[derive(Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<(AccountId, String), PublicKey>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn publish(&self, account: &AccountId, entry: &str, key: PublicKey) -> Result<()> {
        self.entries
            .write()
            .insert((account.clone(), entry.to_string()), key);
        Ok(())
    }

    async fn lookup(&self, account: &AccountId, entry: &str) -> Result<PublicKey> {
        self.entries
            .read()
            .get(&(account.clone(), entry.to_string()))
            .copied()
            .ok_or_else(|| Error::NotFound(format!("{} for account {}", entry, account)))
    }
}
