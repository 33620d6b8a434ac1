//! In-memory block store

use super::BlockStore;
use crate::model::Address;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Blocks held in a `HashMap`, for tests and throwaway graphs
#[derive(Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Address, Bytes>>,
    pinned: RwLock<HashSet<Address>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blocks in the store
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    pub fn is_pinned(&self, address: &Address) -> bool {
        self.pinned.read().contains(address)
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, block: Bytes) -> Result<Address> {
        let address = Address::digest(&block);
        self.blocks.write().entry(address).or_insert(block);
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Bytes> {
        self.blocks
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| Error::NotFound(address.to_hex()))
    }

    async fn contains(&self, address: &Address) -> Result<bool> {
        Ok(self.blocks.read().contains_key(address))
    }

    async fn pin(&self, address: &Address) -> Result<()> {
        if !self.blocks.read().contains_key(address) {
            return Err(Error::NotFound(address.to_hex()));
        }
        self.pinned.write().insert(*address);
        Ok(())
    }
}
