//! Content-addressed block storage
//!
//! Blocks are opaque encrypted bytes stored under their BLAKE3 address.
//! A [`Store`] adds a read-through cache in front of any [`BlockStore`]
//! backend.

mod cache;
mod file_store;
#[cfg(feature = "http")]
mod http;
mod memory;
mod resolver;

use crate::model::Address;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use cache::{BlockCache, Store, StoreOptions, DEFAULT_CACHE_CAPACITY};
pub use file_store::FileStore;
#[cfg(feature = "http")]
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use resolver::{UrlResolver, UrlTemplate, ADDRESS_PLACEHOLDER};

/// A backend that persists blocks by address
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a block, returns its address
    async fn put(&self, block: Bytes) -> Result<Address>;

    /// Retrieve a block; `Error::NotFound` if absent
    async fn get(&self, address: &Address) -> Result<Bytes>;

    /// Check if a block exists
    async fn contains(&self, address: &Address) -> Result<bool>;

    /// Ask the backend to retain a block
    async fn pin(&self, _address: &Address) -> Result<()> {
        Ok(())
    }

    /// Make written blocks durable
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
