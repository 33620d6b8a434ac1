//! Read-through block cache in front of a backend

use super::BlockStore;
use crate::model::Address;
use crate::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of cached blocks
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Behaviour switches for a [`Store`]
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Serve reads from the cache; `false` forces every read to the backend
    pub read_from_cache: bool,
    /// Pin each block on the backend after writing it
    pub pin_on_write: bool,
    /// Maximum number of cached blocks
    pub cache_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            read_from_cache: true,
            pin_on_write: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

struct CacheState {
    blocks: HashMap<Address, Bytes>,
    order: VecDeque<Address>,
}

/// A bounded block cache that evicts the oldest insertion first
pub struct BlockCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        BlockCache {
            capacity,
            state: Mutex::new(CacheState {
                blocks: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, address: &Address) -> Option<Bytes> {
        self.state.lock().blocks.get(address).cloned()
    }

    pub fn insert(&self, address: Address, block: Bytes) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        if state.blocks.insert(address, block).is_some() {
            return;
        }
        state.order.push_back(address);
        while state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.blocks.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.blocks.clear();
        state.order.clear();
    }
}

/// The store a graph talks to: a backend, a cache and the options
pub struct Store {
    backend: Arc<dyn BlockStore>,
    cache: BlockCache,
    options: StoreOptions,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Store {
    pub fn new(backend: Arc<dyn BlockStore>, options: StoreOptions) -> Self {
        Store {
            backend,
            cache: BlockCache::new(options.cache_capacity),
            options,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// An in-memory store with default options
    pub fn memory() -> Self {
        Self::new(Arc::new(super::MemoryStore::new()), StoreOptions::default())
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<dyn BlockStore> {
        &self.backend
    }

    /// Write a block to the backend, pin it if configured, then cache it
    pub async fn put(&self, block: Bytes) -> Result<Address> {
        let address = self.backend.put(block.clone()).await?;
        if self.options.pin_on_write {
            self.backend.pin(&address).await?;
        }
        self.cache.insert(address, block);
        Ok(address)
    }

    /// Read a block, from the cache when allowed
    pub async fn get(&self, address: &Address) -> Result<Bytes> {
        if self.options.read_from_cache {
            if let Some(block) = self.cache.get(address) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(address = %address.short(), "cache hit");
                return Ok(block);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(address = %address.short(), "reading from backend");
        let block = self.backend.get(address).await?;
        self.cache.insert(*address, block.clone());
        Ok(block)
    }

    pub async fn contains(&self, address: &Address) -> Result<bool> {
        if self.options.read_from_cache && self.cache.get(address).is_some() {
            return Ok(true);
        }
        self.backend.contains(address).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    /// (cache hits, backend reads) since construction
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Error;

    #[test]
    fn test_cache_eviction() {
        let cache = BlockCache::new(2);
        let a = Address::digest(b"a");
        let b = Address::digest(b"b");
        let c = Address::digest(b"c");

        cache.insert(a, Bytes::from_static(b"a"));
        cache.insert(b, Bytes::from_static(b"b"));
        cache.insert(c, Bytes::from_static(b"c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[tokio::test]
    async fn test_read_through() {
        let backend = Arc::new(MemoryStore::new());
        let address = backend.put(Bytes::from_static(b"remote")).await.unwrap();
        let store = Store::new(backend, StoreOptions::default());

        store.get(&address).await.unwrap();
        store.get(&address).await.unwrap();
        assert_eq!(store.stats(), (1, 1));
    }

    #[tokio::test]
    async fn test_cache_bypass() {
        let options = StoreOptions {
            read_from_cache: false,
            ..Default::default()
        };
        let store = Store::new(Arc::new(MemoryStore::new()), options);
        let address = store.put(Bytes::from_static(b"block")).await.unwrap();

        store.get(&address).await.unwrap();
        store.get(&address).await.unwrap();
        assert_eq!(store.stats(), (0, 2));
    }

    #[tokio::test]
    async fn test_pin_on_write() {
        let backend = Arc::new(MemoryStore::new());
        let options = StoreOptions {
            pin_on_write: true,
            ..Default::default()
        };
        let store = Store::new(backend.clone(), options);
        let address = store.put(Bytes::from_static(b"pinned")).await.unwrap();
        assert!(backend.is_pinned(&address));
    }

    #[tokio::test]
    async fn test_not_found() {
        let store = Store::memory();
        let missing = Address::digest(b"missing");
        assert!(matches!(store.get(&missing).await, Err(Error::NotFound(_))));
    }
}
