//! Single-file block store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("COLGRAPH")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - object_count: 8 bytes (u64 LE)
//!   - index_offset: 8 bytes (u64 LE)
//!   - reserved: 32 bytes
//!
//! [BLOCKS: variable]
//!   - encrypted blocks, concatenated
//!
//! [INDEX: variable]
//!   - sorted array of (address, offset, size) entries
//! ```
//!
//! The index is rewritten after the last block on every `sync` and on drop.

use super::BlockStore;
use crate::model::Address;
use crate::{Error, Result, MAGIC, VERSION};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HEADER_SIZE: u64 = 64;
// 32 address + 8 offset + 4 size
const INDEX_ENTRY_SIZE: usize = 44;

#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    offset: u64,
    size: u32,
}

fn read_u64(buf: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(arr)
}

fn read_u32(buf: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&buf[..4]);
    u32::from_le_bytes(arr)
}

struct Inner {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<HashMap<Address, IndexEntry>>,
    /// Current append position (end of blocks, start of the on-disk index)
    write_offset: Mutex<u64>,
}

impl Inner {
    fn create(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(Inner {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            index: RwLock::new(HashMap::new()),
            write_offset: Mutex::new(HEADER_SIZE),
        })
    }

    fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .map_err(|_| Error::InvalidFile("truncated header".into()))?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = read_u32(&header[8..12]);
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let object_count = read_u64(&header[16..24]);
        let index_offset = read_u64(&header[24..32]);

        let mut index = HashMap::new();
        if index_offset > 0 && object_count > 0 {
            file.seek(SeekFrom::Start(index_offset))?;
            for _ in 0..object_count {
                let mut entry = [0u8; INDEX_ENTRY_SIZE];
                file.read_exact(&mut entry)?;

                let mut address = [0u8; 32];
                address.copy_from_slice(&entry[0..32]);
                index.insert(
                    Address::from_bytes(address),
                    IndexEntry {
                        offset: read_u64(&entry[32..40]),
                        size: read_u32(&entry[40..44]),
                    },
                );
            }
        }

        let write_offset = if index_offset > 0 {
            index_offset
        } else {
            file.seek(SeekFrom::End(0))?
        };

        tracing::debug!(path = %path.display(), blocks = index.len(), "opened block file");

        Ok(Inner {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            index: RwLock::new(index),
            write_offset: Mutex::new(write_offset),
        })
    }

    fn put(&self, block: &[u8]) -> Result<Address> {
        let address = Address::digest(block);
        if self.index.read().contains_key(&address) {
            return Ok(address);
        }

        let size = u32::try_from(block.len())
            .map_err(|_| Error::Corruption(format!("block too large: {} bytes", block.len())))?;

        let offset = {
            let mut write_offset = self.write_offset.lock();
            let offset = *write_offset;

            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(block)?;

            *write_offset = offset + size as u64;
            offset
        };

        self.index
            .write()
            .insert(address, IndexEntry { offset, size });
        Ok(address)
    }

    fn get(&self, address: &Address) -> Result<Vec<u8>> {
        let entry = self
            .index
            .read()
            .get(address)
            .copied()
            .ok_or_else(|| Error::NotFound(address.to_hex()))?;

        let mut data = vec![0u8; entry.size as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut data)?;
        }

        if !address.verify(&data) {
            return Err(Error::Corruption(format!(
                "block at offset {} does not hash to {}",
                entry.offset, address
            )));
        }
        Ok(data)
    }

    fn sync(&self) -> Result<()> {
        let index = self.index.read();
        let write_offset = *self.write_offset.lock();
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(16))?;
        file.write_all(&(index.len() as u64).to_le_bytes())?;
        file.write_all(&write_offset.to_le_bytes())?;

        file.seek(SeekFrom::Start(write_offset))?;

        // Sort by address for determinism
        let mut entries: Vec<_> = index.iter().collect();
        entries.sort_by_key(|(address, _)| **address);

        for (address, entry) in entries {
            file.write_all(address.as_bytes())?;
            file.write_all(&entry.offset.to_le_bytes())?;
            file.write_all(&entry.size.to_le_bytes())?;
        }

        let end = write_offset + (index.len() * INDEX_ENTRY_SIZE) as u64;
        file.set_len(end)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Best-effort sync on drop
        if let Err(e) = self.sync() {
            tracing::warn!(path = %self.path.display(), error = %e, "block file sync on drop failed");
        }
    }
}

/// A content-addressed block store backed by a single file
///
/// File IO runs on tokio's blocking pool.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl FileStore {
    /// Create a new store file, truncating any existing one
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(FileStore {
            inner: Arc::new(Inner::create(path.as_ref())?),
        })
    }

    /// Open an existing store file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(FileStore {
            inner: Arc::new(Inner::open(path.as_ref())?),
        })
    }

    /// Open or create a store file
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Get the number of blocks in the store
    pub fn block_count(&self) -> usize {
        self.inner.index.read().len()
    }

    /// Flush the index to disk
    pub async fn sync(&self) -> Result<()> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.sync()).await?
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

#[async_trait]
impl BlockStore for FileStore {
    async fn put(&self, block: Bytes) -> Result<Address> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.put(&block)).await?
    }

    async fn get(&self, address: &Address) -> Result<Bytes> {
        let inner = self.inner.clone();
        let address = *address;
        let data = tokio::task::spawn_blocking(move || inner.get(&address)).await??;
        Ok(Bytes::from(data))
    }

    async fn contains(&self, address: &Address) -> Result<bool> {
        Ok(self.inner.index.read().contains_key(address))
    }

    async fn flush(&self) -> Result<()> {
        self.sync().await
    }
}
