//! Read-through block cache.
//!
//! [`CachedStream`] wraps any [`BackingStream`] behind the same trait, so
//! the run table and read path are oblivious to whether a stream is
//! cached. Fetches are whole blocks regardless of the requested span,
//! keeping the cache grain uniform.

use crate::error::PhysmapResult;
use crate::stream::{BackingStream, StreamHandle};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache block size in bytes.
pub const BLOCK_SIZE: u64 = 32 * 1024;

/// Default block-count budget per cached stream.
pub const DEFAULT_CACHE_BLOCKS: usize = 1024;

/// A block-caching decorator over a backing stream.
pub struct CachedStream {
    inner: StreamHandle,
    blocks: Mutex<LruCache<u64, Arc<Vec<u8>>>>,
}

impl CachedStream {
    /// Wrap `inner` with the default block budget.
    pub fn new(inner: StreamHandle) -> CachedStream {
        Self::with_capacity(inner, DEFAULT_CACHE_BLOCKS)
    }

    /// Wrap `inner`, keeping at most `capacity` blocks resident.
    pub fn with_capacity(inner: StreamHandle, capacity: usize) -> CachedStream {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(DEFAULT_CACHE_BLOCKS).unwrap());
        CachedStream {
            inner,
            blocks: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a block, from cache or the inner stream.
    fn block(&self, index: u64) -> PhysmapResult<Arc<Vec<u8>>> {
        {
            let mut blocks = self.blocks.lock();
            if let Some(cached) = blocks.get(&index) {
                return Ok(cached.clone());
            }
        }

        // Not held across the inner read; a racing fetch of the same block
        // just populates the entry twice.
        let data = Arc::new(self.inner.read(index * BLOCK_SIZE, BLOCK_SIZE as usize)?);
        let mut blocks = self.blocks.lock();
        blocks.put(index, data.clone());
        Ok(data)
    }
}

impl BackingStream for CachedStream {
    fn read(&self, offset: u64, length: usize) -> PhysmapResult<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        let mut pos = offset;
        let mut remaining = length;

        while remaining > 0 {
            let index = pos / BLOCK_SIZE;
            let block_offset = (pos % BLOCK_SIZE) as usize;
            let chunk = (BLOCK_SIZE as usize - block_offset).min(remaining);
            let block = self.block(index)?;
            out.extend_from_slice(&block[block_offset..block_offset + chunk]);
            pos += chunk as u64;
            remaining -= chunk;
        }

        Ok(out)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn urn(&self) -> &str {
        self.inner.urn()
    }
}
