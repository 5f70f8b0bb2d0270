//! The backing-stream abstraction.
//!
//! The [`BackingStream`] trait lets the run table and the read path work
//! with any byte source: container streams, the block-cache decorator, or
//! test fakes.

use crate::error::{PhysmapError, PhysmapResult};
use aff4::Stream;
use std::sync::Arc;

/// A shared handle to a backing stream. Several runs may reference the
/// same stream.
pub type StreamHandle = Arc<dyn BackingStream>;

/// Read access to one backing byte source.
pub trait BackingStream: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: usize) -> PhysmapResult<Vec<u8>>;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// The stream's URN, used in diagnostics and `describe` output.
    fn urn(&self) -> &str;
}

/// A container stream serving as a backing stream.
pub struct VolumeStream {
    stream: Stream,
}

impl VolumeStream {
    pub fn new(stream: Stream) -> Self {
        VolumeStream { stream }
    }
}

impl BackingStream for VolumeStream {
    fn read(&self, offset: u64, length: usize) -> PhysmapResult<Vec<u8>> {
        self.stream
            .read(offset, length)
            .map_err(|e| PhysmapError::read(offset, self.stream.urn(), e))
    }

    fn size(&self) -> u64 {
        self.stream.size()
    }

    fn urn(&self) -> &str {
        self.stream.urn()
    }
}
