//! Read access to a single stream inside a volume.
//!
//! A stream is either a plain image (its payload blob read verbatim) or a
//! map stream, whose declared extents scatter payload data across a sparse
//! address space of its own.

use crate::error::{Aff4Error, Aff4Result};
use crate::manifest::MapExtent;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;

/// Memory-mapped payload blob.
///
/// `mmap` is None for zero-length blobs, which cannot be mapped.
struct Payload {
    mmap: Option<Mmap>,
    len: u64,
}

impl Payload {
    fn open(path: &Path) -> Aff4Result<Payload> {
        let file = File::open(path)
            .map_err(|e| Aff4Error::io(format!("opening {}", path.display()), e))?;
        let len = file
            .metadata()
            .map_err(|e| Aff4Error::io(format!("stat {}", path.display()), e))?
            .len();

        if len == 0 {
            return Ok(Payload { mmap: None, len: 0 });
        }

        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| Aff4Error::io(format!("mapping {}", path.display()), e))?
        };
        Ok(Payload {
            mmap: Some(mmap),
            len,
        })
    }

    fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => mmap.as_ref(),
            None => &[],
        }
    }

    /// Read with zero padding past the end of the blob.
    fn read_padded(&self, offset: u64, length: usize) -> Vec<u8> {
        let data = self.as_slice();
        if offset >= self.len {
            return vec![0u8; length];
        }

        let start = offset as usize;
        let available = (self.len - offset) as usize;
        if length <= available {
            data[start..start + length].to_vec()
        } else {
            let mut out = Vec::with_capacity(length);
            out.extend_from_slice(&data[start..]);
            out.resize(length, 0);
            out
        }
    }
}

/// An open stream.
///
/// Reads are zero-padded past the end of the stream and across map gaps;
/// forensic payloads are sparse by nature and a short artifact must not
/// fail a larger read.
pub struct Stream {
    urn: String,
    payload: Payload,
    /// Map extents sorted by map_offset. Empty for image streams.
    ranges: Vec<MapExtent>,
    size: u64,
}

impl Stream {
    pub(crate) fn open(urn: String, blob: &Path, mut ranges: Vec<MapExtent>) -> Aff4Result<Stream> {
        // Zero-length extents carry no data but would shadow a real extent
        // sharing their map offset in the predecessor lookup.
        ranges.retain(|e| e.length > 0);
        for extent in &ranges {
            if extent.map_offset.checked_add(extent.length).is_none() {
                return Err(Aff4Error::manifest(
                    urn.as_str(),
                    format!(
                        "map extent at {:#x} with length {:#x} overflows",
                        extent.map_offset, extent.length
                    ),
                ));
            }
        }

        let payload = Payload::open(blob)?;
        ranges.sort_by_key(|e| e.map_offset);

        // Map streams are as large as their furthest extent; image streams
        // are as large as their payload.
        let size = ranges
            .iter()
            .map(MapExtent::map_end)
            .max()
            .unwrap_or(payload.len);

        Ok(Stream {
            urn,
            payload,
            ranges,
            size,
        })
    }

    /// The stream's URN within its volume.
    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Total addressable size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The declared map extents, in map-offset order. Empty for image
    /// streams.
    pub fn ranges(&self) -> &[MapExtent] {
        &self.ranges
    }

    /// Read `length` bytes starting at `offset`.
    pub fn read(&self, offset: u64, length: usize) -> Aff4Result<Vec<u8>> {
        if self.ranges.is_empty() {
            return Ok(self.payload.read_padded(offset, length));
        }

        let mut out = Vec::with_capacity(length);
        let mut pos = offset;
        let mut remaining = length as u64;

        while remaining > 0 {
            match self.extent_at(pos) {
                Some(extent) => {
                    let delta = pos - extent.map_offset;
                    let chunk = (extent.length - delta).min(remaining);
                    out.extend_from_slice(
                        &self
                            .payload
                            .read_padded(extent.data_offset + delta, chunk as usize),
                    );
                    pos += chunk;
                    remaining -= chunk;
                }
                None => {
                    let gap = match self.next_extent_after(pos) {
                        Some(next) => (next.map_offset - pos).min(remaining),
                        None => remaining,
                    };
                    out.resize(out.len() + gap as usize, 0);
                    pos += gap;
                    remaining -= gap;
                }
            }
        }

        Ok(out)
    }

    /// The extent covering `offset`, if any.
    fn extent_at(&self, offset: u64) -> Option<&MapExtent> {
        let idx = self.ranges.partition_point(|e| e.map_offset <= offset);
        if idx == 0 {
            return None;
        }
        let extent = &self.ranges[idx - 1];
        if offset < extent.map_end() {
            Some(extent)
        } else {
            None
        }
    }

    /// The first extent starting strictly above `offset`, if any.
    fn next_extent_after(&self, offset: u64) -> Option<&MapExtent> {
        let idx = self.ranges.partition_point(|e| e.map_offset <= offset);
        self.ranges.get(idx)
    }
}
