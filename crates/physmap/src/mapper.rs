//! On-demand overlay mapping of acquired files.
//!
//! When analysis asks where `c:\pagefile.sys` lives, the mapper places
//! that stream in free address space above everything mapped so far and
//! remembers the answer: per address space for hits and misses, and in
//! the session for assigned offsets, so repeated questions in one session
//! always get the same base.

use crate::cache::CachedStream;
use crate::filename::normalize_filename;
use crate::runs::{Run, RunTable};
use crate::session::Session;
use crate::stream::{StreamHandle, VolumeStream};
use aff4::Volume;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum gap between the mapped range's end and a fresh overlay.
const MAPPING_GAP: u64 = 0x10000;

/// Overlay bases start on a page boundary.
const PAGE_SIZE: u64 = 0x1000;

/// Maps auxiliary files into the flat address space on first touch.
pub(crate) struct OverlayMapper {
    /// normalized filename -> stream subject, built at load time
    index: HashMap<String, String>,
    /// normalized filename -> assigned base; None records a known-absent
    /// file so the container is never asked twice
    mapped: Mutex<HashMap<String, Option<u64>>>,
}

impl OverlayMapper {
    pub fn new(index: HashMap<String, String>) -> OverlayMapper {
        OverlayMapper {
            index,
            mapped: Mutex::new(HashMap::new()),
        }
    }

    /// The flat-space address of `file_offset` within `filename`, mapping
    /// the file first if this is its first touch. None when the volume
    /// does not hold the file.
    pub fn get_mapped_offset(
        &self,
        volume: &Volume,
        runs: &RwLock<RunTable>,
        session: &Session,
        filename: &str,
        file_offset: u64,
    ) -> Option<u64> {
        let key = normalize_filename(filename);

        // One critical section from miss detection through run insert:
        // concurrent first touches of the same file must not assign two
        // bases.
        let mut mapped = self.mapped.lock();
        if let Some(&cached) = mapped.get(&key) {
            return cached.map(|base| base + file_offset);
        }

        let base = self.map_file(volume, runs, session, &key);
        mapped.insert(key, base);
        base.map(|base| base + file_offset)
    }

    /// Open and place the stream behind `key`, if the index knows it.
    fn map_file(
        &self,
        volume: &Volume,
        runs: &RwLock<RunTable>,
        session: &Session,
        key: &str,
    ) -> Option<u64> {
        let subject = self.index.get(key)?;

        let stream = match volume.open_stream(subject) {
            Ok(stream) => stream,
            Err(err) => {
                // An indexed file that will not open is treated as absent.
                warn!("could not open mapped file {}: {}", subject, err);
                return None;
            }
        };
        let size = stream.size();
        let handle: StreamHandle =
            Arc::new(CachedStream::new(Arc::new(VolumeStream::new(stream))));

        let base = session.file_mapping_offset(key, || {
            align_up(runs.read().end() + MAPPING_GAP, PAGE_SIZE)
        });
        runs.write().insert(Run::new(base, 0, size, handle));
        info!("mapped {} at {:#x}", subject, base);
        Some(base)
    }
}

/// Round `value` up to a multiple of `align` (a power of two).
fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}
