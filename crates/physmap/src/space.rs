//! The assembled physical address space.
//!
//! [`Aff4AddressSpace`] is the reader-facing facade: it locates and opens
//! the volume, loads the physical-memory stream into a run table, and
//! serves flat reads over it. Holes read as zeros. Acquired files such as
//! the pagefile can be mapped into free address space on demand and then
//! read through the same interface.

use crate::error::{PhysmapError, PhysmapResult};
use crate::loader::{self, LoadedImage};
use crate::mapper::OverlayMapper;
use crate::resolve::locate_volume;
use crate::runs::{Run, RunTable};
use crate::session::Session;
use crate::stream::StreamHandle;
use aff4::Volume;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// A flat physical-memory view assembled from the streams of a forensic
/// container.
pub struct Aff4AddressSpace {
    volume: Volume,
    /// The primary physical-memory stream, cache-wrapped. Runs backed by
    /// this handle render as plain physical addresses.
    image: StreamHandle,
    runs: RwLock<RunTable>,
    mapper: OverlayMapper,
    session: Arc<Session>,
}

impl Aff4AddressSpace {
    /// Open the address space at `path`.
    ///
    /// `path` may point at the volume itself or at a stream inside it;
    /// the volume boundary is found by walking the path upward. Any path
    /// remainder below the volume selects the stream explicitly, otherwise
    /// the physical-memory stream is auto-discovered.
    pub fn open(path: impl AsRef<Path>, session: &Arc<Session>) -> PhysmapResult<Aff4AddressSpace> {
        let (volume, stream_path) = locate_volume(path.as_ref())?;
        Aff4AddressSpace::with_volume(volume, stream_path.as_deref(), session)
    }

    /// Open the address space over an already-open volume.
    pub fn with_volume(
        volume: Volume,
        stream_path: Option<&str>,
        session: &Arc<Session>,
    ) -> PhysmapResult<Aff4AddressSpace> {
        let LoadedImage {
            image,
            runs,
            filenames,
        } = loader::load_physical_memory(&volume, stream_path, session)?;

        Ok(Aff4AddressSpace {
            volume,
            image,
            runs: RwLock::new(runs),
            mapper: OverlayMapper::new(filenames),
            session: Arc::clone(session),
        })
    }

    /// Read `length` bytes at `address`.
    ///
    /// The result always has exactly `length` bytes; anything not backed
    /// by a run reads as zeros.
    pub fn read(&self, address: u64, length: usize) -> PhysmapResult<Vec<u8>> {
        let end = address.checked_add(length as u64).ok_or_else(|| {
            PhysmapError::InvalidParameter(format!(
                "read of {} bytes at {:#x} overflows the address space",
                length, address
            ))
        })?;

        let mut out = Vec::with_capacity(length);
        let runs = self.runs.read();
        let mut pos = address;
        while pos < end {
            match runs.containing(pos) {
                Some(run) => {
                    let chunk = (run.end() - pos).min(end - pos);
                    let data = run.stream.read(run.translate(pos), chunk as usize)?;
                    out.extend_from_slice(&data);
                    pos += chunk;
                }
                None => {
                    // Zero-fill up to the next run, or to the end of the
                    // request when nothing follows.
                    let gap_end = runs
                        .next_after(pos)
                        .map(|run| run.start.min(end))
                        .unwrap_or(end);
                    out.resize(out.len() + (gap_end - pos) as usize, 0);
                    pos = gap_end;
                }
            }
        }
        Ok(out)
    }

    /// Human-readable description of what backs `address`.
    ///
    /// Primary-image addresses render bare; mapped files show the offset
    /// within the file and its stream; everything else is unmapped.
    pub fn describe(&self, address: u64) -> String {
        let runs = self.runs.read();
        match runs.containing(address) {
            Some(run) if Arc::ptr_eq(&run.stream, &self.image) => format!("{:#x}", address),
            Some(run) => format!(
                "{:#x} @ {} (Mapped {:#x})",
                run.translate(address),
                run.stream.urn(),
                address
            ),
            None => format!("{:#x} (Unmapped)", address),
        }
    }

    /// The flat-space address of `file_offset` within the acquired file
    /// `filename`, mapping the file on first touch. None when the volume
    /// does not hold the file.
    pub fn get_mapped_offset(&self, filename: &str, file_offset: u64) -> Option<u64> {
        self.mapper
            .get_mapped_offset(&self.volume, &self.runs, &self.session, filename, file_offset)
    }

    /// One past the highest mapped address.
    pub fn end(&self) -> u64 {
        self.runs.read().end()
    }

    /// Number of runs currently mapped.
    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    /// Snapshot of the current runs in ascending address order.
    pub fn runs(&self) -> Vec<Run> {
        self.runs.read().iter().cloned().collect()
    }

    /// Directory table base from session or image metadata, if known.
    pub fn dtb(&self) -> Option<u64> {
        self.session.dtb()
    }

    /// Kernel image base from session or image metadata, if known.
    pub fn kernel_base(&self) -> Option<u64> {
        self.session.kernel_base()
    }

    /// URN of the primary physical-memory stream.
    pub fn urn(&self) -> &str {
        self.image.urn()
    }

    /// The underlying volume.
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// The session this address space was opened under.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aff4::{lexicon, MapExtent, VolumeBuilder};
    use std::path::Path;
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn image_volume(path: &Path) {
        let mut builder = VolumeBuilder::create(path).unwrap();
        builder.add_stream("PhysicalMemory", &patterned(4096)).unwrap();
        builder
            .set_category("PhysicalMemory", lexicon::MEMORY_PHYSICAL)
            .unwrap();
        builder.add_stream("pagefile.sys", b"SWAPDATA").unwrap();
        builder
            .set_original_filename("pagefile.sys", "C:\\pagefile.sys")
            .unwrap();
        builder.finish().unwrap();
    }

    fn open_space(path: &Path) -> (Aff4AddressSpace, Arc<Session>) {
        let session = Arc::new(Session::new());
        let space = Aff4AddressSpace::open(path, &session).unwrap();
        (space, session)
    }

    #[test]
    fn test_read_within_image() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.read(0, 4096).unwrap(), patterned(4096));
        assert_eq!(space.read(251, 4).unwrap(), [0, 1, 2, 3]);
    }

    #[test]
    fn test_read_past_end_is_zero_filled() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.read(8192, 16).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_read_straddling_end() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        let data = space.read(4090, 20).unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(data[..6], patterned(4096)[4090..]);
        assert_eq!(data[6..], [0u8; 14]);
    }

    #[test]
    fn test_read_of_zero_bytes() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.read(123, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_read_overflowing_address_rejected() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        match space.read(u64::MAX - 4, 16) {
            Err(PhysmapError::InvalidParameter(_)) => {}
            other => panic!("expected InvalidParameter, got: {:?}", other),
        }
    }

    #[test]
    fn test_end_and_urn() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.end(), 4096);
        assert_eq!(space.run_count(), 1);
        assert_eq!(space.urn(), space.volume().stream_urn("PhysicalMemory"));

        let runs = space.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 0);
        assert_eq!(runs[0].length, 4096);
    }

    #[test]
    fn test_metadata_accessors() {
        let dir = TempDir::new().unwrap();
        let mut builder = VolumeBuilder::create(dir.path()).unwrap();
        builder.add_stream("PhysicalMemory", &[0u8; 64]).unwrap();
        builder
            .set_category("PhysicalMemory", lexicon::MEMORY_PHYSICAL)
            .unwrap();
        builder
            .add_stream(
                "PhysicalMemory/information.yaml",
                b"Registers:\n  CR3: 4358144\nKernBase: 18446735291650146304\n",
            )
            .unwrap();
        builder.finish().unwrap();

        let (space, session) = open_space(dir.path());
        assert_eq!(space.dtb(), Some(4358144));
        assert_eq!(space.kernel_base(), Some(18446735291650146304));
        assert_eq!(session.dtb(), space.dtb());
    }

    #[test]
    fn test_describe() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.describe(0x10), "0x10");
        assert_eq!(space.describe(0x2000), "0x2000 (Unmapped)");

        let base = space.get_mapped_offset("C:\\pagefile.sys", 0).unwrap();
        assert_eq!(
            space.describe(base + 2),
            format!(
                "{:#x} @ {} (Mapped {:#x})",
                2,
                space.volume().stream_urn("pagefile.sys"),
                base + 2
            )
        );
    }

    #[test]
    fn test_mapped_file_reads_back() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        let base = space.get_mapped_offset("C:\\pagefile.sys", 0).unwrap();
        assert!(base >= 4096);
        assert_eq!(space.read(base, 8).unwrap(), b"SWAPDATA");
        assert_eq!(space.read(base + 4, 4).unwrap(), b"DATA");
        assert_eq!(space.end(), base + 8);
        assert_eq!(space.run_count(), 2);

        // file_offset lands inside the mapping.
        assert_eq!(space.get_mapped_offset("C:\\pagefile.sys", 4), Some(base + 4));
    }

    #[test]
    fn test_get_mapped_offset_miss_is_stable() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());
        let (space, _) = open_space(dir.path());

        assert_eq!(space.get_mapped_offset("C:\\swapfile.sys", 0), None);
        assert_eq!(space.get_mapped_offset("C:\\swapfile.sys", 0), None);
        assert_eq!(space.run_count(), 1);
    }

    #[test]
    fn test_shared_session_keeps_mapping_bases() {
        let dir = TempDir::new().unwrap();
        image_volume(dir.path());

        let session = Arc::new(Session::new());
        let first = Aff4AddressSpace::open(dir.path(), &session).unwrap();
        let base = first.get_mapped_offset("C:\\pagefile.sys", 0).unwrap();

        let second = Aff4AddressSpace::open(dir.path(), &session).unwrap();
        assert_eq!(second.get_mapped_offset("c:/pagefile.sys", 0), Some(base));
    }

    #[test]
    fn test_open_through_stream_path() {
        let dir = TempDir::new().unwrap();
        let mut builder = VolumeBuilder::create(dir.path()).unwrap();
        // No category on purpose; only the explicit path reaches it.
        builder.add_stream("memory/raw", &patterned(128)).unwrap();
        builder.finish().unwrap();

        let session = Arc::new(Session::new());
        let space =
            Aff4AddressSpace::open(dir.path().join("memory").join("raw"), &session).unwrap();
        assert_eq!(space.end(), 128);
        assert_eq!(space.read(0, 4).unwrap(), patterned(4));
    }

    #[test]
    fn test_map_stream_with_holes() {
        let dir = TempDir::new().unwrap();
        let mut builder = VolumeBuilder::create(dir.path()).unwrap();
        let ranges = [
            MapExtent {
                map_offset: 0,
                length: 0x1000,
                data_offset: 0,
            },
            MapExtent {
                map_offset: 0x3000,
                length: 0x1000,
                data_offset: 0x1000,
            },
        ];
        builder
            .add_map_stream("PhysicalMemory", &ranges, &[0x55u8; 0x2000])
            .unwrap();
        builder
            .set_category("PhysicalMemory", lexicon::MEMORY_PHYSICAL)
            .unwrap();
        builder.finish().unwrap();

        let (space, _) = open_space(dir.path());
        assert_eq!(space.run_count(), 2);
        assert_eq!(space.end(), 0x4000);

        // A read straddling the hole: data, zeros, data.
        let data = space.read(0x0FF8, 0x2010).unwrap();
        assert_eq!(data[..8], [0x55u8; 8]);
        assert_eq!(data[8..0x2008], vec![0u8; 0x2000]);
        assert_eq!(data[0x2008..], [0x55u8; 8]);

        assert_eq!(space.describe(0x1800), "0x1800 (Unmapped)");
        assert_eq!(space.describe(0x3000), "0x3000");
    }

    #[test]
    fn test_open_rejects_non_volume_path() {
        let session = Arc::new(Session::new());
        match Aff4AddressSpace::open("/nonexistent/image.aff4", &session) {
            Err(PhysmapError::VolumeNotFound { path }) => {
                assert_eq!(path, "/nonexistent/image.aff4");
            }
            other => panic!("expected VolumeNotFound, got: {:?}", other.err()),
        }
    }

    #[test]
    fn test_no_physical_memory_surfaces() {
        let dir = TempDir::new().unwrap();
        let mut builder = VolumeBuilder::create(dir.path()).unwrap();
        builder.add_stream("notes.txt", b"nothing tagged").unwrap();
        let volume = builder.finish().unwrap();

        let session = Arc::new(Session::new());
        match Aff4AddressSpace::with_volume(volume, None, &session) {
            Err(PhysmapError::NoPhysicalMemory { .. }) => {}
            other => panic!("expected NoPhysicalMemory, got: {:?}", other.err()),
        }
    }
}
