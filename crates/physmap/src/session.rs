//! Analysis-session state shared across address-space instances.

use parking_lot::Mutex;
use std::collections::HashMap;

/// State that outlives any single address space.
///
/// Holds the physical-memory metadata and the overlay-mapping offset
/// table, so a filename keeps its assigned offset when the session opens
/// another address space over the same evidence.
#[derive(Default)]
pub struct Session {
    dtb: Mutex<Option<u64>>,
    kernel_base: Mutex<Option<u64>>,
    /// normalized filename -> assigned overlay base offset
    file_mappings: Mutex<HashMap<String, u64>>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Directory table base (CR3 at capture time), if known.
    pub fn dtb(&self) -> Option<u64> {
        *self.dtb.lock()
    }

    /// Set the directory table base explicitly. Image metadata never
    /// overrides this.
    pub fn set_dtb(&self, dtb: u64) {
        *self.dtb.lock() = Some(dtb);
    }

    /// Record a directory table base from image metadata, unless one is
    /// already set.
    pub fn set_dtb_if_unset(&self, dtb: u64) {
        let mut slot = self.dtb.lock();
        if slot.is_none() {
            *slot = Some(dtb);
        }
    }

    /// Kernel image base address, if known.
    pub fn kernel_base(&self) -> Option<u64> {
        *self.kernel_base.lock()
    }

    /// Set the kernel base explicitly. Image metadata never overrides
    /// this.
    pub fn set_kernel_base(&self, kernel_base: u64) {
        *self.kernel_base.lock() = Some(kernel_base);
    }

    /// Record a kernel base from image metadata, unless one is already
    /// set.
    pub fn set_kernel_base_if_unset(&self, kernel_base: u64) {
        let mut slot = self.kernel_base.lock();
        if slot.is_none() {
            *slot = Some(kernel_base);
        }
    }

    /// The session-scoped base offset for an overlay-mapped file,
    /// assigned via `assign` on first use and stable afterwards.
    pub(crate) fn file_mapping_offset(&self, filename: &str, assign: impl FnOnce() -> u64) -> u64 {
        let mut mappings = self.file_mappings.lock();
        if let Some(&offset) = mappings.get(filename) {
            return offset;
        }
        let offset = assign();
        mappings.insert(filename.to_string(), offset);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_override_wins() {
        let session = Session::new();
        assert_eq!(session.dtb(), None);

        session.set_dtb(0x1aa000);
        session.set_dtb_if_unset(0x2000);
        assert_eq!(session.dtb(), Some(0x1aa000));

        session.set_kernel_base_if_unset(0xfffff800_00000000);
        session.set_kernel_base_if_unset(0x1234);
        assert_eq!(session.kernel_base(), Some(0xfffff800_00000000));

        // An explicit set replaces whatever metadata recorded.
        session.set_kernel_base(0x1234);
        assert_eq!(session.kernel_base(), Some(0x1234));
    }

    #[test]
    fn test_file_mapping_offset_is_stable() {
        let session = Session::new();

        let first = session.file_mapping_offset("c:\\pagefile.sys", || 0x20000);
        assert_eq!(first, 0x20000);

        // The assignment closure must not run again.
        let second = session.file_mapping_offset("c:\\pagefile.sys", || panic!("reassigned"));
        assert_eq!(second, 0x20000);

        let other = session.file_mapping_offset("c:\\swapfile.sys", || 0x90000);
        assert_eq!(other, 0x90000);
    }
}
