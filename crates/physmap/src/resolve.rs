//! Locating a volume from a combined filesystem/stream path.
//!
//! Nothing in a path like `/data/image.aff4/PhysicalMemory` marks where
//! the filesystem ends and the container begins, so resolution probes the
//! longest prefix first and backtracks one component at a time.

use crate::error::{PhysmapError, PhysmapResult};
use aff4::Volume;
use std::path::Path;
use tracing::debug;

/// Split a combined path into the innermost volume it names and the
/// residual in-volume stream path.
///
/// Returns the first prefix (longest to shortest) that opens as a volume,
/// together with the leftover components joined with `/` (the in-container
/// separator), or None when the whole path was the volume. Probing the
/// longest prefix first means a nested volume wins over the volume that
/// contains it.
pub fn locate_volume(path: &Path) -> PhysmapResult<(Volume, Option<String>)> {
    let mut residual: Vec<String> = Vec::new();
    let mut probe = path.to_path_buf();

    loop {
        match Volume::open(&probe) {
            Ok(volume) => {
                let stream = if residual.is_empty() {
                    None
                } else {
                    Some(residual.join("/"))
                };
                return Ok((volume, stream));
            }
            Err(err) => {
                debug!("no volume at {}: {}", probe.display(), err);
            }
        }

        let Some(component) = probe.file_name() else {
            break;
        };
        residual.insert(0, component.to_string_lossy().into_owned());

        let parent = match probe.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => break,
        };
        probe = parent;
    }

    Err(PhysmapError::volume_not_found(path.display().to_string()))
}
