//! Loading the primary physical-memory stream.
//!
//! Picks the stream (explicitly named, or auto-discovered through the
//! category attribute), builds the initial run table from its declared
//! extents, indexes acquired filenames for later overlay mapping, and
//! decodes the `information.yaml` sidecar into session metadata.

use crate::cache::CachedStream;
use crate::error::{PhysmapError, PhysmapResult};
use crate::filename::normalize_filename;
use crate::runs::{Run, RunTable};
use crate::session::Session;
use crate::stream::{StreamHandle, VolumeStream};
use aff4::{lexicon, Predicate, Volume};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Fixed name of the metadata side-stream, relative to the primary
/// stream's URN.
const INFORMATION_STREAM: &str = "information.yaml";

/// Sidecar reads are capped; a metadata stream has no business being
/// larger.
const METADATA_READ_LIMIT: u64 = 10_000_000;

/// What loading produces: the primary stream handle, the initial run
/// table, and the filename index for overlay mapping.
pub(crate) struct LoadedImage {
    pub image: StreamHandle,
    pub runs: RunTable,
    pub filenames: HashMap<String, String>,
}

/// Decoded `information.yaml`. Produced by the imaging tool at capture
/// time; only the fields the session cares about are modeled.
#[derive(Debug, Default, Deserialize)]
struct ImageMetadata {
    #[serde(rename = "Registers", default)]
    registers: Registers,
    #[serde(rename = "KernBase", default)]
    kern_base: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct Registers {
    #[serde(rename = "CR3", default)]
    cr3: Option<u64>,
}

/// Load the physical-memory stream of `volume`.
///
/// `stream_path` selects the stream explicitly; None auto-discovers the
/// first stream categorized as physical memory.
pub(crate) fn load_physical_memory(
    volume: &Volume,
    stream_path: Option<&str>,
    session: &Session,
) -> PhysmapResult<LoadedImage> {
    let subject = match stream_path {
        Some(path) => volume.stream_urn(path),
        None => discover_physical_memory(volume)?,
    };

    let stream = volume
        .open_stream(&subject)
        .map_err(|e| PhysmapError::stream_open(&subject, e))?;
    let size = stream.size();
    let extents = stream.ranges().to_vec();

    let base: StreamHandle = Arc::new(VolumeStream::new(stream));
    let image: StreamHandle = Arc::new(CachedStream::new(base));
    info!("added {} as physical memory", subject);

    let mut runs = RunTable::new();
    if extents.is_empty() {
        runs.insert(Run::new(0, 0, size, image.clone()));
    } else {
        // Map extents address the map stream itself, so each extent maps
        // one-to-one at its own offset; the stream resolves the rest.
        for extent in extents {
            runs.insert(Run::new(
                extent.map_offset,
                extent.map_offset,
                extent.length,
                image.clone(),
            ));
        }
    }

    let filenames = build_filename_index(volume);
    apply_metadata(volume, image.urn(), session);

    Ok(LoadedImage {
        image,
        runs,
        filenames,
    })
}

/// The first stream categorized as physical memory, in declaration order.
fn discover_physical_memory(volume: &Volume) -> PhysmapResult<String> {
    for (subject, value) in volume.query(Predicate::Category) {
        if value.as_str() == Some(lexicon::MEMORY_PHYSICAL) {
            return Ok(subject);
        }
    }
    Err(PhysmapError::no_physical_memory(volume.urn()))
}

/// Build the normalized-filename index over the volume's streams.
fn build_filename_index(volume: &Volume) -> HashMap<String, String> {
    let mut filenames = HashMap::new();

    // Declared original filenames are authoritative.
    for (subject, value) in volume.query(Predicate::OriginalFilename) {
        if let Some(original) = value.as_str() {
            filenames.insert(normalize_filename(original), subject);
        }
    }

    // Volume-relative paths fill in for streams declaring none; they
    // never displace an authoritative entry.
    for path in volume.stream_paths() {
        filenames
            .entry(normalize_filename(path))
            .or_insert_with(|| volume.stream_urn(path));
    }

    filenames
}

/// Populate session metadata from the sidecar, where the session has no
/// explicit values yet. Absence is expected and only logged.
fn apply_metadata(volume: &Volume, image_urn: &str, session: &Session) {
    match read_metadata(volume, image_urn) {
        Ok(metadata) => {
            if let Some(dtb) = metadata.registers.cr3 {
                session.set_dtb_if_unset(dtb);
            }
            if let Some(kernel_base) = metadata.kern_base {
                session.set_kernel_base_if_unset(kernel_base);
            }
        }
        Err(err) => warn!("{}", err),
    }
}

fn read_metadata(volume: &Volume, image_urn: &str) -> PhysmapResult<ImageMetadata> {
    let urn = format!("{}/{}", image_urn, INFORMATION_STREAM);
    let stream = volume
        .open_stream(&urn)
        .map_err(|e| PhysmapError::metadata(&urn, e.to_string()))?;

    let length = stream.size().min(METADATA_READ_LIMIT) as usize;
    let bytes = stream
        .read(0, length)
        .map_err(|e| PhysmapError::metadata(&urn, e.to_string()))?;
    serde_yaml::from_slice(&bytes).map_err(|e| PhysmapError::metadata(&urn, e.to_string()))
}
