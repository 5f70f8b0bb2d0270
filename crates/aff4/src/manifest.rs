//! The information store: the JSON document describing every stream in a
//! directory-backed volume.

use crate::error::{Aff4Error, Aff4Result};
use serde::{Deserialize, Serialize};

/// One contiguous extent of a map stream.
///
/// Reading map-space offsets `[map_offset, map_offset + length)` yields the
/// payload bytes starting at `data_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapExtent {
    pub map_offset: u64,
    pub length: u64,
    #[serde(default)]
    pub data_offset: u64,
}

impl MapExtent {
    /// One past the last map-space offset this extent covers.
    pub fn map_end(&self) -> u64 {
        self.map_offset + self.length
    }
}

/// One stream entry in the information store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Volume-relative stream path (slash-separated).
    pub path: String,
    /// Payload blob, relative to the volume root.
    pub file: String,
    /// `aff4:category` attribute, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// `aff4:original_filename` attribute, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    /// Map extents. Empty for plain image streams.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<MapExtent>,
}

/// The decoded information store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
}

impl Manifest {
    /// Decode an information store, naming `origin` in any error.
    pub fn parse(bytes: &[u8], origin: &str) -> Aff4Result<Manifest> {
        serde_json::from_slice(bytes).map_err(|e| Aff4Error::manifest(origin, e.to_string()))
    }

    /// Look up a stream entry by volume-relative path.
    pub fn stream(&self, path: &str) -> Option<&StreamEntry> {
        self.streams.iter().find(|s| s.path == path)
    }
}
