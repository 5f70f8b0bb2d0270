//! Writing volumes.
//!
//! Imaging tools assemble a volume stream by stream; tests use the same
//! path to build fixtures. Payload blobs are written as streams are added,
//! the description and information store when the builder finishes.

use crate::error::{Aff4Error, Aff4Result};
use crate::manifest::{Manifest, MapExtent, StreamEntry};
use crate::volume::{Volume, DESCRIPTION_FILE, INFORMATION_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory holding payload blobs, relative to the volume root.
const BLOB_DIR: &str = "blobs";

/// Builds a directory-backed volume on disk.
pub struct VolumeBuilder {
    root: PathBuf,
    urn: String,
    streams: Vec<StreamEntry>,
}

impl VolumeBuilder {
    /// Start a new volume at `path`, creating the directory as needed.
    pub fn create(path: impl AsRef<Path>) -> Aff4Result<VolumeBuilder> {
        let root = path.as_ref().to_path_buf();
        let blob_dir = root.join(BLOB_DIR);
        fs::create_dir_all(&blob_dir)
            .map_err(|e| Aff4Error::io(format!("creating {}", blob_dir.display()), e))?;

        Ok(VolumeBuilder {
            root,
            urn: format!("aff4://{}", Uuid::new_v4()),
            streams: Vec::new(),
        })
    }

    /// The URN the finished volume will carry.
    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Add a plain image stream.
    pub fn add_stream(&mut self, path: &str, data: &[u8]) -> Aff4Result<()> {
        let file = self.write_blob(path, data)?;
        self.streams.push(StreamEntry {
            path: path.to_string(),
            file,
            category: None,
            original_filename: None,
            ranges: Vec::new(),
        });
        Ok(())
    }

    /// Add a map stream: `data` is the packed payload, `ranges` scatter it
    /// over the stream's map space.
    pub fn add_map_stream(
        &mut self,
        path: &str,
        ranges: &[MapExtent],
        data: &[u8],
    ) -> Aff4Result<()> {
        let file = self.write_blob(path, data)?;
        self.streams.push(StreamEntry {
            path: path.to_string(),
            file,
            category: None,
            original_filename: None,
            ranges: ranges.to_vec(),
        });
        Ok(())
    }

    /// Set the `aff4:category` attribute of an already-added stream.
    pub fn set_category(&mut self, path: &str, category: &str) -> Aff4Result<()> {
        self.entry_mut(path)?.category = Some(category.to_string());
        Ok(())
    }

    /// Set the `aff4:original_filename` attribute of an already-added
    /// stream.
    pub fn set_original_filename(&mut self, path: &str, filename: &str) -> Aff4Result<()> {
        self.entry_mut(path)?.original_filename = Some(filename.to_string());
        Ok(())
    }

    /// Write the description and information store, then reopen the volume
    /// for reading.
    pub fn finish(self) -> Aff4Result<Volume> {
        let description = self.root.join(DESCRIPTION_FILE);
        fs::write(&description, format!("{}\n", self.urn))
            .map_err(|e| Aff4Error::io(format!("writing {}", description.display()), e))?;

        let manifest = Manifest {
            streams: self.streams,
        };
        let information = self.root.join(INFORMATION_FILE);
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Aff4Error::manifest(information.display().to_string(), e.to_string()))?;
        fs::write(&information, bytes)
            .map_err(|e| Aff4Error::io(format!("writing {}", information.display()), e))?;

        Volume::open(&self.root)
    }

    fn write_blob(&mut self, path: &str, data: &[u8]) -> Aff4Result<String> {
        if self.streams.iter().any(|s| s.path == path) {
            return Err(Aff4Error::DuplicateStream(path.to_string()));
        }
        // Blobs are numbered, not named after the stream: stream paths may
        // contain characters the filesystem rejects.
        let file = format!("{}/{}", BLOB_DIR, self.streams.len());
        let blob_path = self.root.join(&file);
        fs::write(&blob_path, data)
            .map_err(|e| Aff4Error::io(format!("writing {}", blob_path.display()), e))?;
        Ok(file)
    }

    fn entry_mut(&mut self, path: &str) -> Aff4Result<&mut StreamEntry> {
        let urn = self.urn.clone();
        self.streams
            .iter_mut()
            .find(|s| s.path == path)
            .ok_or_else(|| Aff4Error::StreamNotFound(format!("{}/{}", urn, path)))
    }
}
