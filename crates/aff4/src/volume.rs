//! Opening volumes and resolving the streams inside them.

use crate::error::{Aff4Error, Aff4Result};
use crate::lexicon::{AttrValue, Predicate};
use crate::manifest::Manifest;
use crate::stream::Stream;
use std::fs;
use std::path::{Path, PathBuf};

/// Marker file naming the volume URN. Its presence is what makes a
/// directory a volume.
pub const DESCRIPTION_FILE: &str = "container.description";

/// The information store describing the volume's streams.
pub const INFORMATION_FILE: &str = "information.json";

/// An open, read-only volume.
///
/// Holds no open file handles of its own; each [`Stream`] maps its payload
/// independently. Dropping the volume releases everything.
pub struct Volume {
    root: PathBuf,
    urn: String,
    manifest: Manifest,
}

impl Volume {
    /// Open the volume at `path`.
    ///
    /// Fails with [`Aff4Error::NotAVolume`] when `path` is not a directory
    /// carrying a container description, which callers probing candidate
    /// paths treat as "keep looking".
    pub fn open(path: impl AsRef<Path>) -> Aff4Result<Volume> {
        let root = path.as_ref();

        let description = root.join(DESCRIPTION_FILE);
        if !description.is_file() {
            return Err(Aff4Error::NotAVolume(root.display().to_string()));
        }
        let urn = fs::read_to_string(&description)
            .map_err(|e| Aff4Error::io(format!("reading {}", description.display()), e))?;
        let urn = urn.trim().to_string();
        if urn.is_empty() {
            return Err(Aff4Error::InvalidDescription(
                description.display().to_string(),
            ));
        }

        let information = root.join(INFORMATION_FILE);
        let bytes = fs::read(&information)
            .map_err(|e| Aff4Error::io(format!("reading {}", information.display()), e))?;
        let manifest = Manifest::parse(&bytes, &information.display().to_string())?;

        Ok(Volume {
            root: root.to_path_buf(),
            urn,
            manifest,
        })
    }

    /// The volume URN.
    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// The full URN of a stream given its volume-relative path.
    pub fn stream_urn(&self, path: &str) -> String {
        format!("{}/{}", self.urn, path)
    }

    /// The volume-relative path of a subject URN, if the subject belongs to
    /// this volume.
    pub fn relative_path<'a>(&self, subject: &'a str) -> Option<&'a str> {
        subject
            .strip_prefix(self.urn.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Volume-relative paths of every stream, in declaration order.
    pub fn stream_paths(&self) -> impl Iterator<Item = &str> {
        self.manifest.streams.iter().map(|s| s.path.as_str())
    }

    /// Whether a stream exists, by relative path or full URN.
    pub fn contains_stream(&self, name: &str) -> bool {
        let path = self.relative_path(name).unwrap_or(name);
        self.manifest.stream(path).is_some()
    }

    /// Lazily yields the (subject URN, value) pairs carrying the given
    /// predicate, in declaration order.
    pub fn query(&self, predicate: Predicate) -> impl Iterator<Item = (String, AttrValue)> + '_ {
        self.manifest.streams.iter().filter_map(move |entry| {
            let value = match predicate {
                Predicate::Category => entry.category.as_ref().map(|c| AttrValue::Urn(c.clone())),
                Predicate::OriginalFilename => entry
                    .original_filename
                    .as_ref()
                    .map(|f| AttrValue::String(f.clone())),
            };
            value.map(|value| (self.stream_urn(&entry.path), value))
        })
    }

    /// Open a stream by relative path or full URN.
    pub fn open_stream(&self, name: &str) -> Aff4Result<Stream> {
        let path = self.relative_path(name).unwrap_or(name);
        let entry = self
            .manifest
            .stream(path)
            .ok_or_else(|| Aff4Error::StreamNotFound(self.stream_urn(path)))?;
        Stream::open(
            self.stream_urn(path),
            &self.root.join(&entry.file),
            entry.ranges.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::VolumeBuilder;
    use crate::lexicon;
    use tempfile::TempDir;

    fn sample_volume(dir: &Path) -> Volume {
        let mut builder = VolumeBuilder::create(dir).unwrap();
        builder.add_stream("PhysicalMemory", b"memory bytes").unwrap();
        builder
            .set_category("PhysicalMemory", lexicon::MEMORY_PHYSICAL)
            .unwrap();
        builder.add_stream("pagefile.sys", b"swapped out").unwrap();
        builder
            .set_original_filename("pagefile.sys", "C:\\pagefile.sys")
            .unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn test_open_not_a_volume() {
        let dir = TempDir::new().unwrap();
        match Volume::open(dir.path()) {
            Err(Aff4Error::NotAVolume(_)) => {}
            other => panic!("expected NotAVolume, got: {:?}", other.map(|_| ())),
        }
        // A plain file is not a volume either.
        match Volume::open(dir.path().join("no-such-entry")) {
            Err(Aff4Error::NotAVolume(_)) => {}
            other => panic!("expected NotAVolume, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_and_read_stream() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume(dir.path());

        assert!(volume.urn().starts_with("aff4://"));
        assert!(volume.contains_stream("PhysicalMemory"));
        assert!(!volume.contains_stream("missing"));

        let stream = volume.open_stream("PhysicalMemory").unwrap();
        assert_eq!(stream.size(), 12);
        assert_eq!(stream.read(0, 6).unwrap(), b"memory");
        assert_eq!(stream.urn(), volume.stream_urn("PhysicalMemory"));
    }

    #[test]
    fn test_open_stream_by_urn() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume(dir.path());

        let urn = volume.stream_urn("pagefile.sys");
        let stream = volume.open_stream(&urn).unwrap();
        assert_eq!(stream.read(0, 7).unwrap(), b"swapped");
    }

    #[test]
    fn test_open_stream_not_found() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume(dir.path());

        match volume.open_stream("nothing/here") {
            Err(Aff4Error::StreamNotFound(urn)) => {
                assert_eq!(urn, volume.stream_urn("nothing/here"));
            }
            other => panic!("expected StreamNotFound, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_relative_path() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume(dir.path());

        let subject = volume.stream_urn("a/b/c");
        assert_eq!(volume.relative_path(&subject), Some("a/b/c"));
        assert_eq!(volume.relative_path(volume.urn()), None);
        assert_eq!(volume.relative_path("aff4://other-volume/x"), None);
    }

    #[test]
    fn test_query_predicates() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume(dir.path());

        let categories: Vec<_> = volume.query(Predicate::Category).collect();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].0, volume.stream_urn("PhysicalMemory"));
        assert_eq!(categories[0].1.as_str(), Some(lexicon::MEMORY_PHYSICAL));

        let filenames: Vec<_> = volume.query(Predicate::OriginalFilename).collect();
        assert_eq!(filenames.len(), 1);
        assert_eq!(filenames[0].0, volume.stream_urn("pagefile.sys"));
        assert_eq!(filenames[0].1.as_str(), Some("C:\\pagefile.sys"));

        // Consumable one pair at a time without draining the sequence.
        let mut matches = volume.query(Predicate::Category);
        assert!(matches.next().is_some());
        assert!(matches.next().is_none());
    }

    #[test]
    fn test_poisoned_manifest_extents() {
        let dir = TempDir::new().unwrap();
        let mut builder = VolumeBuilder::create(dir.path()).unwrap();
        builder.add_stream("PhysicalMemory", b"ABCDEFGH").unwrap();
        builder.finish().unwrap();

        // Hand-written store: a zero-length extent sharing the real
        // extent's map offset, and a stream whose extent end cannot exist.
        let crafted = r#"{
            "streams": [
                {
                    "path": "PhysicalMemory",
                    "file": "blobs/0",
                    "ranges": [
                        { "map_offset": 0, "length": 8 },
                        { "map_offset": 0, "length": 0 }
                    ]
                },
                {
                    "path": "wrapped",
                    "file": "blobs/0",
                    "ranges": [
                        { "map_offset": 18446744073709551615, "length": 2 }
                    ]
                }
            ]
        }"#;
        fs::write(dir.path().join(INFORMATION_FILE), crafted).unwrap();

        let volume = Volume::open(dir.path()).unwrap();

        // The degenerate extent is discarded rather than masking the data
        // behind it as zeros.
        let stream = volume.open_stream("PhysicalMemory").unwrap();
        assert_eq!(stream.ranges().len(), 1);
        assert_eq!(stream.read(0, 8).unwrap(), b"ABCDEFGH");

        match volume.open_stream("wrapped") {
            Err(Aff4Error::Manifest { .. }) => {}
            other => panic!("expected Manifest error, got: {:?}", other.map(|_| ())),
        }
    }
}
