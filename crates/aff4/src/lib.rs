//! Directory-backed AFF4 evidence volume reader and writer.
//!
//! An AFF4 volume collects the artifacts of one acquisition: the captured
//! memory image, files lifted from the target's filesystem, and metadata
//! side-streams. This crate reads and writes the directory encoding of a
//! volume, where a `container.description` file carries the volume URN and
//! an `information.json` store describes the member streams. It provides:
//!
//! - `Volume` for probing/opening a volume and resolving streams by
//!   relative path or full URN
//! - `Stream` for zero-padded reads of image and map stream payloads
//! - Attribute queries over typed predicates (`aff4:category`,
//!   `aff4:original_filename`)
//! - `VolumeBuilder` for producing volumes (imagers, test fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use aff4::{lexicon, Predicate, Volume};
//!
//! let volume = Volume::open("/evidence/capture.aff4")?;
//! for (subject, value) in volume.query(Predicate::Category) {
//!     if value.as_str() == Some(lexicon::MEMORY_PHYSICAL) {
//!         let stream = volume.open_stream(&subject)?;
//!         println!("{}: {} bytes", subject, stream.size());
//!     }
//! }
//! ```

pub mod builder;
pub mod error;
pub mod lexicon;
pub mod manifest;
pub mod stream;
pub mod volume;

// Re-export key types at crate root.
pub use builder::VolumeBuilder;
pub use error::{Aff4Error, Aff4Result};
pub use lexicon::{AttrValue, Predicate};
pub use manifest::{Manifest, MapExtent, StreamEntry};
pub use stream::Stream;
pub use volume::Volume;
