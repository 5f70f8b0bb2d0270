//! Flat physical-memory access over forensic memory containers.
//!
//! This crate assembles the streams of an AFF4-style volume into a single
//! flat physical address space, the way memory analysis expects to see it.
//! It provides:
//!
//! - Volume location by walking a path upward until a volume opens
//! - Auto-discovery of the physical-memory stream, or explicit selection
//! - Flat reads across sparse runs, with holes reading as zeros
//! - On-demand mapping of acquired files (pagefile, drivers) into free
//!   address space, with session-stable mapping offsets
//! - Block-level read caching over container streams
//!
//! # Example
//!
//! ```rust,ignore
//! use physmap::{Aff4AddressSpace, Session};
//! use std::sync::Arc;
//!
//! let session = Arc::new(Session::new());
//! let space = Aff4AddressSpace::open("/evidence/memory.aff4", &session)?;
//!
//! let header = space.read(0, 4096)?;
//! if let Some(addr) = space.get_mapped_offset("C:\\pagefile.sys", 0) {
//!     let swapped = space.read(addr, 512)?;
//! }
//! ```

pub mod cache;
pub mod error;
pub mod filename;
mod loader;
mod mapper;
pub mod resolve;
pub mod runs;
pub mod session;
pub mod space;
pub mod stream;

// Re-export key types at crate root.
pub use cache::CachedStream;
pub use error::{PhysmapError, PhysmapResult};
pub use filename::normalize_filename;
pub use resolve::locate_volume;
pub use runs::{Run, RunTable};
pub use session::Session;
pub use space::Aff4AddressSpace;
pub use stream::{BackingStream, StreamHandle, VolumeStream};
