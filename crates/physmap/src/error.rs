//! Error types for the physical address space.

use thiserror::Error;

/// Errors raised while building or reading a physical address space.
#[derive(Debug, Error)]
pub enum PhysmapError {
    /// No prefix of the given path opened as a volume.
    #[error("no AFF4 volume found along '{path}'")]
    VolumeNotFound { path: String },

    /// Auto-discovery found no stream categorized as physical memory.
    #[error("volume '{volume}' contains no physical memory stream")]
    NoPhysicalMemory { volume: String },

    /// A required stream failed to open.
    #[error("failed to open stream '{urn}': {source}")]
    StreamOpen {
        urn: String,
        #[source]
        source: aff4::Aff4Error,
    },

    /// A backing stream failed while servicing a read.
    #[error("read failed at {address:#x} in stream '{urn}': {source}")]
    Read {
        address: u64,
        urn: String,
        #[source]
        source: aff4::Aff4Error,
    },

    /// The metadata side-stream was missing or undecodable. Recovered at
    /// load time, never surfaced to callers.
    #[error("no metadata at '{urn}': {message}")]
    Metadata { urn: String, message: String },

    /// Invalid parameter provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PhysmapError {
    /// Create a VolumeNotFound error.
    pub fn volume_not_found(path: impl Into<String>) -> Self {
        PhysmapError::VolumeNotFound { path: path.into() }
    }

    /// Create a NoPhysicalMemory error.
    pub fn no_physical_memory(volume: impl Into<String>) -> Self {
        PhysmapError::NoPhysicalMemory {
            volume: volume.into(),
        }
    }

    /// Create a StreamOpen error.
    pub fn stream_open(urn: impl Into<String>, source: aff4::Aff4Error) -> Self {
        PhysmapError::StreamOpen {
            urn: urn.into(),
            source,
        }
    }

    /// Create a Read error.
    pub fn read(address: u64, urn: impl Into<String>, source: aff4::Aff4Error) -> Self {
        PhysmapError::Read {
            address,
            urn: urn.into(),
            source,
        }
    }

    /// Create a Metadata error.
    pub fn metadata(urn: impl Into<String>, message: impl Into<String>) -> Self {
        PhysmapError::Metadata {
            urn: urn.into(),
            message: message.into(),
        }
    }
}

/// Result type for address space operations.
pub type PhysmapResult<T> = Result<T, PhysmapError>;
