//! Error types for the AFF4 volume crate.

use thiserror::Error;

/// AFF4 volume reading/writing errors.
#[derive(Debug, Error)]
pub enum Aff4Error {
    /// The path does not name an AFF4 volume (no container description).
    #[error("not an AFF4 volume: {0}")]
    NotAVolume(String),

    /// The container description file exists but holds no usable URN.
    #[error("invalid container description: {0}")]
    InvalidDescription(String),

    /// The information store is missing, does not decode, or declares an
    /// impossible stream layout.
    #[error("malformed information store {path}: {message}")]
    Manifest { path: String, message: String },

    /// No stream with the requested URN exists in the volume.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// A stream with that path already exists in the volume being built.
    #[error("duplicate stream path: {0}")]
    DuplicateStream(String),

    /// Underlying I/O failure, with the operation that caused it.
    #[error("I/O error {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Aff4Error {
    /// Create an Io error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Aff4Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a Manifest error.
    pub fn manifest(path: impl Into<String>, message: impl Into<String>) -> Self {
        Aff4Error::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Aff4Result<T> = Result<T, Aff4Error>;
