//! Error types for the access bridge.
//!
//! Every failure that can reach the bridge boundary is represented here.
//! Nothing in this crate panics on bad input or bad archives; callers either
//! get a [`BridgeError`] or, at the dispatch layer, an error-carrying
//! [`crate::bridge::ReadResult`].

use core::fmt;

/// Errors produced by the file reader, archive reader, and stream codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// The path does not exist or is not a regular file.
    NotFound(String),
    /// An underlying open/read/write failed.
    Io(String),
    /// The streaming codec was written to or closed after close.
    StreamClosed,
    /// The zip container could not be opened or its directory is malformed.
    ContainerOpenFailed {
        /// Container identity (path or URL).
        container: String,
        /// Human-readable reason.
        reason: String,
    },
    /// The named entry is absent from the container's index.
    EntryNotFound {
        /// Entry name as requested.
        entry: String,
        /// Container identity (path or URL).
        container: String,
    },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::NotFound(path) => write!(f, "File not found: {}", path),
            BridgeError::Io(msg) => write!(f, "I/O error: {}", msg),
            BridgeError::StreamClosed => write!(f, "Stream codec used after close"),
            BridgeError::ContainerOpenFailed { container, reason } => {
                write!(f, "Could not open container {}: {}", container, reason)
            }
            BridgeError::EntryNotFound { entry, container } => {
                write!(f, "Could not read file {} from {}", entry, container)
            }
        }
    }
}

impl std::error::Error for BridgeError {}

impl BridgeError {
    /// Fold a `std::io::Error` into the bridge error shape, preserving the
    /// not-found distinction for path resolution failures.
    pub(crate) fn from_io(err: &std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.to_string())
        } else {
            BridgeError::Io(format!("{}: {}", path, err))
        }
    }
}
