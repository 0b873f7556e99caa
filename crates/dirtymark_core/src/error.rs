//! Error types for dirtymark core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in dirty flag operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] dirtymark_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The marker file could not be prepared.
    #[error("marker setup failed: {message}")]
    Setup {
        /// Description of the failure.
        message: String,
    },

    /// Another holder has the advisory lock on the marker file.
    #[error("storage is already open by another process: {}", path.display())]
    StorageLocked {
        /// The locked marker file.
        path: PathBuf,
    },

    /// The marker file ended before a full record was read.
    #[error("unexpected end of marker file: expected {expected} bytes, read {read}")]
    UnexpectedEof {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes read before end of file.
        read: usize,
    },

    /// A flag transition was requested on a store that is not open.
    #[error("dirty flag store is not open")]
    StoreClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Creates a storage locked error.
    pub fn storage_locked(path: impl Into<PathBuf>) -> Self {
        Self::StorageLocked { path: path.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if the error means the storage is in use elsewhere.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::StorageLocked { .. })
    }
}
