//! Error types for marker file operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The file already exists and exclusive creation was requested.
    #[error("file already exists: {}", path.display())]
    AlreadyExists {
        /// The conflicting path.
        path: PathBuf,
    },
}

impl StorageError {
    /// Returns `true` if this error represents an interrupted transfer
    /// that may simply be retried.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }

    /// Maps an I/O error against `path` to the typed variants where possible.
    pub(crate) fn from_io(err: io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn interrupted_is_detected() {
        let err = StorageError::Io(io::Error::new(io::ErrorKind::Interrupted, "signal"));
        assert!(err.is_interrupted());

        let err = StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!err.is_interrupted());
    }

    #[test]
    fn from_io_maps_kinds() {
        let path = Path::new("marker");

        let err = StorageError::from_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, StorageError::NotFound { .. }));

        let err = StorageError::from_io(io::Error::from(io::ErrorKind::AlreadyExists), path);
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        let err = StorageError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, StorageError::Io(_)));
    }
}
