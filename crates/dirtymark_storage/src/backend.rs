//! Marker backend trait definitions.

use crate::error::StorageResult;
use std::path::Path;

/// Path-level access to the place marker files live.
///
/// A backend knows nothing about the marker record format. It creates,
/// removes and opens files, and hands out [`MarkerHandle`]s for I/O.
///
/// # Implementors
///
/// - [`super::FileBackend`] - For persistent storage
/// - [`super::InMemoryBackend`] - For testing
pub trait MarkerBackend: Send + Sync {
    /// The open-file type produced by [`MarkerBackend::open`].
    type Handle: MarkerHandle;

    /// Returns `true` if a file exists at `path`.
    ///
    /// This does not open or lock anything.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Creates a new, empty file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists)
    /// if a file is already present, or an I/O error.
    fn create_new(&self, path: &Path) -> StorageResult<()>;

    /// Removes the file at `path`.
    ///
    /// Handles already open on the file stay usable until dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be removed.
    fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Opens an existing file for reading and writing.
    ///
    /// Never creates and never truncates.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if
    /// the file does not exist, or an I/O error.
    fn open(&self, path: &Path) -> StorageResult<Self::Handle>;
}

/// An open marker file.
///
/// Dropping a handle closes it and releases any lock it holds.
///
/// # Invariants
///
/// - `read_at` and `write_at` perform a single transfer which may be short
/// - `read_at` returning `Ok(0)` for a non-empty buffer means end of file
/// - An `Interrupted` error moved nothing and may be retried
/// - The advisory lock is exclusive and non-reentrant: a second handle on
///   the same file cannot acquire it while this one holds it
pub trait MarkerHandle: Send + Sync {
    /// Reads into `buf` starting at `offset`, returning the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize>;

    /// Writes from `buf` starting at `offset`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&self, offset: u64, buf: &[u8]) -> StorageResult<usize>;

    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Tries to take the exclusive advisory lock without blocking.
    ///
    /// Returns `Ok(false)` when another holder has it.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than contention.
    fn try_lock_exclusive(&self) -> StorageResult<bool>;

    /// Releases the advisory lock held by this handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released.
    fn unlock(&self) -> StorageResult<()>;
}
