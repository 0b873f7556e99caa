//! In-memory marker backend for testing.

use crate::backend::{MarkerBackend, MarkerHandle};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// An in-memory marker backend.
///
/// Clones share one namespace, so two stores built from clones of the same
/// backend contend for the same paths and locks the way two processes would.
/// Removing a path unlinks it; handles already open keep working on the
/// orphaned contents, as on Unix.
///
/// The backend can also misbehave on request, which lets tests drive the
/// retry loops of the layers above:
///
/// - [`with_max_transfer`](Self::with_max_transfer) caps every read and write
/// - [`inject_interrupts`](Self::inject_interrupts) fails transfers with `Interrupted`
/// - [`fail_removes`](Self::fail_removes) makes removals fail while the file stays
/// - [`race_removes`](Self::race_removes) makes removals fail after the file is gone
/// - [`fail_opens`](Self::fail_opens) makes opens fail with `PermissionDenied`
/// - [`overstate_size`](Self::overstate_size) makes handles report more bytes than exist
///
/// # Example
///
/// ```rust
/// use dirtymark_storage::{InMemoryBackend, MarkerBackend, MarkerHandle};
/// use std::path::Path;
///
/// let backend = InMemoryBackend::new().with_max_transfer(1);
/// backend.put(Path::new("dirty.flag"), vec![1, 0]);
///
/// let handle = backend.open(Path::new("dirty.flag")).unwrap();
/// let mut buf = [0u8; 2];
/// assert_eq!(handle.read_at(0, &mut buf).unwrap(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    files: Mutex<HashMap<PathBuf, Arc<Inode>>>,
    /// Zero means unlimited.
    max_transfer: AtomicUsize,
    interrupts: AtomicUsize,
    failing_removes: AtomicUsize,
    racing_removes: AtomicUsize,
    failing_opens: AtomicUsize,
    extra_size: AtomicUsize,
    write_calls: AtomicUsize,
    next_handle: AtomicU64,
}

#[derive(Debug, Default)]
struct Inode {
    data: Mutex<Vec<u8>>,
    lock_owner: Mutex<Option<u64>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps each read and write at `max` bytes. Zero removes the cap.
    #[must_use]
    pub fn with_max_transfer(self, max: usize) -> Self {
        self.shared.max_transfer.store(max, Ordering::Release);
        self
    }

    /// Makes the next `count` transfers fail with `ErrorKind::Interrupted`.
    pub fn inject_interrupts(&self, count: usize) {
        self.shared.interrupts.store(count, Ordering::Release);
    }

    /// Makes the next `count` removals fail while leaving the file in place.
    pub fn fail_removes(&self, count: usize) {
        self.shared.failing_removes.store(count, Ordering::Release);
    }

    /// Makes the next `count` removals unlink the file and still report an
    /// error, as if a concurrent deleter won the race.
    pub fn race_removes(&self, count: usize) {
        self.shared.racing_removes.store(count, Ordering::Release);
    }

    /// Makes the next `count` opens fail with `ErrorKind::PermissionDenied`.
    pub fn fail_opens(&self, count: usize) {
        self.shared.failing_opens.store(count, Ordering::Release);
    }

    /// Makes `size()` on every handle report `extra` bytes beyond the real
    /// contents, as a file truncated behind the reader would.
    pub fn overstate_size(&self, extra: usize) {
        self.shared.extra_size.store(extra, Ordering::Release);
    }

    /// Places a file with the given contents at `path`, replacing any
    /// existing one.
    pub fn put(&self, path: &Path, data: Vec<u8>) {
        let inode = Inode {
            data: Mutex::new(data),
            lock_owner: Mutex::new(None),
        };
        self.shared
            .files
            .lock()
            .insert(path.to_path_buf(), Arc::new(inode));
    }

    /// Returns a copy of the file at `path`, if present.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.shared
            .files
            .lock()
            .get(path)
            .map(|inode| inode.data.lock().clone())
    }

    /// Returns `true` if some handle holds the lock on the file at `path`.
    #[must_use]
    pub fn is_locked(&self, path: &Path) -> bool {
        self.shared
            .files
            .lock()
            .get(path)
            .is_some_and(|inode| inode.lock_owner.lock().is_some())
    }

    /// Returns the number of `write_at` calls that transferred data.
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.shared.write_calls.load(Ordering::Acquire)
    }
}

impl MarkerBackend for InMemoryBackend {
    type Handle = InMemoryHandle;

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(self.shared.files.lock().contains_key(path))
    }

    fn create_new(&self, path: &Path) -> StorageResult<()> {
        let mut files = self.shared.files.lock();
        if files.contains_key(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        files.insert(path.to_path_buf(), Arc::default());
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let mut files = self.shared.files.lock();

        if take_one(&self.shared.racing_removes) {
            files.remove(path);
            return Err(io::Error::new(io::ErrorKind::Other, "removed concurrently").into());
        }

        if !files.contains_key(path) {
            return Err(StorageError::NotFound {
                path: path.to_path_buf(),
            });
        }

        if take_one(&self.shared.failing_removes) {
            return Err(io::Error::new(io::ErrorKind::Other, "resource busy").into());
        }

        files.remove(path);
        Ok(())
    }

    fn open(&self, path: &Path) -> StorageResult<InMemoryHandle> {
        if take_one(&self.shared.failing_opens) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied).into());
        }

        let inode = self
            .shared
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })?;

        Ok(InMemoryHandle {
            id: self.shared.next_handle.fetch_add(1, Ordering::Relaxed),
            inode,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// An open in-memory marker file.
#[derive(Debug)]
pub struct InMemoryHandle {
    id: u64,
    inode: Arc<Inode>,
    shared: Arc<Shared>,
}

impl InMemoryHandle {
    fn transfer_len(&self, requested: usize) -> StorageResult<usize> {
        if take_one(&self.shared.interrupts) {
            return Err(io::Error::from(io::ErrorKind::Interrupted).into());
        }
        let max = self.shared.max_transfer.load(Ordering::Acquire);
        Ok(if max == 0 { requested } else { requested.min(max) })
    }
}

impl MarkerHandle for InMemoryHandle {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let len = self.transfer_len(buf.len())?;
        let data = self.inode.data.lock();
        let start = offset as usize;

        if start >= data.len() {
            return Ok(0);
        }

        let n = len.min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let n = self.transfer_len(buf.len())?;
        let mut data = self.inode.data.lock();
        let start = offset as usize;
        let end = start + n;

        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(&buf[..n]);
        self.shared.write_calls.fetch_add(1, Ordering::AcqRel);
        Ok(n)
    }

    fn size(&self) -> StorageResult<u64> {
        let extra = self.shared.extra_size.load(Ordering::Acquire);
        Ok((self.inode.data.lock().len() + extra) as u64)
    }

    fn sync(&self) -> StorageResult<()> {
        // Nothing is buffered
        Ok(())
    }

    fn try_lock_exclusive(&self) -> StorageResult<bool> {
        let mut owner = self.inode.lock_owner.lock();
        match *owner {
            None => {
                *owner = Some(self.id);
                Ok(true)
            }
            Some(id) => Ok(id == self.id),
        }
    }

    fn unlock(&self) -> StorageResult<()> {
        let mut owner = self.inode.lock_owner.lock();
        if *owner == Some(self.id) {
            *owner = None;
        }
        Ok(())
    }
}

impl Drop for InMemoryHandle {
    fn drop(&mut self) {
        let mut owner = self.inode.lock_owner.lock();
        if *owner == Some(self.id) {
            *owner = None;
        }
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_path() -> &'static Path {
        Path::new("db/dirty.flag")
    }

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(!backend.exists(flag_path()).unwrap());
        assert!(backend.contents(flag_path()).is_none());
    }

    #[test]
    fn memory_create_and_open() {
        let backend = InMemoryBackend::new();
        backend.create_new(flag_path()).unwrap();

        let handle = backend.open(flag_path()).unwrap();
        assert_eq!(handle.size().unwrap(), 0);

        let result = backend.create_new(flag_path());
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn memory_open_missing_fails() {
        let result = InMemoryBackend::new().open(flag_path());
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn memory_write_extends_and_overwrites() {
        let backend = InMemoryBackend::new();
        backend.create_new(flag_path()).unwrap();
        let handle = backend.open(flag_path()).unwrap();

        assert_eq!(handle.write_at(0, &[1, 0]).unwrap(), 2);
        assert_eq!(handle.write_at(1, &[1]).unwrap(), 1);

        assert_eq!(backend.contents(flag_path()).unwrap(), vec![1, 1]);
        assert_eq!(backend.write_calls(), 2);
    }

    #[test]
    fn memory_read_past_end_returns_zero() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![1]);
        let handle = backend.open(flag_path()).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(handle.read_at(0, &mut buf).unwrap(), 1);
        assert_eq!(handle.read_at(1, &mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_max_transfer_shortens_io() {
        let backend = InMemoryBackend::new().with_max_transfer(1);
        backend.create_new(flag_path()).unwrap();
        let handle = backend.open(flag_path()).unwrap();

        assert_eq!(handle.write_at(0, &[1, 1]).unwrap(), 1);
        assert_eq!(backend.contents(flag_path()).unwrap(), vec![1]);

        let mut buf = [0u8; 2];
        assert_eq!(handle.read_at(0, &mut buf).unwrap(), 1);
    }

    #[test]
    fn memory_interrupts_are_consumed() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![0, 0]);
        let handle = backend.open(flag_path()).unwrap();
        backend.inject_interrupts(1);

        let err = handle.write_at(0, &[1]).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(handle.write_at(0, &[1]).unwrap(), 1);
    }

    #[test]
    fn memory_lock_is_exclusive_between_handles() {
        let backend = InMemoryBackend::new();
        backend.create_new(flag_path()).unwrap();

        let first = backend.open(flag_path()).unwrap();
        let second = backend.clone().open(flag_path()).unwrap();

        assert!(first.try_lock_exclusive().unwrap());
        assert!(!second.try_lock_exclusive().unwrap());
        assert!(backend.is_locked(flag_path()));

        first.unlock().unwrap();
        assert!(second.try_lock_exclusive().unwrap());
    }

    #[test]
    fn memory_lock_released_on_drop() {
        let backend = InMemoryBackend::new();
        backend.create_new(flag_path()).unwrap();

        {
            let handle = backend.open(flag_path()).unwrap();
            assert!(handle.try_lock_exclusive().unwrap());
        }

        assert!(!backend.is_locked(flag_path()));
    }

    #[test]
    fn memory_remove_keeps_open_handles_alive() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![1, 0]);
        let handle = backend.open(flag_path()).unwrap();

        backend.remove(flag_path()).unwrap();
        assert!(!backend.exists(flag_path()).unwrap());

        let mut buf = [0u8; 2];
        assert_eq!(handle.read_at(0, &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 0]);
    }

    #[test]
    fn memory_failing_open_is_consumed() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![0, 0]);
        backend.fail_opens(1);

        let err = backend.open(flag_path()).unwrap_err();
        assert!(matches!(err, StorageError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied));
        assert!(backend.open(flag_path()).is_ok());
    }

    #[test]
    fn memory_overstated_size() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![1]);
        backend.overstate_size(1);
        let handle = backend.open(flag_path()).unwrap();

        assert_eq!(handle.size().unwrap(), 2);
        let mut buf = [0u8; 2];
        assert_eq!(handle.read_at(1, &mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_failing_remove_leaves_file() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![0, 0]);
        backend.fail_removes(1);

        assert!(backend.remove(flag_path()).is_err());
        assert!(backend.exists(flag_path()).unwrap());
        assert!(backend.remove(flag_path()).is_ok());
    }

    #[test]
    fn memory_racing_remove_unlinks_and_errors() {
        let backend = InMemoryBackend::new();
        backend.put(flag_path(), vec![0, 0]);
        backend.race_removes(1);

        assert!(backend.remove(flag_path()).is_err());
        assert!(!backend.exists(flag_path()).unwrap());
    }
}
