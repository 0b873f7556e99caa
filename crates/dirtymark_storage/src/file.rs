//! File-based marker backend.

use crate::backend::{MarkerBackend, MarkerHandle};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A marker backend over OS files.
///
/// Advisory locks come from `fs2` (`flock` on Unix, `LockFileEx` on
/// Windows). They are held per open handle, so two handles on the same
/// path exclude each other even inside one process.
///
/// # Example
///
/// ```no_run
/// use dirtymark_storage::{FileBackend, MarkerBackend, MarkerHandle};
/// use std::path::Path;
///
/// let backend = FileBackend::new();
/// let path = Path::new("dirty.flag");
/// backend.create_new(path).unwrap();
///
/// let handle = backend.open(path).unwrap();
/// handle.write_at(0, &[1, 0]).unwrap();
/// handle.sync().unwrap();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBackend;

impl FileBackend {
    /// Creates a new file backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MarkerBackend for FileBackend {
    type Handle = FileHandle;

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(path.try_exists()?)
    }

    fn create_new(&self, path: &Path) -> StorageResult<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| StorageError::from_io(e, path))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        fs::remove_file(path).map_err(|e| StorageError::from_io(e, path))
    }

    fn open(&self, path: &Path) -> StorageResult<FileHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StorageError::from_io(e, path))?;

        Ok(FileHandle {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }
}

/// An open marker file on disk.
///
/// Seek and transfer happen under one mutex so positioned calls from
/// different threads do not interleave.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileHandle {
    /// Returns the path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarkerHandle for FileHandle {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> StorageResult<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.write(buf)?)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn sync(&self) -> StorageResult<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    fn try_lock_exclusive(&self) -> StorageResult<bool> {
        let file = self.file.lock();
        match FileExt::try_lock_exclusive(&*file) {
            Ok(()) => Ok(true),
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn unlock(&self) -> StorageResult<()> {
        let file = self.file.lock();
        FileExt::unlock(&*file)?;
        Ok(())
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
