//! The dirty flag store.
//!
//! A [`DirtyFlagStore`] owns one marker file holding two flags: whether the
//! storage may be inconsistent (`dirty`) and whether an index rebuild is
//! pending. The storage engine consults the flags once at open time and
//! flips them around every state change, so a crash leaves the last observed
//! state on disk.
//!
//! ## Lifecycle
//!
//! ```text
//! Unopened --create/open--> Open --close--> Closed --open--> Open
//!                            |
//!                            +---delete---> Deleted
//! ```
//!
//! ## Concurrency
//!
//! Every mutation runs under one mutex per store. Flag reads are lock-free
//! loads of cached atomics, which are only published after the record write
//! has succeeded. Cross-process exclusion comes from an advisory lock taken
//! once at create/open time when [`Config::file_lock`] is set.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::io::{read_full, write_full};
use crate::record::{FlagRecord, RecordLayout, RECORD_SIZE};
use dirtymark_storage::{FileBackend, MarkerBackend, MarkerHandle, StorageError};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Lifecycle state of a [`DirtyFlagStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Neither `create` nor `open` has succeeded yet.
    Unopened,
    /// The marker file is open and flags may change.
    Open,
    /// The handle was released; the file stays on disk.
    Closed,
    /// The handle was released and the file removed.
    Deleted,
}

/// Which of the two flags a transition targets.
#[derive(Debug, Clone, Copy)]
enum Flag {
    Dirty,
    IndexRebuild,
}

impl Flag {
    const fn name(self) -> &'static str {
        match self {
            Self::Dirty => "dirty",
            Self::IndexRebuild => "index_rebuild_scheduled",
        }
    }

    fn apply(self, record: &mut FlagRecord, value: bool) {
        match self {
            Self::Dirty => record.dirty = value,
            Self::IndexRebuild => record.index_rebuild_scheduled = value,
        }
    }
}

struct Inner<H> {
    state: StoreState,
    handle: Option<H>,
    locked: bool,
    /// Set once this store has created the file, even if setup then failed.
    associated: bool,
}

/// Persistent crash-detection marker for one storage instance.
///
/// # Example
///
/// ```rust
/// use dirtymark_core::{Config, DirtyFlagStore};
/// use dirtymark_storage::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// let store = DirtyFlagStore::with_backend(backend.clone(), "db/dirty.flag", Config::new());
///
/// store.create().unwrap();
/// assert!(store.is_dirty());
///
/// store.clear_dirty().unwrap();
/// store.close().unwrap();
///
/// let reopened = DirtyFlagStore::with_backend(backend, "db/dirty.flag", Config::new());
/// reopened.open().unwrap();
/// assert!(!reopened.is_dirty());
/// ```
pub struct DirtyFlagStore<B: MarkerBackend = FileBackend> {
    backend: B,
    path: PathBuf,
    config: Config,
    inner: Mutex<Inner<B::Handle>>,
    dirty: AtomicBool,
    index_rebuild_scheduled: AtomicBool,
}

impl DirtyFlagStore<FileBackend> {
    /// Creates a store for the marker file at `path` on the local file system.
    ///
    /// Nothing is touched until [`create`](Self::create) or [`open`](Self::open).
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self::with_backend(FileBackend::new(), path, config)
    }
}

impl<B: MarkerBackend> DirtyFlagStore<B> {
    /// Creates a store for the marker file at `path` on the given backend.
    pub fn with_backend(backend: B, path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            backend,
            path: path.into(),
            config,
            inner: Mutex::new(Inner {
                state: StoreState::Unopened,
                handle: None,
                locked: false,
                associated: false,
            }),
            dirty: AtomicBool::new(false),
            index_rebuild_scheduled: AtomicBool::new(false),
        }
    }

    /// Returns the marker file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StoreState {
        self.inner.lock().state
    }

    /// Returns `true` if this store holds the advisory lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    /// Creates a fresh marker file, replacing any existing one.
    ///
    /// The new marker is dirty with no rebuild scheduled, so a crash before
    /// the first clean close is detected on the next open.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StorageLocked`] if locking is enabled and another
    ///   holder has the existing or new file locked
    /// - [`CoreError::Setup`] if the old file cannot be deleted or the new
    ///   one cannot be created
    /// - [`CoreError::InvalidOperation`] if the store is already open
    pub fn create(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_not_open(&inner, "create")?;

        if self.backend.exists(&self.path)? {
            if self.config.file_lock {
                self.probe_lock()?;
            }
            self.backend.remove(&self.path).map_err(|e| {
                CoreError::setup(format!("cannot delete file {}: {e}", self.path.display()))
            })?;
        }

        self.backend.create_new(&self.path).map_err(|e| {
            CoreError::setup(format!("cannot create file {}: {e}", self.path.display()))
        })?;
        inner.associated = true;

        let handle = self.backend.open(&self.path)?;
        let locked = self.acquire_lock(&handle)?;

        self.persist(&handle, FlagRecord::CREATED)?;
        self.publish(FlagRecord::CREATED);

        *inner = Inner {
            state: StoreState::Open,
            handle: Some(handle),
            locked,
            associated: true,
        };

        debug!(path = %self.path.display(), locked, "created dirty flag marker");
        Ok(())
    }

    /// Opens the marker file and loads its flags.
    ///
    /// A missing or empty file is initialized clean. A legacy one-byte file
    /// is read and rewritten in the current layout.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StorageLocked`] if locking is enabled and another
    ///   holder has the file locked
    /// - [`CoreError::UnexpectedEof`] if the file is shorter than its
    ///   reported size
    /// - [`CoreError::Setup`] if a missing file cannot be created
    /// - [`CoreError::InvalidOperation`] if the store is already open
    pub fn open(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_not_open(&inner, "open")?;

        if !self.backend.exists(&self.path)? {
            match self.backend.create_new(&self.path) {
                Ok(()) => inner.associated = true,
                Err(StorageError::AlreadyExists { .. }) => {}
                Err(e) => {
                    return Err(CoreError::setup(format!(
                        "cannot create file {}: {e}",
                        self.path.display()
                    )))
                }
            }
        }

        let handle = self.backend.open(&self.path)?;
        let locked = self.acquire_lock(&handle)?;

        let record = match load(&handle)? {
            (_, None) => {
                self.persist(&handle, FlagRecord::CLEAN)?;
                FlagRecord::CLEAN
            }
            (RecordLayout::Legacy, Some(record)) => {
                self.persist(&handle, record)?;
                info!(path = %self.path.display(), "upgraded legacy dirty flag marker");
                record
            }
            (_, Some(record)) => record,
        };
        self.publish(record);

        *inner = Inner {
            state: StoreState::Open,
            handle: Some(handle),
            locked,
            associated: true,
        };

        debug!(
            path = %self.path.display(),
            dirty = record.dirty,
            index_rebuild_scheduled = record.index_rebuild_scheduled,
            locked,
            "opened dirty flag marker"
        );
        Ok(())
    }

    /// Returns `true` if the marker file exists.
    ///
    /// Opens and locks nothing, so it is safe before `create` or `open`.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    pub fn exists(&self) -> CoreResult<bool> {
        Ok(self.backend.exists(&self.path)?)
    }

    /// Releases the lock and the handle, leaving the file on disk.
    ///
    /// Flags are left as last written. Call [`clear_dirty`](Self::clear_dirty)
    /// first to record a clean shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released. The handle is closed
    /// regardless.
    pub fn close(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        let Some(handle) = inner.handle.take() else {
            return Ok(());
        };
        let was_locked = std::mem::take(&mut inner.locked);
        inner.state = StoreState::Closed;

        if was_locked {
            handle.unlock()?;
        }
        drop(handle);

        debug!(path = %self.path.display(), "closed dirty flag marker");
        Ok(())
    }

    /// Releases the lock and the handle, then removes the marker file.
    ///
    /// Removal is retried until it succeeds or the file is gone, which
    /// absorbs a concurrent deleter winning the race.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released or existence cannot
    /// be checked.
    pub fn delete(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == StoreState::Unopened && !inner.associated {
            return Ok(());
        }

        if let Some(handle) = inner.handle.take() {
            if std::mem::take(&mut inner.locked) {
                handle.unlock()?;
            }
            drop(handle);
        }
        inner.state = StoreState::Deleted;

        self.remove_until_gone()?;

        debug!(path = %self.path.display(), "deleted dirty flag marker");
        Ok(())
    }

    /// Marks the storage dirty. Call before mutating the storage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreClosed`] if a write is needed and the store
    /// is not open, or the write error.
    pub fn mark_dirty(&self) -> CoreResult<()> {
        self.transition(Flag::Dirty, true)
    }

    /// Marks the storage clean. Call once a consistent, flushed state is reached.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreClosed`] if a write is needed and the store
    /// is not open, or the write error.
    pub fn clear_dirty(&self) -> CoreResult<()> {
        self.transition(Flag::Dirty, false)
    }

    /// Records a pending index rebuild that must survive a crash.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreClosed`] if a write is needed and the store
    /// is not open, or the write error.
    pub fn schedule_index_rebuild(&self) -> CoreResult<()> {
        self.transition(Flag::IndexRebuild, true)
    }

    /// Clears a pending index rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreClosed`] if a write is needed and the store
    /// is not open, or the write error.
    pub fn clear_index_rebuild(&self) -> CoreResult<()> {
        self.transition(Flag::IndexRebuild, false)
    }

    /// Returns the cached dirty flag.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Returns the cached index-rebuild flag.
    #[must_use]
    pub fn is_index_rebuild_scheduled(&self) -> bool {
        self.index_rebuild_scheduled.load(Ordering::Acquire)
    }

    /// Returns both cached flags.
    #[must_use]
    pub fn flags(&self) -> FlagRecord {
        FlagRecord::new(self.is_dirty(), self.is_index_rebuild_scheduled())
    }

    fn cell(&self, flag: Flag) -> &AtomicBool {
        match flag {
            Flag::Dirty => &self.dirty,
            Flag::IndexRebuild => &self.index_rebuild_scheduled,
        }
    }

    fn transition(&self, flag: Flag, value: bool) -> CoreResult<()> {
        let cell = self.cell(flag);
        if cell.load(Ordering::Acquire) == value {
            return Ok(());
        }

        let inner = self.inner.lock();
        // Another thread may have made the change while we waited.
        if cell.load(Ordering::Acquire) == value {
            return Ok(());
        }

        let handle = inner.handle.as_ref().ok_or(CoreError::StoreClosed)?;
        let mut record = self.flags();
        flag.apply(&mut record, value);

        self.persist(handle, record)?;
        cell.store(value, Ordering::Release);

        debug!(path = %self.path.display(), flag = flag.name(), value, "persisted flag transition");
        Ok(())
    }

    fn persist(&self, handle: &B::Handle, record: FlagRecord) -> CoreResult<()> {
        write_full(handle, 0, &record.encode())?;
        if self.config.sync_on_write {
            handle.sync()?;
        }
        Ok(())
    }

    fn publish(&self, record: FlagRecord) {
        self.dirty.store(record.dirty, Ordering::Release);
        self.index_rebuild_scheduled
            .store(record.index_rebuild_scheduled, Ordering::Release);
    }

    fn acquire_lock(&self, handle: &B::Handle) -> CoreResult<bool> {
        if !self.config.file_lock {
            return Ok(false);
        }
        if handle.try_lock_exclusive()? {
            return Ok(true);
        }
        warn!(path = %self.path.display(), "storage is open by another process");
        Err(CoreError::storage_locked(&self.path))
    }

    /// Fails if someone else holds the lock on the file about to be replaced.
    ///
    /// Only observed contention is fatal. A file that cannot be opened or
    /// locked for any other reason is left for `remove` to deal with.
    fn probe_lock(&self) -> CoreResult<()> {
        let handle = match self.backend.open(&self.path) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "skipping lock probe on stale marker");
                return Ok(());
            }
        };

        match handle.try_lock_exclusive() {
            Ok(true) => {
                if let Err(e) = handle.unlock() {
                    debug!(path = %self.path.display(), error = %e, "stale marker unlock failed");
                }
                Ok(())
            }
            Ok(false) => {
                warn!(path = %self.path.display(), "storage is open by another process");
                Err(CoreError::storage_locked(&self.path))
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "skipping lock probe on stale marker");
                Ok(())
            }
        }
    }

    fn remove_until_gone(&self) -> CoreResult<()> {
        let mut attempts = 0u64;
        loop {
            match self.backend.remove(&self.path) {
                Ok(()) | Err(StorageError::NotFound { .. }) => return Ok(()),
                Err(e) => {
                    if !self.backend.exists(&self.path)? {
                        return Ok(());
                    }
                    attempts += 1;
                    if attempts == 1 {
                        warn!(path = %self.path.display(), error = %e, "retrying dirty flag marker removal");
                    }
                }
            }
        }
    }

    fn ensure_not_open(inner: &Inner<B::Handle>, operation: &str) -> CoreResult<()> {
        if inner.state == StoreState::Open {
            return Err(CoreError::invalid_operation(format!(
                "cannot {operation}: dirty flag store is already open"
            )));
        }
        Ok(())
    }
}

impl<B: MarkerBackend> fmt::Debug for DirtyFlagStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyFlagStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("dirty", &self.is_dirty())
            .field("index_rebuild_scheduled", &self.is_index_rebuild_scheduled())
            .finish()
    }
}

/// What a marker file holds, read without modifying or locking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSnapshot {
    /// Layout judged from the file size.
    pub layout: RecordLayout,
    /// File size in bytes; zero when missing.
    pub size: u64,
    /// Decoded flags, or `None` for a missing or empty file.
    pub record: Option<FlagRecord>,
}

/// Reads the marker at `path` without creating, upgrading or locking it.
///
/// Intended for inspection tools running beside a live storage engine.
///
/// # Errors
///
/// Returns [`CoreError::UnexpectedEof`] for a truncated file, or the
/// underlying storage error.
pub fn inspect<B: MarkerBackend>(backend: &B, path: &Path) -> CoreResult<MarkerSnapshot> {
    if !backend.exists(path)? {
        return Ok(MarkerSnapshot {
            layout: RecordLayout::Missing,
            size: 0,
            record: None,
        });
    }

    let handle = match backend.open(path) {
        Ok(handle) => handle,
        Err(StorageError::NotFound { .. }) => {
            return Ok(MarkerSnapshot {
                layout: RecordLayout::Missing,
                size: 0,
                record: None,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let size = handle.size()?;
    let (layout, record) = load(&handle)?;
    Ok(MarkerSnapshot {
        layout,
        size,
        record,
    })
}

/// Reads only the flags of the marker at `path`; see [`inspect`].
///
/// # Errors
///
/// Same as [`inspect`].
pub fn read_record<B: MarkerBackend>(backend: &B, path: &Path) -> CoreResult<Option<FlagRecord>> {
    Ok(inspect(backend, path)?.record)
}

fn load<H: MarkerHandle>(handle: &H) -> CoreResult<(RecordLayout, Option<FlagRecord>)> {
    let layout = RecordLayout::from_size(handle.size()?);
    let mut buf = [0u8; RECORD_SIZE];
    let buf = &mut buf[..layout.read_len()];
    read_full(handle, 0, buf)?;
    Ok((layout, FlagRecord::decode(buf)))
}
