//! Benchmark utilities for dirtymark.

#![warn(missing_docs)]

use dirtymark_core::{Config, CoreResult, DirtyFlagStore};
use dirtymark_storage::InMemoryBackend;
use tempfile::TempDir;

/// Marker file name used by the benchmarks.
pub const MARKER_FILE: &str = "dirty.flag";

/// Creates an open in-memory store.
pub fn memory_store() -> CoreResult<DirtyFlagStore<InMemoryBackend>> {
    let store = DirtyFlagStore::with_backend(InMemoryBackend::new(), MARKER_FILE, Config::new());
    store.create()?;
    Ok(store)
}

/// Creates an open on-disk store in a fresh temporary directory.
///
/// The directory must outlive the store.
pub fn file_store(sync_on_write: bool) -> CoreResult<(TempDir, DirtyFlagStore)> {
    let dir = TempDir::new()?;
    let config = Config::new().sync_on_write(sync_on_write);
    let store = DirtyFlagStore::new(dir.path().join(MARKER_FILE), config);
    store.create()?;
    Ok((dir, store))
}
