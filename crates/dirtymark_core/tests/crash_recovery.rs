//! Crash simulation for the dirty flag store.
//!
//! A crash is modelled by dropping the store without `clear_dirty` and
//! `close`: the OS closes the handle and drops the lock, and whatever was
//! last written stays on disk.

use dirtymark_core::{read_record, Config, DirtyFlagStore, FlagRecord};
use dirtymark_storage::FileBackend;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn crash_before_first_clean_close_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dirty.flag");

    {
        let store = DirtyFlagStore::new(&path, Config::new());
        store.create().unwrap();
        // crash
    }

    let store = DirtyFlagStore::new(&path, Config::new());
    store.open().unwrap();
    assert!(store.is_dirty());
}

#[test]
fn crash_mid_operation_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dirty.flag");

    {
        let store = DirtyFlagStore::new(&path, Config::new());
        store.create().unwrap();
        store.clear_dirty().unwrap();
        store.close().unwrap();
    }

    {
        let store = DirtyFlagStore::new(&path, Config::new());
        store.open().unwrap();
        assert!(!store.is_dirty());
        store.mark_dirty().unwrap();
        // crash
    }

    let store = DirtyFlagStore::new(&path, Config::new());
    store.open().unwrap();
    assert!(store.is_dirty());
}

#[test]
fn scheduled_rebuild_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dirty.flag");

    {
        let store = DirtyFlagStore::new(&path, Config::new());
        store.create().unwrap();
        store.schedule_index_rebuild().unwrap();
        store.clear_dirty().unwrap();
        // crash
    }

    let record = read_record(&FileBackend::new(), &path).unwrap();
    assert_eq!(record, Some(FlagRecord::new(false, true)));
}

#[test]
fn clean_shutdown_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dirty.flag");

    {
        let store = DirtyFlagStore::new(&path, Config::new());
        store.create().unwrap();
        store.mark_dirty().unwrap();
        store.clear_dirty().unwrap();
        store.close().unwrap();
    }

    let store = DirtyFlagStore::new(&path, Config::new());
    store.open().unwrap();
    assert!(!store.is_dirty());
    assert!(!store.is_index_rebuild_scheduled());
}

#[test]
fn concurrent_writers_leave_consistent_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dirty.flag");

    let store = Arc::new(DirtyFlagStore::new(&path, Config::new()));
    store.create().unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..50 {
                    if (i + round) % 2 == 0 {
                        store.mark_dirty().unwrap();
                        store.schedule_index_rebuild().unwrap();
                    } else {
                        store.clear_dirty().unwrap();
                        store.clear_index_rebuild().unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let cached = store.flags();
    store.close().unwrap();

    let on_disk = read_record(&FileBackend::new(), &path).unwrap();
    assert_eq!(on_disk, Some(cached));
}
