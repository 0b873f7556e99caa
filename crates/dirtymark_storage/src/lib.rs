//! # dirtymark Storage
//!
//! File-resource abstraction for the dirtymark marker file.
//!
//! This crate is the only place that touches the operating system. The
//! marker state machine in `dirtymark_core` talks to it through two traits:
//!
//! - [`MarkerBackend`] - path-level operations (exists, create, remove, open)
//! - [`MarkerHandle`] - an open file: positioned I/O, sync, advisory locking
//!
//! Transfers are single calls and may be short. Callers that need a whole
//! buffer moved must loop.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - OS files with `flock`-style advisory locks
//! - [`InMemoryBackend`] - For testing, with fault injection
//!
//! ## Example
//!
//! ```rust
//! use dirtymark_storage::{InMemoryBackend, MarkerBackend, MarkerHandle};
//! use std::path::Path;
//!
//! let backend = InMemoryBackend::new();
//! let path = Path::new("dirty.flag");
//! backend.create_new(path).unwrap();
//!
//! let handle = backend.open(path).unwrap();
//! assert_eq!(handle.write_at(0, &[1, 0]).unwrap(), 2);
//! assert!(handle.try_lock_exclusive().unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{MarkerBackend, MarkerHandle};
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileHandle};
pub use memory::{InMemoryBackend, InMemoryHandle};
