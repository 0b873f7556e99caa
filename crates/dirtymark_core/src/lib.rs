//! # dirtymark Core
//!
//! Crash-detection marker for disk-backed storage engines.
//!
//! This crate provides:
//! - [`DirtyFlagStore`], the persisted dirty / index-rebuild flags
//! - [`FlagRecord`], the two-byte on-disk record and its legacy variant
//! - Full-transfer read and write loops over a marker handle
//! - [`Config`] for locking and durability policy
//!
//! A storage engine opens the store at startup, checks [`DirtyFlagStore::is_dirty`]
//! to decide on recovery, calls [`DirtyFlagStore::mark_dirty`] before each
//! mutation and [`DirtyFlagStore::clear_dirty`] once it reaches a flushed,
//! consistent state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod io;
pub mod record;
mod store;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use record::{FlagRecord, RecordLayout, LEGACY_RECORD_SIZE, RECORD_SIZE};
pub use store::{inspect, read_record, DirtyFlagStore, MarkerSnapshot, StoreState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
