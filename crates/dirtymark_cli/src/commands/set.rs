//! Flag maintenance commands.

use dirtymark_core::{Config, CoreResult, DirtyFlagStore};
use std::path::Path;
use tracing::info;

/// A manual flag transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Set the dirty flag.
    MarkDirty,
    /// Clear the dirty flag.
    MarkClean,
    /// Set the index-rebuild flag.
    ScheduleRebuild,
    /// Clear the index-rebuild flag.
    ClearRebuild,
}

impl Transition {
    /// Returns the command name of this transition.
    pub fn name(self) -> &'static str {
        match self {
            Self::MarkDirty => "mark-dirty",
            Self::MarkClean => "mark-clean",
            Self::ScheduleRebuild => "schedule-rebuild",
            Self::ClearRebuild => "clear-rebuild",
        }
    }

    fn apply(self, store: &DirtyFlagStore) -> CoreResult<()> {
        match self {
            Self::MarkDirty => store.mark_dirty(),
            Self::MarkClean => store.clear_dirty(),
            Self::ScheduleRebuild => store.schedule_index_rebuild(),
            Self::ClearRebuild => store.clear_index_rebuild(),
        }
    }
}

/// Opens the marker with locking, applies `transition` and closes it.
pub fn run(path: &Path, transition: Transition) -> Result<(), Box<dyn std::error::Error>> {
    info!("Applying {} to {:?}", transition.name(), path);

    let store = DirtyFlagStore::new(path, Config::new());
    if !store.exists()? {
        return Err(format!("No marker found at {:?}", path).into());
    }
    store.open()?;
    let applied = transition.apply(&store);
    store.close()?;
    applied?;

    println!(
        "dirty={} index_rebuild_scheduled={}",
        store.is_dirty(),
        store.is_index_rebuild_scheduled()
    );
    Ok(())
}

/// Replaces the marker with a fresh one and records a clean state.
pub fn reset(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Resetting marker {:?}", path);

    let store = DirtyFlagStore::new(path, Config::new());
    store.create()?;
    let cleared = store.clear_dirty();
    store.close()?;
    cleared?;

    println!("Marker reset: {}", path.display());
    Ok(())
}
