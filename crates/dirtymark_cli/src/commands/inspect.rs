//! Inspect command implementation.

use dirtymark_core::{inspect, MarkerSnapshot};
use dirtymark_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// Marker inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Marker file path.
    pub path: String,
    /// Whether the file exists.
    pub exists: bool,
    /// On-disk layout (missing, empty, legacy, current).
    pub layout: String,
    /// File size in bytes.
    pub size: u64,
    /// Dirty flag, if a record is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
    /// Index-rebuild flag, if a record is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_rebuild_scheduled: Option<bool>,
    /// Whether the storage engine would run recovery on open.
    pub recovery_needed: bool,
    /// Whether the storage engine would rebuild indexes on open.
    pub rebuild_needed: bool,
}

impl InspectResult {
    fn new(path: &Path, snapshot: &MarkerSnapshot) -> Self {
        let record = snapshot.record;
        Self {
            path: path.display().to_string(),
            exists: snapshot.layout != dirtymark_core::RecordLayout::Missing,
            layout: snapshot.layout.as_str().to_string(),
            size: snapshot.size,
            dirty: record.map(|r| r.dirty),
            index_rebuild_scheduled: record.map(|r| r.index_rebuild_scheduled),
            recovery_needed: record.is_some_and(|r| r.dirty),
            rebuild_needed: record.is_some_and(|r| r.index_rebuild_scheduled),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = inspect(&FileBackend::new(), path)?;
    let result = InspectResult::new(path, &snapshot);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("dirtymark Marker Inspection");
    println!("===========================");
    println!();
    println!("Path:   {}", result.path);
    println!("Layout: {} ({} bytes)", result.layout, result.size);
    println!();
    println!("Flags:");
    println!("  Dirty:                   {}", format_flag(result.dirty));
    println!(
        "  Index rebuild scheduled: {}",
        format_flag(result.index_rebuild_scheduled)
    );
    println!();
    println!("On next open:");
    println!("  Recovery:      {}", yes_no(result.recovery_needed));
    println!("  Index rebuild: {}", yes_no(result.rebuild_needed));
}

fn format_flag(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "set",
        Some(false) => "clear",
        None => "-",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirtymark_core::{FlagRecord, RecordLayout};

    #[test]
    fn result_for_missing_marker() {
        let snapshot = MarkerSnapshot {
            layout: RecordLayout::Missing,
            size: 0,
            record: None,
        };
        let result = InspectResult::new(Path::new("dirty.flag"), &snapshot);

        assert!(!result.exists);
        assert_eq!(result.layout, "missing");
        assert!(!result.recovery_needed);

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("\"dirty\""));
    }

    #[test]
    fn result_for_dirty_marker() {
        let snapshot = MarkerSnapshot {
            layout: RecordLayout::Current,
            size: 2,
            record: Some(FlagRecord::new(true, true)),
        };
        let result = InspectResult::new(Path::new("dirty.flag"), &snapshot);

        assert!(result.exists);
        assert_eq!(result.dirty, Some(true));
        assert!(result.recovery_needed);
        assert!(result.rebuild_needed);
    }

    #[test]
    fn flag_formatting() {
        assert_eq!(format_flag(Some(true)), "set");
        assert_eq!(format_flag(Some(false)), "clear");
        assert_eq!(format_flag(None), "-");
    }
}
