//! Dirty flag store configuration.

/// Configuration for a [`DirtyFlagStore`](crate::DirtyFlagStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to take the exclusive advisory lock on create and open.
    pub file_lock: bool,

    /// Whether to sync the marker file after every record write.
    pub sync_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_lock: true,
            sync_on_write: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for inspection tools that must not contend for the lock.
    #[must_use]
    pub fn read_only() -> Self {
        Self::default().file_lock(false)
    }

    /// Sets whether to take the advisory lock.
    #[must_use]
    pub const fn file_lock(mut self, value: bool) -> Self {
        self.file_lock = value;
        self
    }

    /// Sets whether to sync after every record write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}
