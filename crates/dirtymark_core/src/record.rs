//! Marker record layout and serialization.
//!
//! ```text
//! offset 0: dirty flag               (0 = clean, nonzero = dirty)
//! offset 1: index rebuild scheduled  (0 = no, nonzero = yes)
//! ```
//!
//! Older files carry only the first byte. They decode with the rebuild flag
//! cleared and are rewritten in the current layout on open.

/// Size of a record in the current layout.
pub const RECORD_SIZE: usize = 2;

/// Size of a record in the legacy single-flag layout.
pub const LEGACY_RECORD_SIZE: usize = 1;

/// The two persisted flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagRecord {
    /// The storage was not known to be consistent at last observation.
    pub dirty: bool,
    /// An index rebuild is pending.
    pub index_rebuild_scheduled: bool,
}

impl FlagRecord {
    /// State written by a fresh `create`.
    pub const CREATED: Self = Self {
        dirty: true,
        index_rebuild_scheduled: false,
    };

    /// State written when a missing or empty marker is initialized on open.
    pub const CLEAN: Self = Self {
        dirty: false,
        index_rebuild_scheduled: false,
    };

    /// Creates a record from its two flags.
    #[must_use]
    pub const fn new(dirty: bool, index_rebuild_scheduled: bool) -> Self {
        Self {
            dirty,
            index_rebuild_scheduled,
        }
    }

    /// Encodes the record in the current layout.
    #[must_use]
    pub const fn encode(self) -> [u8; RECORD_SIZE] {
        [self.dirty as u8, self.index_rebuild_scheduled as u8]
    }

    /// Decodes a record from raw file contents.
    ///
    /// One byte is the legacy layout; two or more bytes are the current
    /// layout and anything past the second byte is ignored. Returns `None`
    /// for empty input.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [] => None,
            [dirty] => Some(Self::new(*dirty != 0, false)),
            [dirty, rebuild, ..] => Some(Self::new(*dirty != 0, *rebuild != 0)),
        }
    }
}

/// How a marker file on disk is laid out, judged from its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// No file at the path.
    Missing,
    /// A file with no bytes; needs default initialization.
    Empty,
    /// A single dirty byte.
    Legacy,
    /// Both flags present.
    Current,
}

impl RecordLayout {
    /// Classifies an existing file by its size in bytes.
    #[must_use]
    pub const fn from_size(size: u64) -> Self {
        match size {
            0 => Self::Empty,
            1 => Self::Legacy,
            _ => Self::Current,
        }
    }

    /// Number of bytes to read for this layout.
    #[must_use]
    pub const fn read_len(self) -> usize {
        match self {
            Self::Missing | Self::Empty => 0,
            Self::Legacy => LEGACY_RECORD_SIZE,
            Self::Current => RECORD_SIZE,
        }
    }

    /// Returns the lowercase name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Empty => "empty",
            Self::Legacy => "legacy",
            Self::Current => "current",
        }
    }
}
