use std::fmt::{self, Display};

/// Coarse lifecycle of the engine's scanner, as reported in the cache snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScannerStatus {
    Idle,
    Scanning,
    Paused,
    Completed,
}

impl ScannerStatus {
    pub const IDLE_ID: u8 = 0;
    pub const SCANNING_ID: u8 = 1;
    pub const PAUSED_ID: u8 = 2;
    pub const COMPLETED_ID: u8 = 3;

    /// Wire id used by the engine for this status.
    pub const fn id(self) -> u8 {
        match self {
            ScannerStatus::Idle => Self::IDLE_ID,
            ScannerStatus::Scanning => Self::SCANNING_ID,
            ScannerStatus::Paused => Self::PAUSED_ID,
            ScannerStatus::Completed => Self::COMPLETED_ID,
        }
    }

    /// Resolve a wire id. Unrecognised ids yield `None`; callers decide how
    /// conservative to be about them.
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            Self::IDLE_ID => Some(ScannerStatus::Idle),
            Self::SCANNING_ID => Some(ScannerStatus::Scanning),
            Self::PAUSED_ID => Some(ScannerStatus::Paused),
            Self::COMPLETED_ID => Some(ScannerStatus::Completed),
            _ => None,
        }
    }

    /// True while the engine holds an active (possibly paused) scan.
    pub const fn is_active(self) -> bool {
        matches!(self, ScannerStatus::Scanning | ScannerStatus::Paused)
    }
}

impl Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScannerStatus::Idle => "idle",
            ScannerStatus::Scanning => "scanning",
            ScannerStatus::Paused => "paused",
            ScannerStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Per-file scan outcome as tracked by the engine cache.
///
/// Ids the engine may add later are preserved in [`EntryStatus::Unknown`]
/// rather than being collapsed into one of the known variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntryStatus {
    Pending,
    ScannedClean,
    ScannedInfected,
    ScanFailed,
    Unknown(u8),
}

impl EntryStatus {
    pub const PENDING_ID: u8 = 0;
    pub const SCANNED_CLEAN_ID: u8 = 1;
    pub const SCANNED_INFECTED_ID: u8 = 2;
    pub const SCAN_FAILED_ID: u8 = 3;

    pub const fn id(self) -> u8 {
        match self {
            EntryStatus::Pending => Self::PENDING_ID,
            EntryStatus::ScannedClean => Self::SCANNED_CLEAN_ID,
            EntryStatus::ScannedInfected => Self::SCANNED_INFECTED_ID,
            EntryStatus::ScanFailed => Self::SCAN_FAILED_ID,
            EntryStatus::Unknown(id) => id,
        }
    }

    pub const fn from_id(id: u8) -> Self {
        match id {
            Self::PENDING_ID => EntryStatus::Pending,
            Self::SCANNED_CLEAN_ID => EntryStatus::ScannedClean,
            Self::SCANNED_INFECTED_ID => EntryStatus::ScannedInfected,
            Self::SCAN_FAILED_ID => EntryStatus::ScanFailed,
            other => EntryStatus::Unknown(other),
        }
    }

    pub const fn is_infected(self) -> bool {
        matches!(self, EntryStatus::ScannedInfected)
    }

    /// Whether the engine has finished looking at this entry.
    pub const fn is_settled(self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => f.write_str("pending"),
            EntryStatus::ScannedClean => f.write_str("clean"),
            EntryStatus::ScannedInfected => f.write_str("infected"),
            EntryStatus::ScanFailed => f.write_str("failed"),
            EntryStatus::Unknown(id) => write!(f, "unknown({id})"),
        }
    }
}
