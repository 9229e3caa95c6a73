use crate::status::{EntryStatus, ScannerStatus};

/// One file tracked by the engine cache, with its raw status id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawScanEntry {
    pub path: String,
    pub status_id: u8,
}

impl RawScanEntry {
    pub fn new(path: impl Into<String>, status: EntryStatus) -> Self {
        Self {
            path: path.into(),
            status_id: status.id(),
        }
    }

    pub fn status(&self) -> EntryStatus {
        EntryStatus::from_id(self.status_id)
    }
}

/// Point-in-time view of the engine's scanner cache.
///
/// The engine replaces the whole snapshot on every change; consumers only
/// ever read it. Entries keep the order in which the engine reported them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawScanSnapshot {
    pub scanner_status: u8,
    pub entries: Vec<RawScanEntry>,
}

impl RawScanSnapshot {
    pub fn new(status: ScannerStatus, entries: Vec<RawScanEntry>) -> Self {
        Self {
            scanner_status: status.id(),
            entries,
        }
    }

    /// Resolved scanner status, `None` for ids this build does not know.
    pub fn status(&self) -> Option<ScannerStatus> {
        ScannerStatus::from_id(self.scanner_status)
    }

    /// Copy of this snapshot with a different scanner status, entries kept.
    pub fn with_status(&self, status: ScannerStatus) -> Self {
        Self {
            scanner_status: status.id(),
            entries: self.entries.clone(),
        }
    }
}
