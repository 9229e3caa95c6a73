use std::fmt::{self, Display};

use crate::status::EntryStatus;

/// A file as presented to observers of a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanEntry {
    pub path: String,
    pub status: EntryStatus,
}

impl ScanEntry {
    pub fn new(path: impl Into<String>, status: EntryStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// What the scanner is doing right now, reduced to the states a UI renders.
///
/// Exactly one variant is active at a time and it is always derived from the
/// latest engine snapshot alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "state", rename_all = "snake_case")
)]
pub enum ScanState {
    /// Nothing in progress and nothing infected left over.
    #[default]
    Empty,
    /// A scan is active; entries are in engine order.
    Running {
        entries: Vec<ScanEntry>,
        is_paused: bool,
    },
    /// The last scan finished and found infected files.
    VirusesDetected { viruses: Vec<String> },
}

impl ScanState {
    pub fn is_running(&self) -> bool {
        matches!(self, ScanState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            ScanState::Running {
                is_paused: true,
                ..
            }
        )
    }

    /// Infected paths, empty unless the state is [`ScanState::VirusesDetected`].
    pub fn viruses(&self) -> &[String] {
        match self {
            ScanState::VirusesDetected { viruses } => viruses,
            _ => &[],
        }
    }

    /// Entries of a running scan, empty otherwise.
    pub fn entries(&self) -> &[ScanEntry] {
        match self {
            ScanState::Running { entries, .. } => entries,
            _ => &[],
        }
    }

    /// Progress counters for a running scan.
    pub fn progress(&self) -> Option<ScanProgress> {
        match self {
            ScanState::Running { entries, .. } => {
                Some(ScanProgress::from_entries(entries))
            }
            _ => None,
        }
    }
}

impl Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Empty => f.write_str("no scan in progress"),
            ScanState::Running { entries, is_paused } => {
                let progress = ScanProgress::from_entries(entries);
                let label = if *is_paused { "paused" } else { "scanning" };
                write!(
                    f,
                    "{label}: {}/{} files ({} infected, {} failed)",
                    progress.settled(),
                    progress.total,
                    progress.infected,
                    progress.failed
                )
            }
            ScanState::VirusesDetected { viruses } => {
                write!(f, "{} infected file(s) detected", viruses.len())
            }
        }
    }
}

/// Counters summarising a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanProgress {
    pub total: usize,
    pub pending: usize,
    pub clean: usize,
    pub infected: usize,
    pub failed: usize,
}

impl ScanProgress {
    pub fn from_entries(entries: &[ScanEntry]) -> Self {
        entries.iter().fold(
            ScanProgress {
                total: entries.len(),
                ..Default::default()
            },
            |mut acc, entry| {
                match entry.status {
                    EntryStatus::Pending => acc.pending += 1,
                    EntryStatus::ScannedClean => acc.clean += 1,
                    EntryStatus::ScannedInfected => acc.infected += 1,
                    EntryStatus::ScanFailed => acc.failed += 1,
                    EntryStatus::Unknown(_) => {}
                }
                acc
            },
        )
    }

    /// Entries the engine is done with, whatever the outcome.
    pub fn settled(&self) -> usize {
        self.total - self.pending
    }

    /// Completed fraction in `0.0..=1.0`; an empty scan counts as done.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.settled() as f32 / self.total as f32
        }
    }
}
