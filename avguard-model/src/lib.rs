//! Core data model definitions shared across avguard crates.
#![allow(missing_docs)]

pub mod error;
pub mod failure;
pub mod protection;
pub mod snapshot;
pub mod state;
pub mod status;

pub use error::{ModelError, Result as ModelResult};
pub use failure::EngineFailure;
pub use protection::ProtectionStatus;
pub use snapshot::{RawScanEntry, RawScanSnapshot};
pub use state::{ScanEntry, ScanProgress, ScanState};
pub use status::{EntryStatus, ScannerStatus};
