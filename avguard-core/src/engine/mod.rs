//! Port to the antivirus engine.
//!
//! The engine is reached through an asynchronous request/response transport
//! plus a continuously-updated scanner cache. Everything the core needs from
//! it is captured by [`EngineApi`]; transports, retries and the cache format
//! live behind implementations of that trait.

use async_trait::async_trait;
use avguard_model::{EngineFailure, RawScanSnapshot};
use tokio::sync::watch;

pub mod snapshot_cell;
#[cfg(feature = "simulator")]
pub mod simulated;

pub use snapshot_cell::SnapshotCell;
#[cfg(feature = "simulator")]
pub use simulated::SimulatedEngine;

/// Receiver side of the engine's scanner cache. `None` until a scan has run.
pub type SnapshotReceiver = watch::Receiver<Option<RawScanSnapshot>>;

/// Outcome of a single engine request.
pub type EngineResult<T> = std::result::Result<T, EngineFailure>;

/// Requests understood by the engine, one round trip each.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Raw protection-status body; `None` when the engine sent no body.
    async fn is_protection_enabled(&self) -> EngineResult<Option<Vec<u8>>>;

    async fn enable_protection(&self) -> EngineResult<()>;

    async fn disable_protection(&self) -> EngineResult<()>;

    async fn start_scan(&self, path: &str) -> EngineResult<()>;

    async fn pause_scan(&self) -> EngineResult<()>;

    async fn resume_scan(&self) -> EngineResult<()>;

    async fn stop_scan(&self) -> EngineResult<()>;

    /// Subscribe to the scanner cache. The receiver can be read synchronously
    /// for the current snapshot and awaited for subsequent replacements.
    fn scanner_snapshots(&self) -> SnapshotReceiver;
}
