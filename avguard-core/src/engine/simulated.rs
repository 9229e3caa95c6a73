//! In-process engine that scans real files against byte signatures.
//!
//! Used by `avguardctl` and the integration tests in place of the native
//! engine. Snapshots are replaced after every file, which produces the same
//! bursty cache traffic the real engine does.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use avguard_model::{
    EngineFailure, EntryStatus, ProtectionStatus, RawScanEntry,
    RawScanSnapshot, ScannerStatus,
};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{EngineApi, EngineResult, SnapshotCell, SnapshotReceiver};
use crate::config::SimulatorConfig;

pub const SCAN_ALREADY_RUNNING: i32 = 1;
pub const NO_ACTIVE_SCAN: i32 = 2;
pub const PATH_NOT_FOUND: i32 = 3;
pub const INTERNAL_FAILURE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanControl {
    Run,
    Pause,
    Stop,
}

#[derive(Debug)]
struct ActiveScan {
    control: watch::Sender<ScanControl>,
    task: JoinHandle<()>,
}

impl ActiveScan {
    /// A scan stays live until it has published a settled snapshot or has
    /// been told to stop.
    fn is_live(&self, snapshots: &SnapshotCell) -> bool {
        !self.task.is_finished()
            && *self.control.borrow() != ScanControl::Stop
            && snapshots.scan_active()
    }
}

#[derive(Debug)]
struct Inner {
    config: Arc<SimulatorConfig>,
    snapshots: SnapshotCell,
    protection: AtomicBool,
    scan: Mutex<Option<ActiveScan>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.scan.get_mut().take() {
            active.task.abort();
        }
    }
}

/// Simulated antivirus engine.
#[derive(Clone, Debug)]
pub struct SimulatedEngine {
    inner: Arc<Inner>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                snapshots: SnapshotCell::new(),
                protection: AtomicBool::new(false),
                scan: Mutex::new(None),
            }),
        }
    }

    /// The cache this engine writes to.
    pub fn snapshots(&self) -> &SnapshotCell {
        &self.inner.snapshots
    }

    /// Wait until the cache no longer reports an active scan. A paused scan
    /// has to be resumed or stopped from elsewhere for this to return.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.snapshots.subscribe();
        let settled = rx
            .wait_for(|snapshot| {
                snapshot
                    .as_ref()
                    .and_then(RawScanSnapshot::status)
                    .is_none_or(|status| !status.is_active())
            })
            .await;
        if settled.is_err() {
            warn!("snapshot cell closed while waiting for scan to settle");
        }
    }

    async fn signal(&self, control: ScanControl) -> EngineResult<()> {
        let guard = self.inner.scan.lock().await;
        let snapshots = &self.inner.snapshots;
        let Some(active) =
            guard.as_ref().filter(|active| active.is_live(snapshots))
        else {
            return Err(EngineFailure::new(
                "no scan is currently running",
                NO_ACTIVE_SCAN,
            ));
        };
        active.control.send_replace(control);

        let status = match control {
            ScanControl::Run => Some(ScannerStatus::Scanning),
            ScanControl::Pause => Some(ScannerStatus::Paused),
            // The scan task publishes the final snapshot itself.
            ScanControl::Stop => None,
        };
        if let Some(status) = status {
            snapshots.update(|snapshot| match snapshot {
                Some(snapshot)
                    if snapshot.status().is_some_and(|s| s.is_active())
                        && snapshot.scanner_status != status.id() =>
                {
                    snapshot.scanner_status = status.id();
                    true
                }
                _ => false,
            });
        }
        Ok(())
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

#[async_trait]
impl EngineApi for SimulatedEngine {
    async fn is_protection_enabled(&self) -> EngineResult<Option<Vec<u8>>> {
        let enabled = self.inner.protection.load(Ordering::Acquire);
        Ok(Some(ProtectionStatus::from(enabled).encode()))
    }

    async fn enable_protection(&self) -> EngineResult<()> {
        self.inner.protection.store(true, Ordering::Release);
        info!("protection enabled");
        Ok(())
    }

    async fn disable_protection(&self) -> EngineResult<()> {
        self.inner.protection.store(false, Ordering::Release);
        info!("protection disabled");
        Ok(())
    }

    async fn start_scan(&self, path: &str) -> EngineResult<()> {
        let mut guard = self.inner.scan.lock().await;
        if guard
            .as_ref()
            .is_some_and(|active| active.is_live(&self.inner.snapshots))
        {
            return Err(EngineFailure::new(
                "a scan is already running",
                SCAN_ALREADY_RUNNING,
            ));
        }

        // A stopping scan still owns the cell until its final publish.
        if let Some(previous) = guard.take()
            && let Err(err) = previous.task.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "previous simulated scan failed");
        }

        let root = PathBuf::from(path);
        if !root.exists() {
            return Err(EngineFailure::new(
                format!("path not found: {path}"),
                PATH_NOT_FOUND,
            ));
        }

        let files = tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|err| {
                EngineFailure::new(
                    format!("failed to enumerate files: {err}"),
                    INTERNAL_FAILURE,
                )
            })?;

        let snapshot = RawScanSnapshot::new(
            ScannerStatus::Scanning,
            files
                .iter()
                .map(|file| {
                    RawScanEntry::new(
                        file.display().to_string(),
                        EntryStatus::Pending,
                    )
                })
                .collect(),
        );
        self.inner.snapshots.publish(Some(snapshot.clone()));
        info!(path, files = files.len(), "simulated scan started");

        let (control, control_rx) = watch::channel(ScanControl::Run);
        let task = tokio::spawn(run_scan(
            files,
            snapshot,
            self.inner.snapshots.clone(),
            Arc::clone(&self.inner.config),
            control_rx,
        ));
        *guard = Some(ActiveScan { control, task });
        Ok(())
    }

    async fn pause_scan(&self) -> EngineResult<()> {
        self.signal(ScanControl::Pause).await
    }

    async fn resume_scan(&self) -> EngineResult<()> {
        self.signal(ScanControl::Run).await
    }

    async fn stop_scan(&self) -> EngineResult<()> {
        self.signal(ScanControl::Stop).await
    }

    fn scanner_snapshots(&self) -> SnapshotReceiver {
        self.inner.snapshots.subscribe()
    }
}

async fn run_scan(
    files: Vec<PathBuf>,
    mut snapshot: RawScanSnapshot,
    snapshots: SnapshotCell,
    config: Arc<SimulatorConfig>,
    mut control: watch::Receiver<ScanControl>,
) {
    for (idx, file) in files.into_iter().enumerate() {
        loop {
            let current = *control.borrow_and_update();
            match current {
                ScanControl::Run => break,
                ScanControl::Stop => {
                    snapshot.scanner_status = ScannerStatus::Idle.id();
                    snapshots.publish(Some(snapshot));
                    info!(scanned = idx, "simulated scan stopped");
                    return;
                }
                ScanControl::Pause => {
                    if control.changed().await.is_err() {
                        return;
                    }
                }
            }
        }

        let config_for_file = Arc::clone(&config);
        let status = tokio::task::spawn_blocking(move || {
            inspect_file(&file, &config_for_file)
        })
        .await
        .unwrap_or(EntryStatus::ScanFailed);

        if !config.per_file_delay().is_zero() {
            time::sleep(config.per_file_delay()).await;
        }

        snapshot.entries[idx].status_id = status.id();
        debug!(path = %snapshot.entries[idx].path, %status, "file scanned");
        // Read under the cell's write lock; a concurrent pause must win.
        snapshots.update(|current| {
            snapshot.scanner_status = match *control.borrow() {
                ScanControl::Pause => ScannerStatus::Paused.id(),
                _ => ScannerStatus::Scanning.id(),
            };
            *current = Some(snapshot.clone());
            true
        });
    }

    snapshot.scanner_status = ScannerStatus::Completed.id();
    let infected = snapshot
        .entries
        .iter()
        .filter(|entry| entry.status().is_infected())
        .count();
    snapshots.publish(Some(snapshot));
    info!(infected, "simulated scan completed");
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn inspect_file(path: &Path, config: &SimulatorConfig) -> EntryStatus {
    let mut buffer = Vec::new();
    let read = fs::File::open(path).and_then(|file| {
        file.take(config.max_file_bytes).read_to_end(&mut buffer)
    });
    if let Err(err) = read {
        debug!(path = %path.display(), error = %err, "file could not be read");
        return EntryStatus::ScanFailed;
    }

    let infected = config
        .signatures
        .iter()
        .map(String::as_bytes)
        .filter(|signature| !signature.is_empty())
        .any(|signature| {
            buffer.windows(signature.len()).any(|window| window == signature)
        });

    if infected {
        EntryStatus::ScannedInfected
    } else {
        EntryStatus::ScannedClean
    }
}
