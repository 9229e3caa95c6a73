use std::sync::Arc;

use avguard_model::RawScanSnapshot;
use tokio::sync::watch;

use super::SnapshotReceiver;

/// Shared, replace-on-write cell holding the engine's latest scanner snapshot.
///
/// Only the engine side writes; any number of readers can take the current
/// value synchronously or subscribe for replacements.
#[derive(Clone, Debug)]
pub struct SnapshotCell {
    sender: Arc<watch::Sender<Option<RawScanSnapshot>>>,
}

impl SnapshotCell {
    /// Cell with no snapshot, as at engine startup.
    pub fn new() -> Self {
        Self::with_snapshot(None)
    }

    pub fn with_snapshot(snapshot: Option<RawScanSnapshot>) -> Self {
        let (sender, _) = watch::channel(snapshot);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> Option<RawScanSnapshot> {
        self.sender.borrow().clone()
    }

    /// Subscribe to replacements. The value present at subscription time is
    /// marked as seen.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.sender.subscribe()
    }

    /// Replace the snapshot and notify subscribers.
    pub fn publish(&self, snapshot: Option<RawScanSnapshot>) {
        // Stored even when nobody is subscribed yet.
        self.sender.send_replace(snapshot);
    }

    /// Edit the current snapshot in place, notifying only if `edit` reports a
    /// change.
    pub fn update<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Option<RawScanSnapshot>) -> bool,
    {
        self.sender.send_if_modified(edit)
    }

    /// Whether the held snapshot reports a scanning or paused scanner.
    pub fn scan_active(&self) -> bool {
        self.sender
            .borrow()
            .as_ref()
            .and_then(RawScanSnapshot::status)
            .is_some_and(|status| status.is_active())
    }

    /// Number of live subscriptions.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
