//! Scan state synthesis.
//!
//! The engine cache can be replaced once per scanned file. Observers only care
//! about a handful of states, so each snapshot is classified and the results
//! are debounced before being shared.
//!
//! Two pieces cooperate:
//! - the engine's snapshot cell, which always holds the latest raw snapshot
//!   and lets a new observer classify it on the spot, and
//! - a debounced `watch` channel fed by a single background task, which
//!   carries every later change.
//!
//! A new observer therefore gets the current state immediately, without
//! waiting out the debounce window, and then the debounced sequence.

use std::time::Duration;

use async_stream::stream;
use avguard_model::ScanState;
use futures::Stream;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod classify;
mod debounce;

pub use classify::classify;

use crate::engine::SnapshotReceiver;

/// Quiescence window used when none is configured.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Shared, eagerly started source of classified scan states.
///
/// Dropping the synthesizer, calling [`ScanStateSynthesizer::shutdown`], or
/// cancelling the parent scope stops the background task and releases its
/// snapshot subscription.
#[derive(Debug)]
pub struct ScanStateSynthesizer {
    source: SnapshotReceiver,
    states: watch::Receiver<ScanState>,
    scope: CancellationToken,
    task: Option<JoinHandle<()>>,
    window: Duration,
}

impl ScanStateSynthesizer {
    /// Subscribe to `source` and start debouncing right away.
    ///
    /// Must be called from within a Tokio runtime. `scope` is not cancelled
    /// by the synthesizer itself; a child token is used internally.
    pub fn spawn(
        source: SnapshotReceiver,
        window: Duration,
        scope: &CancellationToken,
    ) -> Self {
        let initial = classify(source.borrow().as_ref());
        let (state_tx, states) = watch::channel(initial);
        let scope = scope.child_token();

        let task = tokio::spawn(debounce::debounce_scan_states(
            source.clone(),
            state_tx,
            window,
            scope.clone(),
        ));
        debug!(window_ms = window.as_millis() as u64, "scan state synthesizer started");

        Self {
            source,
            states,
            scope,
            task: Some(task),
            window,
        }
    }

    /// Classification of the snapshot the engine holds right now.
    pub fn current(&self) -> ScanState {
        classify(self.source.borrow().as_ref())
    }

    /// Last state that made it through the debounce window.
    pub fn published(&self) -> ScanState {
        self.states.borrow().clone()
    }

    /// Attach a new observer. Its first value is [`Self::current`].
    pub fn observe(&self) -> ScanStateObserver {
        let mut states = self.states.clone();
        states.mark_unchanged();

        ScanStateObserver {
            first: Some(self.current()),
            last: None,
            states,
            scope: self.scope.clone(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop debouncing. Observers drain and then end.
    pub fn shutdown(&self) {
        self.scope.cancel();
    }

    /// Wait for the background task to exit after a shutdown or a cancelled
    /// scope.
    pub async fn stopped(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(err) = task.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "scan state task failed");
        }
    }
}

impl Drop for ScanStateSynthesizer {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// One observer's view of a [`ScanStateSynthesizer`].
///
/// Yields the current state first, then each debounced change. Consecutive
/// equal states are delivered once.
#[derive(Debug)]
pub struct ScanStateObserver {
    first: Option<ScanState>,
    last: Option<ScanState>,
    states: watch::Receiver<ScanState>,
    scope: CancellationToken,
}

impl ScanStateObserver {
    /// Next state, or `None` once the synthesizer has stopped.
    pub async fn next(&mut self) -> Option<ScanState> {
        if let Some(first) = self.first.take() {
            self.last = Some(first.clone());
            return Some(first);
        }

        loop {
            tokio::select! {
                biased;

                _ = self.scope.cancelled() => return None,

                changed = self.states.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    let state = self.states.borrow_and_update().clone();
                    if self.last.as_ref() == Some(&state) {
                        continue;
                    }
                    self.last = Some(state.clone());
                    return Some(state);
                }
            }
        }
    }

    /// Adapt the observer into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = ScanState> + Send {
        let mut observer = self;
        stream! {
            while let Some(state) = observer.next().await {
                yield state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SnapshotCell;
    use avguard_model::{EntryStatus, RawScanEntry, RawScanSnapshot, ScannerStatus};
    use futures::StreamExt;
    use tokio::time::{self, timeout};

    const WINDOW: Duration = Duration::from_millis(500);

    fn scanning(done: usize, total: usize) -> RawScanSnapshot {
        RawScanSnapshot::new(
            ScannerStatus::Scanning,
            (0..total)
                .map(|idx| {
                    let status = if idx < done {
                        EntryStatus::ScannedClean
                    } else {
                        EntryStatus::Pending
                    };
                    RawScanEntry::new(format!("file-{idx}"), status)
                })
                .collect(),
        )
    }

    fn infected_idle() -> RawScanSnapshot {
        RawScanSnapshot::new(
            ScannerStatus::Idle,
            vec![
                RawScanEntry::new("a.txt", EntryStatus::ScannedInfected),
                RawScanEntry::new("b.txt", EntryStatus::ScannedClean),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_snapshot() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        assert_eq!(observer.next().await, Some(ScanState::Empty));

        for done in 0..=10 {
            cell.publish(Some(scanning(done, 10)));
            time::sleep(Duration::from_millis(20)).await;
        }

        let delivered = timeout(Duration::from_secs(2), observer.next())
            .await
            .expect("debounced state delivered");
        assert_eq!(delivered, Some(classify(Some(&scanning(10, 10)))));

        let extra = timeout(Duration::from_secs(5), observer.next()).await;
        assert!(extra.is_err(), "burst must produce exactly one emission");
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_delivered_before_quiescence() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        observer.next().await;

        cell.publish(Some(scanning(0, 2)));
        time::sleep(Duration::from_millis(400)).await;
        cell.publish(Some(scanning(1, 2)));
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(synth.published(), ScanState::Empty);

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(synth.published(), classify(Some(&scanning(1, 2))));
    }

    #[tokio::test(start_paused = true)]
    async fn new_observer_gets_current_state_before_debounce() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);

        cell.publish(Some(infected_idle()));
        assert_eq!(synth.published(), ScanState::Empty);

        let mut late = synth.observe();
        assert_eq!(
            late.next().await,
            Some(ScanState::VirusesDetected {
                viruses: vec!["a.txt".into()],
            })
        );

        // The debounced copy of the same state is not repeated.
        let repeat = timeout(Duration::from_secs(5), late.next()).await;
        assert!(repeat.is_err());
        assert_eq!(synth.published(), classify(Some(&infected_idle())));
    }

    #[tokio::test(start_paused = true)]
    async fn late_observer_sees_return_to_published_state() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);

        cell.publish(Some(scanning(0, 1)));
        let mut late = synth.observe();
        assert!(late.next().await.unwrap().is_running());
        assert_eq!(synth.published(), ScanState::Empty);

        let clean = RawScanSnapshot::new(
            ScannerStatus::Completed,
            vec![RawScanEntry::new("file-0", EntryStatus::ScannedClean)],
        );
        cell.publish(Some(clean));
        assert_eq!(synth.current(), ScanState::Empty);

        let settled = timeout(Duration::from_secs(2), late.next())
            .await
            .expect("settled state delivered");
        assert_eq!(settled, Some(ScanState::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_ending_on_delivered_state_is_not_repeated() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        assert_eq!(observer.next().await, Some(ScanState::Empty));

        cell.publish(Some(scanning(0, 1)));
        time::sleep(Duration::from_millis(100)).await;
        cell.publish(None);

        let repeat = timeout(Duration::from_secs(5), observer.next()).await;
        assert!(repeat.is_err(), "observer already delivered Empty");
        assert_eq!(synth.published(), ScanState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_value_comes_from_cached_snapshot() {
        let cell = SnapshotCell::with_snapshot(Some(scanning(1, 3)));
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);

        assert_eq!(synth.published(), classify(Some(&scanning(1, 3))));
        let mut observer = synth.observe();
        assert!(observer.next().await.unwrap().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn all_observers_share_the_sequence() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut first = synth.observe();
        let mut second = synth.observe();
        first.next().await;
        second.next().await;

        cell.publish(Some(scanning(0, 1)));
        let a = first.next().await;
        let b = second.next().await;
        assert_eq!(a, b);
        assert!(a.unwrap().is_running());
        // One task, one upstream subscription besides the synthesizer's own.
        assert_eq!(cell.observer_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_scope_releases_upstream() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let mut synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        observer.next().await;
        cell.publish(Some(scanning(0, 1)));

        scope.cancel();
        synth.stopped().await;
        assert!(!synth.is_running());
        assert_eq!(observer.next().await, None);
        assert_eq!(cell.observer_count(), 1);

        drop(synth);
        assert_eq!(cell.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_synthesizer_leaves_parent_scope_alone() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        observer.next().await;

        drop(synth);
        assert!(!scope.is_cancelled());
        assert_eq!(observer.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_source_flushes_pending_state() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let mut observer = synth.observe();
        observer.next().await;

        cell.publish(Some(infected_idle()));
        drop(cell);

        let state = timeout(Duration::from_secs(1), observer.next())
            .await
            .expect("pending state flushed");
        assert_eq!(state.unwrap().viruses(), ["a.txt".to_string()]);
        assert!(synth.is_running(), "stream holds after the source closes");
    }

    #[tokio::test(start_paused = true)]
    async fn stream_adapter_yields_states() {
        let cell = SnapshotCell::new();
        let scope = CancellationToken::new();
        let synth = ScanStateSynthesizer::spawn(cell.subscribe(), WINDOW, &scope);
        let stream = synth.observe().into_stream();
        tokio::pin!(stream);

        assert_eq!(stream.next().await, Some(ScanState::Empty));
        cell.publish(Some(infected_idle()));
        assert!(matches!(
            stream.next().await,
            Some(ScanState::VirusesDetected { .. })
        ));

        synth.shutdown();
        assert_eq!(stream.next().await, None);
    }
}
