use std::time::Duration;

use avguard_model::ScanState;
use tokio::{
    sync::watch,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::classify;
use crate::engine::SnapshotReceiver;

/// Classify every snapshot from `source` and publish the result once no newer
/// snapshot has arrived for `window`.
///
/// A single timer is kept for the whole loop and pushed back on every
/// snapshot. Returns when `scope` is cancelled; a closed source only stops
/// new input, the last state is held until then.
pub(crate) async fn debounce_scan_states(
    mut source: SnapshotReceiver,
    states: watch::Sender<ScanState>,
    window: Duration,
    scope: CancellationToken,
) {
    let timer = time::sleep(window);
    tokio::pin!(timer);
    let mut pending: Option<ScanState> = None;

    loop {
        tokio::select! {
            biased;

            _ = scope.cancelled() => {
                debug!("scan state scope cancelled");
                break;
            }

            changed = source.changed() => {
                if changed.is_err() {
                    if let Some(state) = pending.take() {
                        publish(&states, state);
                    }
                    debug!("snapshot source closed, holding last scan state");
                    scope.cancelled().await;
                    break;
                }

                let state = classify(source.borrow_and_update().as_ref());
                debug!(%state, "snapshot classified");
                pending = Some(state);
                timer.as_mut().reset(Instant::now() + window);
            }

            () = &mut timer, if pending.is_some() => {
                if let Some(state) = pending.take() {
                    publish(&states, state);
                }
            }
        }
    }
}

fn publish(states: &watch::Sender<ScanState>, state: ScanState) {
    // Always notify. An observer that started from a newer raw snapshot must
    // still see a burst that settles back on the published value; repeats
    // are dropped per observer.
    let previous = states.send_replace(state);
    let current = states.borrow();

    if previous == *current {
        debug!(state = %*current, "scan state republished unchanged");
    } else {
        info!(
            state = %*current,
            observers = states.receiver_count(),
            "scan state published"
        );
    }
}
