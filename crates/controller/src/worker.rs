use std::time::Instant;

use gesture::{HandPointer, LandmarkSource, TrackerError};
use shared::shutdown::DeathFlag;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::Input;

/// Gesture acquisition: reads tracker frames, runs them through the debouncer
/// and forwards pointer samples until shutdown or the tracker exits. The
/// source is always stopped before returning.
pub async fn run_gesture(
    mut source: Box<dyn LandmarkSource>,
    mut pointer: HandPointer,
    tx: mpsc::Sender<Input>,
    death: DeathFlag,
) {
    loop {
        let next = tokio::select! {
            _ = death.wait() => break,
            next = source.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("hand tracker exited; gesture input stopped");
                break;
            }
            Err(TrackerError::Malformed(err)) => {
                debug!("skipping tracker line: {err}");
                continue;
            }
            Err(err) => {
                warn!("hand tracker failed: {err}");
                break;
            }
        };

        let sample = pointer.process(&frame, Instant::now());
        if sample.clicked {
            // a click must reach the loop even when it lags behind
            let sent = tokio::select! {
                _ = death.wait() => break,
                sent = tx.send(Input::from(sample)) => sent,
            };
            if sent.is_err() {
                break;
            }
            continue;
        }
        match tx.try_send(Input::from(sample)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("input queue full; dropping pointer sample"),
            Err(TrySendError::Closed(_)) => break,
        }
    }

    source.stop().await;
    info!("gesture worker stopped");
}
