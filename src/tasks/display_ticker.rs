//! Display ticker background task

use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Retry delay when the controller lock is poisoned.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Re-render the countdown at each display-second boundary or overlay deadline.
///
/// Every event applied through [`AppState`] notifies `reschedule`, which
/// cancels the pending sleep so exactly one wake-up is ever outstanding.
pub async fn display_ticker_task(state: Arc<AppState>) {
    info!("Starting display ticker task");

    let mut scheduled = false;
    loop {
        let next = match state.advance(scheduled) {
            Ok((frame, next)) => {
                debug!(
                    "Tick: status={}, display={:?}, next wake-up in {:?}",
                    frame.view.status, frame.display_text, next
                );
                next
            }
            Err(e) => {
                error!("Failed to advance timer: {}", e);
                Some(ERROR_BACKOFF)
            }
        };

        scheduled = match next {
            Some(delay) => {
                tokio::select! {
                    _ = sleep(delay) => true,
                    _ = state.reschedule.notified() => {
                        debug!("Pending wake-up superseded by a new event");
                        false
                    }
                }
            }
            None => {
                debug!("Nothing scheduled, waiting for the next event");
                state.reschedule.notified().await;
                false
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        controller::ControllerConfig,
        state::{RawTimerStatus, RemoteTimerSnapshot, TimerStatus},
    };

    #[tokio::test]
    async fn ticker_publishes_frames_after_events() {
        let state = Arc::new(AppState::new(
            0,
            "127.0.0.1".to_string(),
            SystemClock::shared(),
            ControllerConfig::default(),
        ));
        let mut rx = state.subscribe();
        let handle = tokio::spawn(display_ticker_task(Arc::clone(&state)));

        state
            .ingest_snapshot(
                RemoteTimerSnapshot::new(RawTimerStatus::Active)
                    .with_duration(10.0)
                    .with_remaining(2.0),
            )
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                rx.changed().await.unwrap();
                let frame = rx.borrow_and_update().clone();
                if frame.display_seconds == Some(1) {
                    return frame;
                }
            }
        })
        .await
        .expect("ticker should render the next second");

        assert_eq!(frame.view.status, TimerStatus::Running);
        handle.abort();
    }
}
