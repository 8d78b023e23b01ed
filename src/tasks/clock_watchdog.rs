//! Wall-clock jump watchdog background task

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{info, warn};

use crate::state::AppState;

const CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Wall and monotonic deltas may disagree by this much before the wall clock
/// is considered stepped.
pub const WALL_JUMP_THRESHOLD_MS: i64 = 2_000;

/// Wall-clock step between two `(monotonic, wall)` readings, if any.
pub fn detect_wall_jump(previous: (i64, i64), current: (i64, i64), threshold_ms: i64) -> Option<i64> {
    let monotonic_delta = current.0.saturating_sub(previous.0);
    let wall_delta = current.1.saturating_sub(previous.1);
    let step = wall_delta.saturating_sub(monotonic_delta);
    (step.abs() > threshold_ms).then_some(step)
}

/// Background task that resets the skew estimate when the local wall clock is stepped
pub async fn clock_watchdog_task(state: Arc<AppState>) {
    info!("Starting clock watchdog task");

    let mut interval = interval(CHECK_INTERVAL);
    let mut previous = (state.clock.monotonic_ms(), state.clock.wall_ms());

    loop {
        interval.tick().await;

        let current = (state.clock.monotonic_ms(), state.clock.wall_ms());
        if let Some(step) = detect_wall_jump(previous, current, WALL_JUMP_THRESHOLD_MS) {
            info!("Local wall clock stepped by {}ms, resetting skew estimate", step);
            if let Err(e) = state.reset_skew() {
                warn!("Failed to reset skew after clock step: {}", e);
            }
        }
        previous = current;
    }
}
