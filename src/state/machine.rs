//! Timer state machine with a finished overlay window
//!
//! `unavailable -> idle <-> running -> finished -> idle`. The finished overlay
//! is driven by local time, not by the remote entity: once marked, the view
//! stays `finished` until the overlay deadline passes or a new run starts,
//! whatever idle snapshots arrive in between.

use tracing::{debug, info};

use super::{
    snapshot::{RawTimerStatus, RemoteTimerSnapshot},
    timer_state::{TimerStatus, TimerViewState},
};
use crate::skew::ClockSkewEstimator;

pub const DEFAULT_FINISHED_OVERLAY_MS: i64 = 5_000;

/// Valid range for configured durations, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationBounds {
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl DurationBounds {
    pub fn clamp(&self, seconds: f64) -> f64 {
        let min = self.min_seconds.max(0.0);
        let max = self.max_seconds.max(min);
        seconds.clamp(min, max)
    }
}

impl Default for DurationBounds {
    fn default() -> Self {
        Self {
            min_seconds: 0.0,
            max_seconds: 86_400.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FinishedOverlay {
    until_ms: i64,
    /// `last_changed` of the run that finished; a later one is a new run.
    run_changed_at: Option<i64>,
}

#[derive(Debug)]
pub struct TimerStateMachine {
    bounds: DurationBounds,
    finished_overlay_ms: i64,
    entity: Option<RemoteTimerSnapshot>,
    normalized: TimerViewState,
    overlay: Option<FinishedOverlay>,
    current: TimerViewState,
}

impl TimerStateMachine {
    pub fn new(finished_overlay_ms: i64, bounds: DurationBounds) -> Self {
        Self {
            bounds,
            finished_overlay_ms: finished_overlay_ms.max(0),
            entity: None,
            normalized: TimerViewState::unavailable(),
            overlay: None,
            current: TimerViewState::unavailable(),
        }
    }

    pub fn current(&self) -> &TimerViewState {
        &self.current
    }

    /// Normalized view of the last entity snapshot, ignoring any overlay.
    pub fn entity_view(&self) -> &TimerViewState {
        &self.normalized
    }

    pub fn entity(&self) -> Option<&RemoteTimerSnapshot> {
        self.entity.as_ref()
    }

    pub fn finished_overlay_ms(&self) -> i64 {
        self.finished_overlay_ms
    }

    pub fn set_finished_overlay_ms(&mut self, value: i64) {
        self.finished_overlay_ms = value.max(0);
    }

    /// Wall-clock time by which the host must call
    /// [`handle_time_advance`](Self::handle_time_advance).
    pub fn get_overlay_deadline(&self) -> Option<i64> {
        self.overlay.map(|o| o.until_ms)
    }

    /// Ingest a new snapshot observed at local wall time `at_ms`.
    pub fn update_from_entity(
        &mut self,
        snapshot: RemoteTimerSnapshot,
        at_ms: i64,
        skew: &ClockSkewEstimator,
    ) -> &TimerViewState {
        let normalized = self.normalize(&snapshot, at_ms, skew);
        self.entity = Some(snapshot);
        self.normalized = normalized;

        if let Some(overlay) = self.overlay {
            let new_run = self.normalized.is_running()
                && match (self.normalized.last_changed_ts, overlay.run_changed_at) {
                    (Some(changed), Some(finished_run)) => changed > finished_run,
                    (Some(_), None) => true,
                    (None, _) => false,
                };

            if at_ms >= overlay.until_ms || new_run {
                info!("Finished overlay cleared by {}", if new_run { "new run" } else { "deadline" });
                self.overlay = None;
            } else {
                debug!("Finished overlay active, holding finished over entity {}", self.normalized.status);
                return &self.current;
            }
        }

        self.transition(self.normalized.clone());
        &self.current
    }

    /// Force `finished` until `at_ms + finished_overlay_ms`.
    pub fn mark_finished(&mut self, at_ms: i64) -> &TimerViewState {
        let until_ms = at_ms.saturating_add(self.finished_overlay_ms);
        self.overlay = Some(FinishedOverlay {
            until_ms,
            run_changed_at: self.normalized.last_changed_ts,
        });

        let mut view = TimerViewState::with_status(TimerStatus::Finished);
        view.duration_seconds = self.normalized.duration_seconds;
        view.remaining_seconds = Some(0.0);
        view.last_changed_ts = self.normalized.last_changed_ts;
        view.finished_until_ts = Some(until_ms);
        self.transition(view);
        &self.current
    }

    /// Re-check the overlay deadline at wall time `at_ms`. On expiry the held
    /// snapshot is normalized again at `at_ms` rather than replayed as it was
    /// when it arrived.
    pub fn handle_time_advance(
        &mut self,
        at_ms: i64,
        skew: &ClockSkewEstimator,
    ) -> &TimerViewState {
        if self.overlay.is_some_and(|o| at_ms >= o.until_ms) {
            info!("Finished overlay elapsed");
            self.overlay = None;
            self.refresh(at_ms, skew);
        }
        &self.current
    }

    /// Normalize the held snapshot again at `at_ms`, e.g. after the skew
    /// estimate moved. An active overlay keeps the view `finished`.
    pub fn refresh(&mut self, at_ms: i64, skew: &ClockSkewEstimator) -> &TimerViewState {
        if let Some(snapshot) = self.entity.as_ref() {
            let normalized = self.normalize(snapshot, at_ms, skew);
            self.normalized = normalized;
        }
        if self.overlay.is_none() {
            self.transition(self.normalized.clone());
        }
        &self.current
    }

    /// Count `elapsed_ms` off the held snapshot's reported remaining time.
    pub fn age_entity(&mut self, elapsed_ms: i64) {
        if let Some(snapshot) = self.entity.as_mut() {
            snapshot.age_by(elapsed_ms);
        }
    }

    /// Drop entity and overlay. Used when the entity is unset or the transport disconnects.
    pub fn clear(&mut self) {
        self.entity = None;
        self.overlay = None;
        self.normalized = TimerViewState::unavailable();
        self.transition(TimerViewState::unavailable());
    }

    fn transition(&mut self, next: TimerViewState) {
        if next.status != self.current.status {
            info!("Timer state {} -> {}", self.current.status, next.status);
        }
        self.current = next;
    }

    fn normalize(
        &self,
        snapshot: &RemoteTimerSnapshot,
        at_ms: i64,
        skew: &ClockSkewEstimator,
    ) -> TimerViewState {
        let duration = snapshot
            .duration_seconds
            .filter(|d| d.is_finite())
            .map(|d| self.bounds.clamp(d));
        let clamp_remaining = |seconds: f64| match duration {
            Some(d) => seconds.clamp(0.0, d),
            None => seconds.max(0.0),
        };

        let mut view = match snapshot.status {
            RawTimerStatus::Unavailable | RawTimerStatus::Unknown => {
                return TimerViewState::unavailable();
            }
            RawTimerStatus::Active | RawTimerStatus::Paused => {
                TimerViewState::with_status(TimerStatus::Running)
            }
            RawTimerStatus::Idle | RawTimerStatus::Other(_) => {
                TimerViewState::with_status(TimerStatus::Idle)
            }
        };
        view.duration_seconds = duration;
        view.last_changed_ts = snapshot.last_changed_at_ms;

        if view.status == TimerStatus::Idle {
            view.remaining_seconds = duration;
            return view;
        }

        view.paused = snapshot.status == RawTimerStatus::Paused;

        let exact = match (&snapshot.status, snapshot.finishes_at_ms) {
            (RawTimerStatus::Active, Some(finishes_at)) => {
                let server_now = skew.server_now_ms(at_ms);
                Some(finishes_at.saturating_sub(server_now) as f64 / 1000.0)
            }
            _ => None,
        };
        let reported = snapshot
            .reported_remaining_seconds
            .filter(|r| r.is_finite());

        if let Some(remaining) = exact.or(reported) {
            view.remaining_seconds = Some(clamp_remaining(remaining));
        } else if let (Some(d), Some(changed)) = (duration, snapshot.last_changed_at_ms) {
            let elapsed = skew.elapsed_since(changed, at_ms) as f64 / 1000.0;
            view.remaining_seconds = Some(clamp_remaining(d - elapsed));
            view.remaining_is_estimated = true;
            if elapsed > d {
                view.estimation_drift_seconds = Some(elapsed - d);
            }
        } else {
            view.remaining_seconds = duration;
        }

        view
    }
}

impl Default for TimerStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_FINISHED_OVERLAY_MS, DurationBounds::default())
    }
}
