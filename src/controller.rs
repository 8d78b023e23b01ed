//! Timer controller: one per remote timer entity
//!
//! Owns the skew estimator, the state machine and the countdown engine and
//! decides, per incoming event, whether a change to the authoritative end time
//! is material enough to be shown as an upward jump.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    clock::SharedClock,
    countdown::{
        quantize_display_seconds, BaselineSeed, BaselineSeeder, MonotonicCountdownState,
        QuantizePolicy, VISUAL_CORRECTION_THRESHOLD_MS,
    },
    skew::{ClockSkewEstimator, SkewConfig},
    state::{
        machine::{DurationBounds, DEFAULT_FINISHED_OVERLAY_MS},
        RemoteTimerSnapshot, TimerStateMachine, TimerStatus, TimerViewState,
    },
    utils::format_hms,
};

/// Assumed render cadence before any tick has been observed.
pub const DEFAULT_TICK_INTERVAL_MS: i64 = 1_000;

/// Lower bound on the near-zero window of the fallback finish.
pub const MIN_FINISH_TOLERANCE_MS: i64 = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub finished_overlay_ms: i64,
    pub skew_enabled: bool,
    pub duration_bounds: DurationBounds,
    pub skew: SkewConfig,
    pub quantize: QuantizePolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            finished_overlay_ms: DEFAULT_FINISHED_OVERLAY_MS,
            skew_enabled: true,
            duration_bounds: DurationBounds::default(),
            skew: SkewConfig::default(),
            quantize: QuantizePolicy::default(),
        }
    }
}

/// What the rendering layer paints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayFrame {
    pub view: TimerViewState,
    pub display_seconds: Option<u64>,
    pub display_text: Option<String>,
    pub skew_ms: f64,
    pub overlay_deadline: Option<i64>,
}

impl DisplayFrame {
    pub fn empty() -> Self {
        Self {
            view: TimerViewState::unavailable(),
            display_seconds: None,
            display_text: None,
            skew_ms: 0.0,
            overlay_deadline: None,
        }
    }
}

#[derive(Debug)]
pub struct TimerController {
    config: ControllerConfig,
    clock: SharedClock,
    skew: ClockSkewEstimator,
    machine: TimerStateMachine,
    countdown: MonotonicCountdownState,
    last_seed: Option<BaselineSeed>,
    entity_id: Option<String>,
    /// Monotonic time up to which the held snapshot's remaining time is aged.
    entity_observed_at: Option<i64>,
    finished_event_seen: bool,
    paused_display: Option<u64>,
    last_tick_at: Option<i64>,
    tick_interval_ms: Option<i64>,
}

impl TimerController {
    pub fn new(clock: SharedClock, config: ControllerConfig) -> Self {
        let skew = ClockSkewEstimator::with_config(clock.clone(), config.skew);
        let machine = TimerStateMachine::new(config.finished_overlay_ms, config.duration_bounds);
        Self {
            config,
            clock,
            skew,
            machine,
            countdown: MonotonicCountdownState::new(),
            last_seed: None,
            entity_id: None,
            entity_observed_at: None,
            finished_event_seen: false,
            paused_display: None,
            last_tick_at: None,
            tick_interval_ms: None,
        }
    }

    pub fn view(&self) -> &TimerViewState {
        self.machine.current()
    }

    pub fn skew(&self) -> &ClockSkewEstimator {
        &self.skew
    }

    pub fn countdown(&self) -> &MonotonicCountdownState {
        &self.countdown
    }

    pub fn set_finished_overlay_ms(&mut self, value: i64) {
        self.config.finished_overlay_ms = value.max(0);
        self.machine.set_finished_overlay_ms(value);
    }

    /// A new snapshot of the remote entity arrived.
    pub fn ingest_snapshot(&mut self, snapshot: RemoteTimerSnapshot) -> DisplayFrame {
        let entity_changed = matches!(
            (&self.entity_id, &snapshot.entity_id),
            (Some(current), Some(incoming)) if current != incoming
        );
        if entity_changed {
            info!(
                "Timer entity changed from {:?} to {:?}, resetting",
                self.entity_id, snapshot.entity_id
            );
            self.reset();
        }
        if snapshot.entity_id.is_some() {
            self.entity_id = snapshot.entity_id.clone();
        }

        let now_wall = self.clock.wall_ms();
        let now_mono = self.clock.monotonic_ms();
        let before = self.machine.entity_view().clone();
        let local_remaining_ms = self.countdown.remaining_ms(now_mono);

        self.machine.update_from_entity(snapshot, now_wall, &self.skew);
        self.entity_observed_at = Some(now_mono);
        let after = self.machine.entity_view().clone();

        if before.is_ticking()
            && after.status == TimerStatus::Idle
            && !self.finished_event_seen
            && self.machine.get_overlay_deadline().is_none()
        {
            let tolerance = self.finish_tolerance_ms();
            if local_remaining_ms.is_some_and(|r| r <= tolerance) {
                info!(
                    "Idle arrived {}ms before local zero without a finished event, marking finished",
                    local_remaining_ms.unwrap_or_default()
                );
                self.machine.mark_finished(now_wall);
            }
        }

        if Self::is_new_run(&before, &after) {
            self.finished_event_seen = false;
        }

        self.reseed(&before, now_wall);
        self.render()
    }

    /// A server-stamped timestamp arrived alongside a round trip.
    pub fn ingest_server_time(&mut self, server_iso: &str) -> DisplayFrame {
        self.skew
            .estimate_from_server_stamp(server_iso, self.clock.wall_ms());
        self.refresh_from_entity();
        self.render()
    }

    /// The transport delivered an explicit "finished" notification.
    pub fn mark_finished(&mut self) -> DisplayFrame {
        self.finished_event_seen = true;
        self.machine.mark_finished(self.clock.wall_ms());
        self.clear_countdown();
        self.render()
    }

    /// Wake-up: re-check the overlay and render the next tick.
    ///
    /// `scheduled` is true when the wake-up came from the tick schedule rather
    /// than an event; only those feed the observed tick interval.
    pub fn advance(&mut self, scheduled: bool) -> DisplayFrame {
        let now_mono = self.clock.monotonic_ms();
        let now_wall = self.clock.wall_ms();
        let before = self.machine.current().status;
        self.age_held_entity(now_mono);
        self.machine.handle_time_advance(now_wall, &self.skew);
        if self.machine.current().status != before {
            self.reseed(&TimerViewState::with_status(before), now_wall);
        }

        if self.machine.current().is_ticking() {
            if scheduled {
                if let Some(last) = self.last_tick_at {
                    let interval = now_mono.saturating_sub(last);
                    if interval > 0 {
                        self.tick_interval_ms = Some(interval);
                    }
                }
                self.last_tick_at = Some(now_mono);
            }
        } else {
            self.last_tick_at = None;
        }

        self.render()
    }

    /// Reconnect or entity change: drop skew history, overlay and countdown.
    pub fn reset(&mut self) {
        info!("Resetting timer controller");
        self.skew.reset();
        self.machine.clear();
        self.clear_countdown();
        self.entity_id = None;
        self.entity_observed_at = None;
        self.finished_event_seen = false;
        self.last_tick_at = None;
        self.tick_interval_ms = None;
    }

    /// The local wall clock was stepped: samples taken against the old wall
    /// clock no longer describe the skew.
    pub fn reset_skew(&mut self) -> DisplayFrame {
        self.skew.reset();
        self.refresh_from_entity();
        self.render()
    }

    /// Current frame without advancing anything but the countdown itself.
    pub fn render(&mut self) -> DisplayFrame {
        let view = self.machine.current().clone();
        let display_seconds = match view.status {
            TimerStatus::Running if view.paused => {
                let remaining_ms = view.remaining_seconds.unwrap_or(0.0) * 1000.0;
                let seconds = quantize_display_seconds(
                    remaining_ms,
                    self.paused_display,
                    self.config.quantize,
                );
                self.paused_display = Some(seconds);
                Some(seconds)
            }
            TimerStatus::Running => self
                .countdown
                .display_seconds(self.clock.monotonic_ms())
                .or_else(|| view.remaining_seconds.map(ceil_seconds)),
            TimerStatus::Finished => Some(0),
            TimerStatus::Idle => view
                .remaining_seconds
                .or(view.duration_seconds)
                .map(ceil_seconds),
            TimerStatus::Unavailable => None,
        };

        DisplayFrame {
            display_text: display_seconds.map(format_hms),
            display_seconds,
            skew_ms: self.skew.get_skew_ms(),
            overlay_deadline: self.machine.get_overlay_deadline(),
            view,
        }
    }

    /// Delay until the host should call [`advance`](Self::advance) again:
    /// the next display-second boundary or the overlay deadline, whichever
    /// comes first. `None` means wait for the next event.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let overlay = self
            .machine
            .get_overlay_deadline()
            .map(|deadline| deadline.saturating_sub(self.clock.wall_ms()).max(0));

        let tick = if self.machine.current().is_ticking() {
            self.countdown
                .remaining_ms(self.clock.monotonic_ms())
                .filter(|remaining| *remaining > 0)
                .map(|remaining| {
                    let to_boundary = match remaining % 1000 {
                        0 => 1000,
                        partial => partial,
                    };
                    to_boundary + 1
                })
        } else {
            None
        };

        let wait = match (overlay, tick) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }?;
        Some(Duration::from_millis(u64::try_from(wait).unwrap_or(0)))
    }

    fn finish_tolerance_ms(&self) -> i64 {
        self.tick_interval_ms
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS)
            .max(MIN_FINISH_TOLERANCE_MS)
    }

    fn is_new_run(before: &TimerViewState, after: &TimerViewState) -> bool {
        after.is_running()
            && (!before.is_running() || before.last_changed_ts != after.last_changed_ts)
    }

    /// Re-derive the view from the held snapshot, e.g. after the skew moved.
    fn refresh_from_entity(&mut self) {
        if self.machine.entity().is_none() || !self.machine.entity_view().is_ticking() {
            return;
        }
        let now_wall = self.clock.wall_ms();
        let before = self.machine.entity_view().clone();
        self.age_held_entity(self.clock.monotonic_ms());
        self.machine.refresh(now_wall, &self.skew);
        self.reseed(&before, now_wall);
    }

    /// Bring the held snapshot's reported remaining time up to `now_mono`.
    fn age_held_entity(&mut self, now_mono: i64) {
        if let Some(observed) = self.entity_observed_at.as_mut() {
            self.machine.age_entity(now_mono.saturating_sub(*observed));
            *observed = now_mono;
        }
    }

    fn reseed(&mut self, before: &TimerViewState, now_wall: i64) {
        let view = self.machine.current().clone();
        if !view.is_running() || !view.paused {
            self.paused_display = None;
        }
        if !view.is_ticking() {
            self.clear_countdown();
            return;
        }

        // Resume from pause is material as well as start and restart.
        let material = !before.is_ticking() || before.last_changed_ts != view.last_changed_ts;
        let previous = if material { None } else { self.last_seed };

        let seeder = BaselineSeeder::new(&self.skew, self.clock.as_ref(), self.config.skew_enabled);
        let Some(seed) = seeder.seed_running_baseline(&view, now_wall, previous.as_ref()) else {
            debug!("Running timer without usable remaining time, countdown cleared");
            self.clear_countdown();
            return;
        };

        let allow_increase = material
            || self.countdown.baseline_end_ms().map_or(true, |old| {
                (seed.baseline_end_ms - old).abs() >= VISUAL_CORRECTION_THRESHOLD_MS
            });
        if allow_increase && !material {
            info!(
                "Material correction of the end time, now {:.1}s remaining",
                seed.remaining_seconds
            );
        }

        self.countdown
            .seed_baseline(Some(seed.baseline_end_ms), allow_increase);
        self.last_seed = Some(seed);
    }

    fn clear_countdown(&mut self) {
        self.countdown.seed_baseline(None, false);
        self.last_seed = None;
    }
}

fn ceil_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.ceil() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        state::RawTimerStatus,
    };

    const T0: i64 = 1_700_000_000_000;

    fn controller() -> (Arc<ManualClock>, TimerController) {
        let clock = ManualClock::shared(0, T0);
        let controller = TimerController::new(clock.clone(), ControllerConfig::default());
        (clock, controller)
    }

    fn iso(ms: i64) -> String {
        chrono::DateTime::from_timestamp_millis(ms)
            .unwrap()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    fn active(remaining: f64, changed: i64) -> RemoteTimerSnapshot {
        RemoteTimerSnapshot::new(RawTimerStatus::Active)
            .with_duration(60.0)
            .with_remaining(remaining)
            .with_last_changed(changed)
    }

    #[test]
    fn counts_down_from_snapshot() {
        let (clock, mut c) = controller();
        let frame = c.ingest_snapshot(active(30.0, T0));
        assert_eq!(frame.view.status, TimerStatus::Running);
        assert_eq!(frame.display_seconds, Some(30));
        assert_eq!(frame.display_text.as_deref(), Some("0:30"));

        clock.advance(1_000);
        assert_eq!(c.advance(true).display_seconds, Some(29));
        clock.advance(500);
        assert_eq!(c.advance(true).display_seconds, Some(29));
    }

    #[test]
    fn small_correction_is_invisible() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        clock.advance(2_300);
        assert_eq!(c.advance(true).display_seconds, Some(28));

        // Server says 28.6s left instead of 27.7s: below the threshold.
        let frame = c.ingest_snapshot(active(28.6, T0));
        assert_eq!(frame.display_seconds, Some(28));
    }

    #[test]
    fn material_correction_is_shown() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        clock.advance(5_000);
        assert_eq!(c.advance(true).display_seconds, Some(25));

        let frame = c.ingest_snapshot(active(40.0, T0));
        assert_eq!(frame.display_seconds, Some(40));
    }

    #[test]
    fn paused_display_is_static() {
        let (clock, mut c) = controller();
        let frame = c.ingest_snapshot(
            RemoteTimerSnapshot::new(RawTimerStatus::Paused)
                .with_duration(60.0)
                .with_remaining(12.0),
        );
        assert!(frame.view.paused);
        assert_eq!(frame.display_seconds, Some(12));
        assert_eq!(c.next_wakeup(), None);

        clock.advance(5_000);
        assert_eq!(c.advance(true).display_seconds, Some(12));
    }

    #[test]
    fn idle_shows_full_duration() {
        let (_, mut c) = controller();
        let frame = c.ingest_snapshot(
            RemoteTimerSnapshot::new(RawTimerStatus::Idle).with_duration(90.0),
        );
        assert_eq!(frame.display_seconds, Some(90));
        assert_eq!(frame.display_text.as_deref(), Some("1:30"));
    }

    #[test]
    fn fallback_finish_when_idle_arrives_near_zero() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(3.0, T0));
        for _ in 0..3 {
            clock.advance(1_000);
            c.advance(true);
        }
        let frame = c.ingest_snapshot(
            RemoteTimerSnapshot::new(RawTimerStatus::Idle)
                .with_duration(60.0)
                .with_last_changed(T0 + 3_000),
        );
        assert_eq!(frame.view.status, TimerStatus::Finished);
        assert_eq!(frame.display_seconds, Some(0));
        assert_eq!(frame.overlay_deadline, Some(T0 + 3_000 + 5_000));
    }

    #[test]
    fn cancel_far_from_zero_goes_idle() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        clock.advance(1_000);
        c.advance(true);
        let frame = c.ingest_snapshot(
            RemoteTimerSnapshot::new(RawTimerStatus::Idle).with_duration(60.0),
        );
        assert_eq!(frame.view.status, TimerStatus::Idle);
        assert_eq!(frame.overlay_deadline, None);
    }

    #[test]
    fn explicit_finish_suppresses_fallback_and_expires() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(1.0, T0));
        clock.advance(1_000);
        let frame = c.mark_finished();
        assert_eq!(frame.view.status, TimerStatus::Finished);
        assert_eq!(c.next_wakeup(), Some(Duration::from_millis(5_000)));

        clock.advance(2_000);
        let frame = c.ingest_snapshot(
            RemoteTimerSnapshot::new(RawTimerStatus::Idle).with_duration(60.0),
        );
        assert_eq!(frame.view.status, TimerStatus::Finished);
        assert_eq!(frame.overlay_deadline, Some(T0 + 6_000));

        clock.advance(3_000);
        assert_eq!(c.advance(true).view.status, TimerStatus::Idle);
        assert_eq!(c.next_wakeup(), None);
    }

    #[test]
    fn server_time_does_not_restore_stale_remaining() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        clock.advance(10_000);
        assert_eq!(c.advance(true).display_seconds, Some(20));

        let frame = c.ingest_server_time(&iso(T0 + 10_000));
        assert_eq!(frame.display_seconds, Some(20));
        assert_eq!(c.countdown().remaining_ms(clock.monotonic_ms()), Some(20_000));
    }

    #[test]
    fn server_time_between_ticks_ages_reported_remaining() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        clock.advance(10_000);

        let frame = c.ingest_server_time(&iso(T0 + 10_000));
        assert_eq!(frame.display_seconds, Some(20));
    }

    #[test]
    fn overlay_expiry_does_not_restart_countdown() {
        let (clock, mut c) = controller();
        assert_eq!(c.ingest_snapshot(active(5.0, T0)).display_seconds, Some(5));
        clock.advance(5_000);
        c.mark_finished();

        clock.advance(5_000);
        let frame = c.advance(true);
        assert_eq!(frame.overlay_deadline, None);
        assert_eq!(frame.display_seconds, Some(0));
    }

    #[test]
    fn event_driven_advances_keep_tick_interval() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        for _ in 0..2 {
            clock.advance(1_000);
            c.advance(true);
        }
        assert_eq!(c.finish_tolerance_ms(), 1_000);

        for _ in 0..5 {
            clock.advance(40);
            c.advance(false);
        }
        assert_eq!(c.finish_tolerance_ms(), 1_000);

        clock.advance(800);
        c.advance(true);
        assert_eq!(c.finish_tolerance_ms(), 1_000);
    }

    #[test]
    fn next_wakeup_targets_second_boundary() {
        let (clock, mut c) = controller();
        c.ingest_snapshot(active(10.0, T0));
        assert_eq!(c.next_wakeup(), Some(Duration::from_millis(1_001)));
        clock.advance(300);
        c.advance(true);
        assert_eq!(c.next_wakeup(), Some(Duration::from_millis(701)));
    }

    #[test]
    fn entity_change_resets_skew() {
        let (_, mut c) = controller();
        c.ingest_server_time("2023-11-14T22:13:17Z");
        assert!(c.skew().is_initialized());

        c.ingest_snapshot(active(30.0, T0).with_entity("timer.a"));
        assert!(c.skew().is_initialized());
        c.ingest_snapshot(active(30.0, T0).with_entity("timer.b"));
        assert!(!c.skew().is_initialized());
    }

    #[test]
    fn reset_returns_to_unavailable() {
        let (_, mut c) = controller();
        c.ingest_snapshot(active(30.0, T0));
        c.reset();
        let frame = c.render();
        assert_eq!(frame.view.status, TimerStatus::Unavailable);
        assert_eq!(frame.display_seconds, None);
        assert!(!c.countdown().is_seeded());
    }
}
