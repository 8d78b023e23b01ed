//! Turns a running view state into a monotonic-clock countdown baseline

use tracing::debug;

use crate::{clock::Clock, skew::ClockSkewEstimator, state::TimerViewState};

/// Baseline for one seeding call. `remaining_seconds` is within `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineSeed {
    pub remaining_seconds: f64,
    pub monotonic_t0: i64,
    pub baseline_end_ms: i64,
    pub estimated: bool,
}

impl BaselineSeed {
    /// Seconds this seed says are left at monotonic time `now`.
    pub fn remaining_at(&self, now: i64) -> f64 {
        (self.baseline_end_ms.saturating_sub(now).max(0)) as f64 / 1000.0
    }
}

/// Bound a remaining value derived from the raw local clock so that it never
/// rises above the previous one.
pub fn bound_local_clock_baseline(derived: f64, previous: f64) -> f64 {
    if !previous.is_finite() {
        return derived;
    }
    let ceiling = previous.max(0.0);
    if !derived.is_finite() {
        return ceiling;
    }
    derived.min(ceiling)
}

/// Seeding procedure closed over the skew estimator and the monotonic clock.
pub struct BaselineSeeder<'a> {
    skew: &'a ClockSkewEstimator,
    clock: &'a dyn Clock,
    skew_enabled: bool,
}

impl<'a> BaselineSeeder<'a> {
    pub fn new(skew: &'a ClockSkewEstimator, clock: &'a dyn Clock, skew_enabled: bool) -> Self {
        Self {
            skew,
            clock,
            skew_enabled,
        }
    }

    /// Baseline for `view` at local wall time `now_wall_ms`.
    ///
    /// `previous` is the last seed of the same run; it only matters when skew
    /// correction is disabled. Returns `None` if the view is not running or
    /// carries nothing to derive a remaining time from.
    pub fn seed_running_baseline(
        &self,
        view: &TimerViewState,
        now_wall_ms: i64,
        previous: Option<&BaselineSeed>,
    ) -> Option<BaselineSeed> {
        if !view.is_running() {
            return None;
        }
        let duration = view.duration_seconds.filter(|d| d.is_finite() && *d >= 0.0);
        let clamp = |seconds: f64| match duration {
            Some(d) => seconds.clamp(0.0, d),
            None => seconds.max(0.0),
        };

        let explicit = view
            .remaining_seconds
            .filter(|r| r.is_finite() && !view.remaining_is_estimated)
            .map(clamp);

        let (remaining, estimated) = match explicit {
            Some(remaining) => (remaining, false),
            None => {
                let (Some(d), Some(changed)) = (duration, view.last_changed_ts) else {
                    return view
                        .remaining_seconds
                        .filter(|r| r.is_finite())
                        .map(clamp)
                        .map(|r| self.to_monotonic(r, true));
                };
                let elapsed_ms = if self.skew_enabled {
                    self.skew.elapsed_since(changed, now_wall_ms)
                } else {
                    now_wall_ms.saturating_sub(changed).max(0)
                };
                let mut derived = clamp(d - elapsed_ms as f64 / 1000.0);

                if !self.skew_enabled {
                    if let Some(prev) = previous {
                        let prev_now = prev.remaining_at(self.clock.monotonic_ms());
                        derived = clamp(bound_local_clock_baseline(derived, prev_now));
                    }
                }
                (derived, true)
            }
        };

        Some(self.to_monotonic(remaining, estimated))
    }

    fn to_monotonic(&self, remaining_seconds: f64, estimated: bool) -> BaselineSeed {
        let monotonic_t0 = self.clock.monotonic_ms();
        let remaining_ms = (remaining_seconds * 1000.0).round() as i64;
        let baseline_end_ms = monotonic_t0.saturating_add(remaining_ms);
        debug!(
            "Seeded baseline: {:.3}s remaining (estimated={}), ends at monotonic {}",
            remaining_seconds, estimated, baseline_end_ms
        );
        BaselineSeed {
            remaining_seconds,
            monotonic_t0,
            baseline_end_ms,
            estimated,
        }
    }
}
