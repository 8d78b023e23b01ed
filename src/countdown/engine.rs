//! Monotonic countdown rendering against a deadline on the monotonic clock

use tracing::debug;

/// Corrections to the authoritative end time at or above this are shown to
/// the user even when that means the number goes up. Smaller ones are hidden
/// behind a hold ceiling.
pub const VISUAL_CORRECTION_THRESHOLD_MS: i64 = 1_500;

/// Countdown state with a single writer.
///
/// Invariant: `last_display_seconds` never increases across
/// [`display_seconds`](Self::display_seconds) calls with non-decreasing `now`,
/// except right after a [`seed_baseline`](Self::seed_baseline) with
/// `allow_increase = true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonotonicCountdownState {
    baseline_end_ms: Option<i64>,
    hold_max_seconds: Option<u64>,
    last_display_seconds: Option<u64>,
}

impl MonotonicCountdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline the countdown runs towards. `None` clears everything.
    pub fn seed_baseline(&mut self, baseline_end_ms: Option<i64>, allow_increase: bool) {
        let Some(end) = baseline_end_ms else {
            *self = Self::default();
            return;
        };

        if allow_increase {
            self.hold_max_seconds = None;
            self.last_display_seconds = None;
        } else if let Some(last) = self.last_display_seconds {
            self.hold_max_seconds = Some(last);
        }

        debug!(
            "Countdown baseline {:?} -> {} (allow_increase={}, hold={:?})",
            self.baseline_end_ms, end, allow_increase, self.hold_max_seconds
        );
        self.baseline_end_ms = Some(end);
    }

    pub fn baseline_end_ms(&self) -> Option<i64> {
        self.baseline_end_ms
    }

    pub fn hold_max_seconds(&self) -> Option<u64> {
        self.hold_max_seconds
    }

    pub fn last_display_seconds(&self) -> Option<u64> {
        self.last_display_seconds
    }

    pub fn is_seeded(&self) -> bool {
        self.baseline_end_ms.is_some()
    }

    /// Milliseconds left at monotonic time `now`, floored at zero.
    pub fn remaining_ms(&self, now: i64) -> Option<i64> {
        self.baseline_end_ms
            .map(|end| end.saturating_sub(now).max(0))
    }

    /// Whole seconds to show at monotonic time `now`.
    pub fn display_seconds(&mut self, now: i64) -> Option<u64> {
        let remaining = self.remaining_ms(now)?;
        // ceil for non-negative integers
        let mut seconds = (remaining as u64).div_ceil(1000);

        if let Some(ceiling) = self.hold_max_seconds {
            if seconds > ceiling {
                seconds = ceiling;
            } else {
                self.hold_max_seconds = None;
            }
        }

        if let Some(last) = self.last_display_seconds {
            seconds = seconds.min(last);
        }

        self.last_display_seconds = Some(seconds);
        Some(seconds)
    }
}
