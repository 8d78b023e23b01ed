//! Clock skew estimation between the local wall clock and the server's
//!
//! Each server-stamped timestamp gives one observation of
//! `local wall - server wall`. Transit delay can only make that observation
//! larger than the true skew, never smaller, so the estimator keeps a sliding
//! window of samples and tracks the window minimum. Decreases are applied at
//! once; increases are slewed so a single slow response cannot make the
//! countdown tick backwards.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::{clock::SharedClock, utils::parse_timestamp_ms};

/// Sliding window over which the minimum skew is taken.
pub const DEFAULT_WINDOW_MS: i64 = 60_000;

/// Samples are clamped to `±` this magnitude.
pub const DEFAULT_MAX_MAGNITUDE_MS: i64 = 10_000;

/// Upper bound on how fast the applied skew may grow.
pub const DEFAULT_MAX_INCREASE_RATE_MS_PER_SEC: f64 = 200.0;

/// Tuning knobs for [`ClockSkewEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewConfig {
    pub window_ms: i64,
    pub max_magnitude_ms: i64,
    pub max_increase_rate_ms_per_sec: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_magnitude_ms: DEFAULT_MAX_MAGNITUDE_MS,
            max_increase_rate_ms_per_sec: DEFAULT_MAX_INCREASE_RATE_MS_PER_SEC,
        }
    }
}

/// One observation, stamped on the local monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewSample {
    pub at_ms: i64,
    pub skew_ms: f64,
}

/// Windowed-minimum skew estimator with a rate-limited increase.
#[derive(Debug)]
pub struct ClockSkewEstimator {
    config: SkewConfig,
    clock: SharedClock,
    skew_ms: f64,
    initialized: bool,
    last_sample_at_ms: Option<i64>,
    samples: VecDeque<SkewSample>,
}

impl ClockSkewEstimator {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_config(clock, SkewConfig::default())
    }

    pub fn with_config(clock: SharedClock, config: SkewConfig) -> Self {
        Self {
            config,
            clock,
            skew_ms: 0.0,
            initialized: false,
            last_sample_at_ms: None,
            samples: VecDeque::new(),
        }
    }

    /// Feed a server timestamp observed when the local wall clock read `local_ms`.
    ///
    /// Unparseable timestamps are ignored.
    pub fn estimate_from_server_stamp(&mut self, server_iso: &str, local_ms: i64) {
        let Some(server_ms) = parse_timestamp_ms(server_iso) else {
            warn!("Ignoring unparseable server timestamp: {:?}", server_iso);
            return;
        };
        self.observe(server_ms, local_ms);
    }

    /// Same as [`estimate_from_server_stamp`](Self::estimate_from_server_stamp)
    /// for a server time that is already in milliseconds.
    pub fn observe(&mut self, server_ms: i64, local_ms: i64) {
        let bound = self.config.max_magnitude_ms.saturating_abs();
        let candidate = local_ms.saturating_sub(server_ms).clamp(-bound, bound) as f64;
        let now = self.clock.monotonic_ms();

        self.samples.push_back(SkewSample {
            at_ms: now,
            skew_ms: candidate,
        });
        let cutoff = now.saturating_sub(self.config.window_ms);
        while self.samples.front().is_some_and(|s| s.at_ms < cutoff) {
            self.samples.pop_front();
        }

        let window_min = self
            .samples
            .iter()
            .map(|s| s.skew_ms)
            .fold(f64::INFINITY, f64::min);

        if !self.initialized {
            self.skew_ms = window_min;
            self.initialized = true;
            info!("Initial clock skew estimate: {:.0}ms", window_min);
        } else if window_min <= self.skew_ms {
            self.skew_ms = window_min;
        } else {
            let elapsed_secs = self
                .last_sample_at_ms
                .map(|last| now.saturating_sub(last).max(0) as f64 / 1000.0)
                .unwrap_or(0.0);
            let max_step = self.config.max_increase_rate_ms_per_sec.max(0.0) * elapsed_secs;
            self.skew_ms = window_min.min(self.skew_ms + max_step);
        }
        self.last_sample_at_ms = Some(now);

        debug!(
            "Skew sample {:.0}ms, window min {:.0}ms, applied {:.1}ms ({} samples)",
            candidate,
            window_min,
            self.skew_ms,
            self.samples.len()
        );
    }

    /// Currently applied skew (`local wall - server wall`).
    pub fn get_skew_ms(&self) -> f64 {
        self.skew_ms
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Server wall time corresponding to local wall time `local_ms`.
    pub fn server_now_ms(&self, local_ms: i64) -> i64 {
        local_ms.saturating_sub(self.skew_ms.round() as i64)
    }

    /// Server wall time expressed on the local wall clock.
    pub fn apply_skew(&self, server_wall_ms: i64) -> i64 {
        server_wall_ms.saturating_add(self.skew_ms.round() as i64)
    }

    /// Wall time elapsed since a server-stamped event, never negative.
    pub fn elapsed_since(&self, server_wall_ms: i64, local_ms: i64) -> i64 {
        self.server_now_ms(local_ms)
            .saturating_sub(server_wall_ms)
            .max(0)
    }

    /// Forget all history. Used when the remote entity or connection changes.
    pub fn reset(&mut self) {
        if self.initialized {
            debug!("Resetting clock skew estimator (was {:.1}ms)", self.skew_ms);
        }
        self.samples.clear();
        self.skew_ms = 0.0;
        self.initialized = false;
        self.last_sample_at_ms = None;
    }
}
