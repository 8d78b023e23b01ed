//! Injectable monotonic and wall clocks
//!
//! Every time-dependent piece of the core reads time through [`Clock`] so that
//! tests can drive it deterministically with [`ManualClock`].

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::{Instant, SystemTime, UNIX_EPOCH},
};

/// Source of the two time bases the countdown core works with.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds on a clock that never goes backwards. The epoch is arbitrary.
    fn monotonic_ms(&self) -> i64;

    /// Milliseconds since the Unix epoch on the local wall clock.
    fn wall_ms(&self) -> i64;
}

/// Clock handle shared between the estimator, the seeder and the host.
pub type SharedClock = Arc<dyn Clock>;

/// Real clocks: `Instant` for monotonic time, `SystemTime` for wall time
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    fn wall_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            // Wall clock set before 1970
            Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
        }
    }
}

/// Hand-driven clock for tests and replay.
///
/// `advance` moves both bases together; `step_wall` moves only the wall clock,
/// which is how a wall-clock adjustment looks from the inside.
#[derive(Debug)]
pub struct ManualClock {
    monotonic: AtomicI64,
    wall: AtomicI64,
}

impl ManualClock {
    pub fn new(monotonic_ms: i64, wall_ms: i64) -> Self {
        Self {
            monotonic: AtomicI64::new(monotonic_ms),
            wall: AtomicI64::new(wall_ms),
        }
    }

    pub fn shared(monotonic_ms: i64, wall_ms: i64) -> Arc<Self> {
        Arc::new(Self::new(monotonic_ms, wall_ms))
    }

    pub fn advance(&self, ms: i64) {
        self.monotonic.fetch_add(ms, Ordering::SeqCst);
        self.wall.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn step_wall(&self, ms: i64) {
        self.wall.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> i64 {
        self.monotonic.load(Ordering::SeqCst)
    }

    fn wall_ms(&self) -> i64 {
        self.wall.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_both_bases() {
        let clock = ManualClock::new(100, 1_000_000);
        clock.advance(250);
        assert_eq!(clock.monotonic_ms(), 350);
        assert_eq!(clock.wall_ms(), 1_000_250);

        clock.step_wall(-5_000);
        assert_eq!(clock.monotonic_ms(), 350);
        assert_eq!(clock.wall_ms(), 995_250);
    }

    #[test]
    fn system_clock_monotonic_does_not_go_backwards() {
        let clock = SystemClock::new();
        let a = clock.monotonic_ms();
        let b = clock.monotonic_ms();
        assert!(b >= a);
        assert!(clock.wall_ms() > 0);
    }
}
