use countdown_sync::countdown::{
    bound_local_clock_baseline, MonotonicCountdownState, VISUAL_CORRECTION_THRESHOLD_MS,
};
use proptest::prelude::*;

proptest! {
    /// Display never increases over non-decreasing time after a single seed.
    #[test]
    fn display_is_non_increasing(
        start in 0i64..1_000_000,
        remaining in 0i64..3_600_000,
        steps in prop::collection::vec(0i64..2_500, 1..200),
    ) {
        let mut state = MonotonicCountdownState::new();
        state.seed_baseline(Some(start + remaining), true);

        let mut now = start;
        let mut prev = state.display_seconds(now).unwrap();
        for step in steps {
            now += step;
            let next = state.display_seconds(now).unwrap();
            prop_assert!(next <= prev, "display went up from {} to {} at {}", prev, next, now);
            prev = next;
        }
    }

    /// Past the baseline the display is pinned at zero.
    #[test]
    fn display_is_zero_after_baseline(
        end in 0i64..100_000,
        overshoots in prop::collection::vec(0i64..10_000, 1..50),
    ) {
        let mut state = MonotonicCountdownState::new();
        state.seed_baseline(Some(end), true);
        let mut now = end;
        for overshoot in overshoots {
            now += overshoot;
            prop_assert_eq!(state.display_seconds(now), Some(0));
            prop_assert_eq!(state.remaining_ms(now), Some(0));
        }
    }

    /// A correction below the threshold seeded without allow_increase does
    /// not change what is shown at the same instant.
    #[test]
    fn small_corrections_are_absorbed(
        remaining in 2_000i64..600_000,
        elapsed in 0i64..1_500,
        correction in -(VISUAL_CORRECTION_THRESHOLD_MS - 1)..VISUAL_CORRECTION_THRESHOLD_MS,
    ) {
        let mut state = MonotonicCountdownState::new();
        state.seed_baseline(Some(remaining), true);
        let now = elapsed;
        let before = state.display_seconds(now).unwrap();

        state.seed_baseline(Some(remaining + correction), false);
        let after = state.display_seconds(now).unwrap();
        if correction >= 0 {
            prop_assert_eq!(after, before);
        } else {
            prop_assert!(after <= before);
        }
    }

    /// A material correction shows the true remaining time even upwards.
    #[test]
    fn material_corrections_jump(
        remaining in 1_000i64..600_000,
        elapsed in 0i64..1_000,
        correction in VISUAL_CORRECTION_THRESHOLD_MS..120_000,
    ) {
        let mut state = MonotonicCountdownState::new();
        state.seed_baseline(Some(remaining), true);
        let now = elapsed;
        state.display_seconds(now);

        let new_end = remaining + correction;
        state.seed_baseline(Some(new_end), true);
        let expected = ((new_end - now) as f64 / 1000.0).ceil() as u64;
        prop_assert_eq!(state.display_seconds(now), Some(expected));
    }

    /// With skew correction off, a re-derived remaining time never exceeds
    /// the previous one.
    #[test]
    fn local_clock_bound_never_exceeds_previous(
        derived in -100.0f64..100_000.0,
        previous in 0.0f64..100_000.0,
    ) {
        let bounded = bound_local_clock_baseline(derived, previous);
        prop_assert!(bounded <= previous);
        prop_assert!(bounded <= derived.max(0.0));
    }
}

#[test]
fn unseeded_countdown_is_undefined_not_zero() {
    let mut state = MonotonicCountdownState::new();
    assert_eq!(state.display_seconds(10), None);
    state.seed_baseline(Some(500), true);
    assert_eq!(state.display_seconds(10_000), Some(0));
    state.seed_baseline(None, false);
    assert_eq!(state.display_seconds(10_000), None);
}
