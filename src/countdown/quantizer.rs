//! Remaining-milliseconds to whole display seconds, without flicker

/// Default bias subtracted before quantizing.
pub const DEFAULT_HYSTERESIS_MS: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizePolicy {
    /// Delay before the display drops to the next lower second. Tuned together
    /// with the sampling cadence so ticks stay 0.85s-1.15s apart.
    pub hysteresis_ms: f64,
}

impl Default for QuantizePolicy {
    fn default() -> Self {
        Self {
            hysteresis_ms: DEFAULT_HYSTERESIS_MS,
        }
    }
}

/// Next display second for `remaining_ms`, never above `prev_display_seconds`.
pub fn quantize_display_seconds(
    remaining_ms: f64,
    prev_display_seconds: Option<u64>,
    policy: QuantizePolicy,
) -> u64 {
    let remaining_ms = if remaining_ms.is_finite() { remaining_ms } else { 0.0 };
    let biased = (remaining_ms - policy.hysteresis_ms.max(0.0)).max(0.0);
    let raw = (biased / 1000.0).ceil() as u64;

    match prev_display_seconds {
        Some(prev) if raw > prev => prev,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_delays_the_step_down() {
        let p = QuantizePolicy::default();
        assert_eq!(quantize_display_seconds(10_000.0, None, p), 10);
        assert_eq!(quantize_display_seconds(9_200.0, None, p), 10);
        assert_eq!(quantize_display_seconds(9_150.0, None, p), 9);
        assert_eq!(quantize_display_seconds(9_100.0, None, p), 9);
    }

    #[test]
    fn floor_holds_against_upward_jitter() {
        let p = QuantizePolicy::default();
        assert_eq!(quantize_display_seconds(9_400.0, Some(9), p), 9);
        assert_eq!(quantize_display_seconds(12_000.0, Some(9), p), 9);
        assert_eq!(quantize_display_seconds(7_500.0, Some(9), p), 8);
    }

    #[test]
    fn never_negative() {
        let p = QuantizePolicy::default();
        assert_eq!(quantize_display_seconds(100.0, None, p), 0);
        assert_eq!(quantize_display_seconds(-4_000.0, Some(3), p), 0);
        assert_eq!(quantize_display_seconds(f64::NAN, None, p), 0);
    }
}
