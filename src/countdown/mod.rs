//! Countdown rendering: baseline seeding, the monotonic engine and the
//! display-second quantizer.

pub mod engine;
pub mod quantizer;
pub mod seeder;

pub use engine::{MonotonicCountdownState, VISUAL_CORRECTION_THRESHOLD_MS};
pub use quantizer::{quantize_display_seconds, QuantizePolicy};
pub use seeder::{bound_local_clock_baseline, BaselineSeed, BaselineSeeder};
