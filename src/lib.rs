//! Countdown Sync - a visually monotonic countdown for a remote timer
//!
//! The authoritative timer lives on a server reachable over an intermittent
//! connection whose clock may disagree with ours. This library estimates that
//! clock skew, turns remote snapshots into a deadline on the local monotonic
//! clock, and renders whole seconds that never tick upwards except for
//! corrections large enough to matter.

pub mod api;
pub mod clock;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod skew;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use controller::{ControllerConfig, DisplayFrame, TimerController};
pub use skew::ClockSkewEstimator;
pub use state::AppState;
pub use utils::signals::shutdown_signal;
