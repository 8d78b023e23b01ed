//! State management module
//!
//! Remote snapshots, the normalized view state, the timer state machine and
//! the host's shared application state.

pub mod app_state;
pub mod machine;
pub mod snapshot;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use machine::{DurationBounds, TimerStateMachine};
pub use snapshot::{RawTimerStatus, RemoteTimerSnapshot, TimerEntityPayload};
pub use timer_state::{TimerStatus, TimerViewState};
