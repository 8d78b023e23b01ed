//! Background tasks module
//!
//! These tasks run alongside the HTTP server and drive the countdown between
//! transport events.

pub mod clock_watchdog;
pub mod display_ticker;

// Re-export main functions
pub use clock_watchdog::clock_watchdog_task;
pub use display_ticker::display_ticker_task;
