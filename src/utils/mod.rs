//! Utility functions module
//!
//! Parsing helpers for the remote timer's wire formats and shutdown signal
//! handling for the host binary.

pub mod parse;
pub mod signals;

// Re-export main functions
pub use parse::{format_hms, parse_duration_text, parse_duration_value, parse_timestamp_ms};
pub use signals::shutdown_signal;
