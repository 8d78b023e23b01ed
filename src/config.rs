//! Configuration and CLI argument handling

use clap::Parser;

use crate::{
    controller::ControllerConfig,
    countdown::QuantizePolicy,
    skew::SkewConfig,
    state::DurationBounds,
};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "countdown-sync")]
#[command(about = "Skew-corrected countdown host for a remote timer entity")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// How long the finished overlay stays up, in milliseconds
    #[arg(long, default_value = "5000")]
    pub finished_overlay_ms: i64,

    /// Disable server clock skew correction
    #[arg(long)]
    pub no_skew: bool,

    /// Lower bound for timer durations, in seconds
    #[arg(long, default_value = "0")]
    pub min_duration: f64,

    /// Upper bound for timer durations, in seconds
    #[arg(long, default_value = "86400")]
    pub max_duration: f64,

    /// Sliding window for skew samples, in milliseconds
    #[arg(long, default_value = "60000")]
    pub skew_window_ms: i64,

    /// Skew samples are clamped to this magnitude, in milliseconds
    #[arg(long, default_value = "10000")]
    pub skew_max_magnitude_ms: i64,

    /// Maximum skew increase, in milliseconds per second
    #[arg(long, default_value = "200")]
    pub skew_max_increase_rate: f64,

    /// Display quantizer hysteresis, in milliseconds
    #[arg(long, default_value = "150")]
    pub hysteresis_ms: f64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Core configuration, free of any CLI types
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            finished_overlay_ms: self.finished_overlay_ms.max(0),
            skew_enabled: !self.no_skew,
            duration_bounds: DurationBounds {
                min_seconds: self.min_duration,
                max_seconds: self.max_duration,
            },
            skew: SkewConfig {
                window_ms: self.skew_window_ms.max(0),
                max_magnitude_ms: self.skew_max_magnitude_ms,
                max_increase_rate_ms_per_sec: self.skew_max_increase_rate,
            },
            quantize: QuantizePolicy {
                hysteresis_ms: self.hysteresis_ms,
            },
        }
    }
}
