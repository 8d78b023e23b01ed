//! Normalized timer view handed to the rendering layer

use serde::{Deserialize, Serialize};

/// Normalized timer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Finished,
    Unavailable,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Finished => "finished",
            TimerStatus::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer state as the display should see it.
///
/// Replaced wholesale on every transition. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerViewState {
    pub status: TimerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed_ts: Option<i64>,
    /// Wall-clock deadline of the finished overlay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_until_ts: Option<i64>,
    #[serde(default)]
    pub remaining_is_estimated: bool,
    /// How far elapsed time overshot the duration when estimating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimation_drift_seconds: Option<f64>,
    /// Running but paused on the remote side.
    #[serde(default)]
    pub paused: bool,
}

impl TimerViewState {
    pub fn unavailable() -> Self {
        Self::with_status(TimerStatus::Unavailable)
    }

    pub fn with_status(status: TimerStatus) -> Self {
        Self {
            status,
            duration_seconds: None,
            remaining_seconds: None,
            last_changed_ts: None,
            finished_until_ts: None,
            remaining_is_estimated: false,
            estimation_drift_seconds: None,
            paused: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Running and actually counting down.
    pub fn is_ticking(&self) -> bool {
        self.is_running() && !self.paused
    }
}

impl Default for TimerViewState {
    fn default() -> Self {
        Self::unavailable()
    }
}
