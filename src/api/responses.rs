//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controller::DisplayFrame;

/// Body of `POST /server-time`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTimeRequest {
    pub timestamp: String,
}

/// Response to every event endpoint: the frame rendered right after the event
#[derive(Debug, Clone, Serialize)]
pub struct FrameResponse {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub frame: DisplayFrame,
}

impl FrameResponse {
    pub fn new(event: &str, frame: DisplayFrame) -> Self {
        Self {
            event: event.to_string(),
            timestamp: Utc::now(),
            frame,
        }
    }
}

/// Status response with host metadata
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub frame: DisplayFrame,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_event: Option<String>,
    pub last_event_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
