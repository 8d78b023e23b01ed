//! Remote timer snapshots as delivered by the transport

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::utils::{parse_duration_value, parse_timestamp_ms};

/// Raw status string reported by the remote timer entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTimerStatus {
    Unavailable,
    Unknown,
    Idle,
    Active,
    Paused,
    Other(String),
}

impl RawTimerStatus {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "unavailable" => Self::Unavailable,
            "unknown" | "" => Self::Unknown,
            "idle" => Self::Idle,
            "active" => Self::Active,
            "paused" => Self::Paused,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One immutable observation of the remote timer. Wall-clock times in Unix ms.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTimerSnapshot {
    pub entity_id: Option<String>,
    pub status: RawTimerStatus,
    pub duration_seconds: Option<f64>,
    pub reported_remaining_seconds: Option<f64>,
    pub last_changed_at_ms: Option<i64>,
    /// Only meaningful while `Active`.
    pub finishes_at_ms: Option<i64>,
}

impl RemoteTimerSnapshot {
    pub fn new(status: RawTimerStatus) -> Self {
        Self {
            entity_id: None,
            status,
            duration_seconds: None,
            reported_remaining_seconds: None,
            last_changed_at_ms: None,
            finishes_at_ms: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_remaining(mut self, seconds: f64) -> Self {
        self.reported_remaining_seconds = Some(seconds);
        self
    }

    pub fn with_last_changed(mut self, at_ms: i64) -> Self {
        self.last_changed_at_ms = Some(at_ms);
        self
    }

    pub fn with_finishes_at(mut self, at_ms: i64) -> Self {
        self.finishes_at_ms = Some(at_ms);
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Count `elapsed_ms` off the reported remaining time of an active timer.
    /// A paused timer's remaining time does not move.
    pub fn age_by(&mut self, elapsed_ms: i64) {
        if elapsed_ms <= 0 || self.status != RawTimerStatus::Active {
            return;
        }
        if let Some(remaining) = self.reported_remaining_seconds.as_mut() {
            *remaining = (*remaining - elapsed_ms as f64 / 1000.0).max(0.0);
        }
    }
}

/// Timer attributes as they appear on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerAttributes {
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub remaining: Option<Value>,
    #[serde(default)]
    pub finishes_at: Option<String>,
}

/// Wire form of a snapshot: `{ status, attributes, last_changed }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEntityPayload {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(alias = "state")]
    pub status: String,
    #[serde(default)]
    pub attributes: TimerAttributes,
    #[serde(default)]
    pub last_changed: Option<String>,
}

impl From<TimerEntityPayload> for RemoteTimerSnapshot {
    fn from(payload: TimerEntityPayload) -> Self {
        let duration_seconds = payload
            .attributes
            .duration
            .as_ref()
            .and_then(parse_duration_value);
        let reported_remaining_seconds = payload
            .attributes
            .remaining
            .as_ref()
            .and_then(parse_duration_value);
        let last_changed_at_ms = payload.last_changed.as_deref().and_then(parse_timestamp_ms);
        let finishes_at_ms = payload
            .attributes
            .finishes_at
            .as_deref()
            .and_then(parse_timestamp_ms);

        if payload.attributes.duration.is_some() && duration_seconds.is_none() {
            warn!("Ignoring malformed timer duration: {:?}", payload.attributes.duration);
        }
        if payload.last_changed.is_some() && last_changed_at_ms.is_none() {
            warn!("Ignoring malformed last_changed: {:?}", payload.last_changed);
        }

        Self {
            entity_id: payload.entity_id,
            status: RawTimerStatus::parse(&payload.status),
            duration_seconds,
            reported_remaining_seconds,
            last_changed_at_ms,
            finishes_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aging_only_moves_active_remaining() {
        let mut active = RemoteTimerSnapshot::new(RawTimerStatus::Active).with_remaining(30.0);
        active.age_by(10_500);
        assert_eq!(active.reported_remaining_seconds, Some(19.5));
        active.age_by(60_000);
        assert_eq!(active.reported_remaining_seconds, Some(0.0));

        let mut paused = RemoteTimerSnapshot::new(RawTimerStatus::Paused).with_remaining(30.0);
        paused.age_by(10_000);
        assert_eq!(paused.reported_remaining_seconds, Some(30.0));
    }

    #[test]
    fn decodes_wire_payload() {
        let payload: TimerEntityPayload = serde_json::from_value(json!({
            "entity_id": "timer.kitchen",
            "state": "active",
            "attributes": {
                "duration": "0:05:00",
                "remaining": 120,
                "finishes_at": "1970-01-01T00:10:00+00:00"
            },
            "last_changed": "1970-01-01T00:05:00Z"
        }))
        .unwrap();
        let snap = RemoteTimerSnapshot::from(payload);

        assert_eq!(snap.entity_id.as_deref(), Some("timer.kitchen"));
        assert_eq!(snap.status, RawTimerStatus::Active);
        assert_eq!(snap.duration_seconds, Some(300.0));
        assert_eq!(snap.reported_remaining_seconds, Some(120.0));
        assert_eq!(snap.finishes_at_ms, Some(600_000));
        assert_eq!(snap.last_changed_at_ms, Some(300_000));
    }

    #[test]
    fn malformed_fields_become_absent() {
        let payload: TimerEntityPayload = serde_json::from_value(json!({
            "status": "Paused",
            "attributes": { "duration": "soon", "remaining": [1] },
            "last_changed": "whenever"
        }))
        .unwrap();
        let snap = RemoteTimerSnapshot::from(payload);

        assert_eq!(snap.status, RawTimerStatus::Paused);
        assert_eq!(snap.duration_seconds, None);
        assert_eq!(snap.reported_remaining_seconds, None);
        assert_eq!(snap.last_changed_at_ms, None);
    }

    #[test]
    fn raw_status_parsing() {
        assert_eq!(RawTimerStatus::parse("idle"), RawTimerStatus::Idle);
        assert_eq!(RawTimerStatus::parse(""), RawTimerStatus::Unknown);
        assert_eq!(
            RawTimerStatus::parse("restarting"),
            RawTimerStatus::Other("restarting".to_string())
        );
    }
}
