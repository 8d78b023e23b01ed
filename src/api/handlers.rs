//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{debug, error};

use crate::state::{AppState, RemoteTimerSnapshot, TimerEntityPayload};
use super::responses::{FrameResponse, HealthResponse, ServerTimeRequest, StatusResponse};

fn respond(event: &str, result: Result<crate::controller::DisplayFrame, String>) -> Result<Json<FrameResponse>, StatusCode> {
    match result {
        Ok(frame) => Ok(Json(FrameResponse::new(event, frame))),
        Err(e) => {
            error!("Failed to apply {} event: {}", event, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /snapshot - A new remote timer snapshot
pub async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TimerEntityPayload>,
) -> Result<Json<FrameResponse>, StatusCode> {
    debug!("Snapshot received: status={}", payload.status);
    let snapshot = RemoteTimerSnapshot::from(payload);
    respond("snapshot", state.ingest_snapshot(snapshot))
}

/// Handle POST /server-time - A server-stamped timestamp for skew estimation
pub async fn server_time_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ServerTimeRequest>,
) -> Result<Json<FrameResponse>, StatusCode> {
    respond("server-time", state.ingest_server_time(&request.timestamp))
}

/// Handle POST /finished - Explicit finished notification from the transport
pub async fn finished_handler(State(state): State<Arc<AppState>>) -> Result<Json<FrameResponse>, StatusCode> {
    respond("finished", state.mark_finished())
}

/// Handle POST /reset - Reconnect or entity unset
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Result<Json<FrameResponse>, StatusCode> {
    respond("reset", state.reset())
}

/// Handle GET /status - Current frame and host metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_event, last_event_time) = state.get_last_event();

    Json(StatusResponse {
        frame: state.current_frame(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_event,
        last_event_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
