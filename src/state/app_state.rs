//! Shared host state wrapping the timer controller

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

use super::RemoteTimerSnapshot;
use crate::{
    clock::SharedClock,
    controller::{ControllerConfig, DisplayFrame, TimerController},
};

/// Application state shared by the HTTP handlers and the background tasks
#[derive(Debug)]
pub struct AppState {
    /// The single owner of all timer state; every mutation goes through this lock
    pub controller: Arc<Mutex<TimerController>>,
    pub clock: SharedClock,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last event tracking
    pub last_event: Arc<Mutex<Option<String>>>,
    pub last_event_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Latest rendered frame
    pub frame_tx: watch::Sender<DisplayFrame>,
    /// Keep the receiver alive to prevent channel closure
    pub _frame_rx: watch::Receiver<DisplayFrame>,
    /// Supersedes the display ticker's pending wake-up
    pub reschedule: Arc<Notify>,
}

impl AppState {
    pub fn new(port: u16, host: String, clock: SharedClock, config: ControllerConfig) -> Self {
        let (frame_tx, frame_rx) = watch::channel(DisplayFrame::empty());

        Self {
            controller: Arc::new(Mutex::new(TimerController::new(clock.clone(), config))),
            clock,
            start_time: Instant::now(),
            port,
            host,
            last_event: Arc::new(Mutex::new(None)),
            last_event_time: Arc::new(Mutex::new(None)),
            frame_tx,
            _frame_rx: frame_rx,
            reschedule: Arc::new(Notify::new()),
        }
    }

    /// Apply an event to the controller, publish the frame and wake the ticker
    pub fn apply_event<F>(&self, event: &str, apply: F) -> Result<DisplayFrame, String>
    where
        F: FnOnce(&mut TimerController) -> DisplayFrame,
    {
        let mut controller = self
            .controller
            .lock()
            .map_err(|e| format!("Failed to lock timer controller: {}", e))?;

        let frame = apply(&mut controller);
        drop(controller); // Release the lock early

        if let Ok(mut last_event) = self.last_event.lock() {
            *last_event = Some(event.to_string());
        }
        if let Ok(mut last_time) = self.last_event_time.lock() {
            *last_time = Some(Utc::now());
        }

        self.publish(frame.clone());
        self.reschedule.notify_one();
        Ok(frame)
    }

    pub fn ingest_snapshot(&self, snapshot: RemoteTimerSnapshot) -> Result<DisplayFrame, String> {
        self.apply_event("snapshot", |c| c.ingest_snapshot(snapshot))
    }

    pub fn ingest_server_time(&self, timestamp: &str) -> Result<DisplayFrame, String> {
        self.apply_event("server-time", |c| c.ingest_server_time(timestamp))
    }

    pub fn mark_finished(&self) -> Result<DisplayFrame, String> {
        info!("Explicit finished event received");
        self.apply_event("finished", |c| c.mark_finished())
    }

    pub fn reset(&self) -> Result<DisplayFrame, String> {
        self.apply_event("reset", |c| {
            c.reset();
            c.render()
        })
    }

    pub fn reset_skew(&self) -> Result<DisplayFrame, String> {
        self.apply_event("clock-jump", |c| c.reset_skew())
    }

    /// Ticker wake-up: render and report when the next one is due.
    /// `scheduled` is false when an event cut the previous sleep short.
    pub fn advance(&self, scheduled: bool) -> Result<(DisplayFrame, Option<Duration>), String> {
        let mut controller = self
            .controller
            .lock()
            .map_err(|e| format!("Failed to lock timer controller: {}", e))?;

        let frame = controller.advance(scheduled);
        let next = controller.next_wakeup();
        drop(controller);

        self.publish(frame.clone());
        Ok((frame, next))
    }

    /// Current frame without touching the schedule
    pub fn current_frame(&self) -> DisplayFrame {
        self.frame_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayFrame> {
        self.frame_tx.subscribe()
    }

    fn publish(&self, frame: DisplayFrame) {
        if let Err(e) = self.frame_tx.send(frame) {
            warn!("Failed to publish display frame: {}", e);
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    pub fn get_last_event(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_event = self.last_event.lock().ok().and_then(|a| a.clone());
        let last_event_time = self.last_event_time.lock().ok().and_then(|t| *t);
        (last_event, last_event_time)
    }
}
