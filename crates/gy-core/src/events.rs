//! Progress events broadcast to UI subscribers.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late-joining clients can catch up.
//! The serialized form is exactly what WebSocket subscribers receive:
//!
//! ```json
//! {"sender":"logger","level":"INFO","message":"..."}
//! {"sender":"worker","src":"worker-1","event":"working","target":"..."}
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// Lifecycle phase of a worker, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Ready,
    Working,
    Done,
    Error,
}

/// A single progress event, shipped to all subscribers verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sender", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// A log record forwarded from a worker.
    Logger { level: String, message: String },
    /// A worker lifecycle transition.
    Worker {
        /// Worker name.
        src: String,
        event: WorkerPhase,
        /// Task display name, present on `working`.
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        /// Error description, present on `error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ProgressEvent {
    /// Create a logger event.
    pub fn logger(level: impl Into<String>, message: impl Into<String>) -> Self {
        ProgressEvent::Logger {
            level: level.into(),
            message: message.into(),
        }
    }

    /// Create a worker event without target or message.
    pub fn worker(src: impl Into<String>, event: WorkerPhase) -> Self {
        ProgressEvent::Worker {
            src: src.into(),
            event,
            target: None,
            message: None,
        }
    }

    /// Create a `working` event carrying the task display name.
    pub fn working(src: impl Into<String>, target: impl Into<String>) -> Self {
        ProgressEvent::Worker {
            src: src.into(),
            event: WorkerPhase::Working,
            target: Some(target.into()),
            message: None,
        }
    }

    /// Create an `error` event carrying a description.
    pub fn worker_error(src: impl Into<String>, message: impl Into<String>) -> Self {
        ProgressEvent::Worker {
            src: src.into(),
            event: WorkerPhase::Error,
            target: None,
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
    recent: RwLock<VecDeque<ProgressEvent>>,
}

impl EventBus {
    /// Create a new event bus. `capacity` controls the broadcast channel
    /// buffer size (not the ring buffer, which is always
    /// [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, event: ProgressEvent) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<ProgressEvent> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.broadcast(ProgressEvent::worker("worker-1", WorkerPhase::Ready));

        let event = rx.try_recv().unwrap();
        assert_eq!(event, ProgressEvent::worker("worker-1", WorkerPhase::Ready));
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for _ in 0..150 {
            bus.broadcast(ProgressEvent::logger("INFO", "tick"));
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(ProgressEvent::worker_error("worker-1", "boom"));
    }

    #[test]
    fn worker_event_wire_shape() {
        let event = ProgressEvent::working("worker-1", "broadcasts#1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sender"], "worker");
        assert_eq!(json["src"], "worker-1");
        assert_eq!(json["event"], "working");
        assert_eq!(json["target"], "broadcasts#1");
        // absent fields are omitted entirely
        assert!(json.get("message").is_none());
    }

    #[test]
    fn logger_event_wire_shape() {
        let event = ProgressEvent::logger("DEBUG", "fetched page 3");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sender"], "logger");
        assert_eq!(json["level"], "DEBUG");
        assert_eq!(json["message"], "fetched page 3");
    }
}
