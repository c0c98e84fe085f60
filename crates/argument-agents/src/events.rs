//! Session event bus
//!
//! Pub/sub over a Tokio broadcast channel. Publishing never fails the
//! session: with no subscribers the event is simply dropped.

use std::sync::Arc;

use argument_coordination::{SelectionReason, StopReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Termination policy fired
    Stopped { reason: StopReason },
    /// The conversation transport reported it had already finished
    TransportFinished,
    /// Cancelled through the session's token
    Cancelled,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped { reason } => write!(f, "stopped: {}", reason),
            Self::TransportFinished => write!(f, "transport_finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle events of one session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: String,
        workers: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    SpeakerSelected {
        session_id: String,
        turn: u64,
        worker: String,
        reason: SelectionReason,
        timestamp: DateTime<Utc>,
    },
    TurnCompleted {
        session_id: String,
        turn: u64,
        worker: String,
        timestamp: DateTime<Utc>,
    },
    WorkerFailed {
        session_id: String,
        turn: u64,
        worker: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        turns: u64,
        end: SessionEnd,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SpeakerSelected { .. } => "speaker_selected",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::WorkerFailed { .. } => "worker_failed",
            Self::SessionEnded { .. } => "session_ended",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::SpeakerSelected { session_id, .. }
            | Self::TurnCompleted { session_id, .. }
            | Self::WorkerFailed { session_id, .. }
            | Self::SessionEnded { session_id, .. } => session_id,
        }
    }
}

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Broadcast bus for [`SessionEvent`]s
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> SessionEvent {
        SessionEvent::SessionStarted {
            session_id: "s-1".to_string(),
            workers: vec!["Orchestrator".to_string()],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(started());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new().shared();
        let mut rx = bus.subscribe();
        bus.publish(started());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "session_started");
        assert_eq!(event.session_id(), "s-1");
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = SessionEvent::SessionEnded {
            session_id: "s-1".to_string(),
            turns: 3,
            end: SessionEnd::Stopped {
                reason: StopReason::ConclusionReached,
            },
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "session_ended");
        assert_eq!(value["end"]["end"], "stopped");
        assert_eq!(value["end"]["reason"]["reason"], "conclusion_reached");
    }
}
