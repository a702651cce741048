//! Event types for the tunepipe event system
//!
//! Provides the shared event definitions and the EventBus used to fan job
//! progress out to SSE subscribers.

use crate::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// tunepipe event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TunepipeEvent {
    /// A download job was accepted and queued
    JobCreated {
        job_id: Uuid,
        track_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A job moved between states
    JobStateChanged {
        job_id: Uuid,
        old_status: JobStatus,
        new_status: JobStatus,
        timestamp: DateTime<Utc>,
    },

    /// Source audio transfer progress
    ///
    /// `total_bytes` is 0 and `percentage` is None when the upstream did not
    /// declare a content length.
    DownloadProgress {
        job_id: Uuid,
        bytes_received: u64,
        total_bytes: u64,
        percentage: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// Job finished and its artifact is available
    JobCompleted {
        job_id: Uuid,
        file_path: String,
        timestamp: DateTime<Utc>,
    },

    /// Job failed at the named stage
    JobFailed {
        job_id: Uuid,
        stage: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl TunepipeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TunepipeEvent::JobCreated { .. } => "JobCreated",
            TunepipeEvent::JobStateChanged { .. } => "JobStateChanged",
            TunepipeEvent::DownloadProgress { .. } => "DownloadProgress",
            TunepipeEvent::JobCompleted { .. } => "JobCompleted",
            TunepipeEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            TunepipeEvent::JobCreated { job_id, .. }
            | TunepipeEvent::JobStateChanged { job_id, .. }
            | TunepipeEvent::DownloadProgress { job_id, .. }
            | TunepipeEvent::JobCompleted { job_id, .. }
            | TunepipeEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for tunepipe events
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TunepipeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TunepipeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TunepipeEvent,
    ) -> Result<usize, broadcast::error::SendError<TunepipeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TunepipeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let job_id = Uuid::new_v4();

        bus.emit(TunepipeEvent::JobCreated {
            job_id,
            track_id: "Wu5FY8J6P8Q".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "JobCreated");
        assert_eq!(event.job_id(), job_id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = TunepipeEvent::JobFailed {
            job_id: Uuid::new_v4(),
            stage: "transcode".to_string(),
            error: "exit status 1".to_string(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_progress_event_serializes_with_tag() {
        let event = TunepipeEvent::DownloadProgress {
            job_id: Uuid::nil(),
            bytes_received: 500,
            total_bytes: 0,
            percentage: None,
            timestamp: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DownloadProgress");
        assert_eq!(json["bytes_received"], 500);
        assert!(json["percentage"].is_null());
    }
}
