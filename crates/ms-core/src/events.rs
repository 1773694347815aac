//! In-process event notifications.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel. Delivery is
//! best-effort: every receiver subscribed when an event is sent gets it, and
//! nothing is persisted or replayed for late subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::MediaId;

/// Name of the notification emitted after metadata is written for a record.
pub const MEDIA_UPDATED: &str = "media:updated";

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// Technical metadata for a media record was extracted and stored.
    #[serde(rename = "media:updated")]
    MediaUpdated { id: MediaId, path: String },
}

impl EventPayload {
    /// Wire name of the event, as consumed by the UI cache layer.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MediaUpdated { .. } => MEDIA_UPDATED,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast fan-out to in-process subscribers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// missing events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Send an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn broadcast(&self, payload: EventPayload) -> usize {
        let name = payload.name();
        // No subscribers is not an error.
        let delivered = self.tx.send(Event::new(payload)).unwrap_or(0);
        tracing::trace!(event = name, delivered, "Event broadcast");
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
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

    fn updated(id: &str) -> EventPayload {
        EventPayload::MediaUpdated {
            id: MediaId::from(id),
            path: format!("/media/{id}.mp4"),
        }
    }

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.broadcast(updated("v1")), 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload, updated("v1"));
        assert_eq!(event.payload.name(), MEDIA_UPDATED);
    }

    #[test]
    fn every_subscriber_is_called() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.broadcast(updated("v1")), 2);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        assert_eq!(bus.broadcast(updated("v1")), 0);
    }

    #[test]
    fn late_subscriber_gets_no_replay() {
        let bus = EventBus::default();
        bus.broadcast(updated("v1"));

        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn payload_serializes_with_event_name() {
        let json = serde_json::to_value(updated("v1")).unwrap();
        assert_eq!(json["type"], "media:updated");
        assert_eq!(json["id"], "v1");
        assert_eq!(json["path"], "/media/v1.mp4");
    }
}
