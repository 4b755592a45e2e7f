//! Event data model.
//!
//! A stream is a per-key, append-only sequence of events. Sequence numbers
//! start at 1 and increase by exactly 1 per committed event, with no gaps.
//! Version 0 means the stream does not exist yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event proposed for appending. The store assigns the sequence number
/// and timestamp at commit time; the writer supplies everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    /// Type tag used for reducer routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing a message through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the message that caused it.
    pub causation_id: Uuid,
}

impl NewEvent {
    /// Creates a proposed event with fresh correlation and causation IDs.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        let id = Uuid::new_v4();
        Self {
            event_type: event_type.into(),
            payload,
            correlation_id: id,
            causation_id: id,
        }
    }

    /// Sets the correlation and causation IDs, typically copied from the
    /// inbound message being handled.
    #[must_use]
    pub fn caused_by(mut self, correlation_id: Uuid, causation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self.causation_id = causation_id;
        self
    }
}

/// An event as committed to a stream. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream_id: String,
    /// Monotonically increasing, gapless sequence number within the stream.
    pub sequence_number: u64,
    /// Type tag used for reducer routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing message.
    pub causation_id: Uuid,
    /// Timestamp assigned by the store at commit time.
    pub recorded_at: DateTime<Utc>,
}
