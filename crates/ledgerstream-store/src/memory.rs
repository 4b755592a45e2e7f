//! In-memory event and snapshot stores.
//!
//! The version check and the multi-event append happen inside one mutex
//! critical section, so two racing appends with the same expected version
//! resolve to exactly one winner and one conflict, and sequence numbers
//! stay gapless. No lock is held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use ledgerstream_core::error::StoreError;
use ledgerstream_core::event::{NewEvent, RecordedEvent};
use ledgerstream_core::snapshot::{Snapshot, SnapshotStore};
use ledgerstream_core::store::{EventStore, ExpectedVersion};

use crate::clock::{Clock, WallClock};

/// In-memory `EventStore` keyed by stream id.
///
/// `Clone` is cheap: clones share the same underlying streams.
#[derive(Clone)]
pub struct InMemoryEventStore {
    streams: Arc<Mutex<HashMap<String, Vec<RecordedEvent>>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let streams = self.streams.lock().unwrap();
        f.debug_struct("InMemoryEventStore")
            .field("streams", &streams.len())
            .finish()
    }
}

impl InMemoryEventStore {
    /// Creates an empty store timestamping events with the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(WallClock))
    }

    /// Creates an empty store timestamping events with the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Returns the stream's current version (0 if the stream is empty).
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn version(&self, stream_id: &str) -> u64 {
        let streams = self.streams.lock().unwrap();
        streams.get(stream_id).map_or(0, |events| events.len() as u64)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn events_after(
        &self,
        stream_id: &str,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, StoreError> {
        let streams = self.streams.lock().unwrap();
        let events = streams
            .get(stream_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.sequence_number > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn append(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
    ) -> Result<u64, StoreError> {
        let recorded_at = self.clock.timestamp();
        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(stream_id.to_owned()).or_default();
        let current = stream.len() as u64;

        if let ExpectedVersion::Exact(expected) = expected
            && expected != current
        {
            return Err(StoreError::Conflict {
                stream_id: stream_id.to_owned(),
                expected,
                actual: current,
            });
        }

        for (i, event) in events.into_iter().enumerate() {
            stream.push(RecordedEvent {
                event_id: Uuid::new_v4(),
                stream_id: stream_id.to_owned(),
                sequence_number: current + 1 + i as u64,
                event_type: event.event_type,
                payload: event.payload,
                correlation_id: event.correlation_id,
                causation_id: event.causation_id,
                recorded_at,
            });
        }

        let version = stream.len() as u64;
        tracing::trace!(stream_id, version, "events appended");
        Ok(version)
    }
}

/// In-memory `SnapshotStore` holding at most one snapshot per stream.
///
/// `put` keeps whichever snapshot covers the higher sequence number, so a
/// lagging writer can never roll the cache backwards.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<Mutex<HashMap<String, Snapshot>>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty snapshot store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the snapshot for a stream, if any. Correctness must not
    /// depend on this: callers fall back to full replay.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn remove(&self, stream_id: &str) {
        self.snapshots.lock().unwrap().remove(stream_id);
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn latest(&self, stream_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshots.lock().unwrap().get(stream_id).cloned())
    }

    async fn put(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.lock().unwrap();
        match snapshots.get(&snapshot.stream_id) {
            Some(existing) if existing.sequence_number >= snapshot.sequence_number => {}
            _ => {
                snapshots.insert(snapshot.stream_id.clone(), snapshot);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use super::*;

    struct PinnedClock(DateTime<Utc>);

    impl Clock for PinnedClock {
        fn timestamp(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[tokio::test]
    async fn test_append_stamps_events_from_the_injected_clock() {
        let committed_at = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        let store = InMemoryEventStore::with_clock(Arc::new(PinnedClock(committed_at)));

        store
            .append(
                "key-123",
                ExpectedVersion::Exact(0),
                vec![
                    NewEvent::new("Incremented", json!({ "amount": 5 })),
                    NewEvent::new("Incremented", json!({ "amount": 3 })),
                ],
            )
            .await
            .unwrap();

        // One append, one commit timestamp for the whole batch.
        let events = store.events_after("key-123", 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.recorded_at == committed_at));
    }
}
