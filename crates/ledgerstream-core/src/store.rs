//! Event store abstraction.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::{NewEvent, RecordedEvent};

/// Precondition for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Event-sourced flavor: the stream's last sequence number must equal
    /// this value or the append fails with `StoreError::Conflict` and
    /// nothing is written.
    Exact(u64),
    /// Streaming flavor: no precondition. The store assigns the next
    /// sequence numbers unconditionally and never reports a conflict.
    Any,
}

/// Store trait for reading and conditionally appending stream events.
///
/// Both append flavors share the sequence-numbering guarantee: committed
/// sequence numbers form the contiguous range `1..=N` per stream, with no
/// duplicates or gaps, under concurrent attempts. The multi-event append
/// is atomic; a conflicting batch is rejected whole, never applied
/// partially.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Loads all events for a stream with sequence number strictly greater
    /// than `after`, ordered ascending.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on infrastructure failure.
    async fn events_after(
        &self,
        stream_id: &str,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, StoreError>;

    /// Atomically appends `events` to the stream if `expected` holds,
    /// assigning consecutive sequence numbers. Returns the stream's new
    /// version (the sequence number of the last appended event).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if `expected` is `Exact(v)` and the
    /// stream's current version differs from `v`, and
    /// `StoreError::Unavailable` on infrastructure failure.
    async fn append(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
    ) -> Result<u64, StoreError>;
}
