//! Snapshot data model and store abstraction.
//!
//! A snapshot is a cache of materialized state at a sequence number, never
//! authoritative. Every consumer must behave identically whether a
//! snapshot is absent, stale, or undeserializable: fall back to full
//! replay from sequence 0. A snapshot may lag the true stream head; it
//! must never run ahead of it, which is why snapshots are written only
//! after their constituent events are durably committed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A point-in-time materialization of stream state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stream this snapshot belongs to.
    pub stream_id: String,
    /// Sequence number of the last event folded into `state`.
    pub sequence_number: u64,
    /// Serialized state at `sequence_number`.
    pub state: serde_json::Value,
}

/// Store trait for reading and writing snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns the most recent snapshot for the stream, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on infrastructure failure.
    /// Callers treat this the same as an absent snapshot.
    async fn latest(&self, stream_id: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Persists a snapshot, replacing any older one for the same stream.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on infrastructure failure.
    async fn put(&self, snapshot: Snapshot) -> Result<(), StoreError>;
}
