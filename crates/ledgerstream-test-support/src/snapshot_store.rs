//! Test snapshot stores — scripted `SnapshotStore` implementations.

use async_trait::async_trait;

use ledgerstream_core::error::StoreError;
use ledgerstream_core::snapshot::{Snapshot, SnapshotStore};

/// A snapshot store whose `latest` always returns a snapshot that cannot
/// deserialize into any state type. Loaders must fall back to full
/// replay.
#[derive(Debug)]
pub struct CorruptSnapshotStore {
    sequence_number: u64,
}

impl CorruptSnapshotStore {
    /// Creates a store claiming a corrupt snapshot at `sequence_number`.
    #[must_use]
    pub fn at(sequence_number: u64) -> Self {
        Self { sequence_number }
    }
}

#[async_trait]
impl SnapshotStore for CorruptSnapshotStore {
    async fn latest(&self, stream_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(Some(Snapshot {
            stream_id: stream_id.to_owned(),
            sequence_number: self.sequence_number,
            state: serde_json::Value::String("not valid state".to_owned()),
        }))
    }

    async fn put(&self, _snapshot: Snapshot) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A snapshot store that always reports `StoreError::Unavailable`.
/// Loaders must treat this the same as an absent snapshot.
#[derive(Debug, Default)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn latest(&self, _stream_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn put(&self, _snapshot: Snapshot) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
