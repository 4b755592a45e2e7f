//! Aggregate loading: snapshot seed plus event suffix replay.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use ledgerstream_core::reducer::ReducerRegistry;
use ledgerstream_core::snapshot::SnapshotStore;
use ledgerstream_core::state::StateRef;
use ledgerstream_core::store::EventStore;

use crate::error::LoadError;

/// Reconstructs a stream's state from the latest usable snapshot and the
/// events committed after it.
///
/// The snapshot store is optional and only ever an optimization: a
/// missing, stale, or undeserializable snapshot changes replay cost,
/// never the reconstructed state.
pub struct AggregateLoader<S> {
    events: Arc<dyn EventStore>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    registry: Arc<ReducerRegistry<S>>,
}

impl<S> std::fmt::Debug for AggregateLoader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateLoader")
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}

impl<S> AggregateLoader<S>
where
    S: DeserializeOwned + Send + 'static,
{
    /// Creates a loader that always replays from sequence 0.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>, registry: Arc<ReducerRegistry<S>>) -> Self {
        Self {
            events,
            snapshots: None,
            registry,
        }
    }

    /// Enables snapshot-seeded loading.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Loads the stream's current state and version.
    ///
    /// Seeds from the latest snapshot when one exists and deserializes,
    /// otherwise from a fresh initial state at sequence 0, then applies
    /// every later event in order.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Storage`] if the event fetch fails, and
    /// [`LoadError::Replay`] if a reducer rejects a committed event.
    /// Snapshot failures of any kind are logged and degrade to full
    /// replay.
    pub async fn load(&self, stream_id: &str) -> Result<StateRef<S>, LoadError> {
        let (mut state, mut version) = self.seed(stream_id).await;

        let events = self.events.events_after(stream_id, version).await?;

        for event in &events {
            let sequence = event.sequence_number;
            state = self
                .registry
                .apply(state, event)
                .await
                .map_err(|source| LoadError::Replay {
                    stream_id: stream_id.to_owned(),
                    sequence,
                    source,
                })?;
            version = sequence;
        }

        Ok(StateRef::new(state, version))
    }

    /// Resolves the replay seed: `(snapshot state, snapshot sequence)` if
    /// a usable snapshot exists, else `(initial state, 0)`.
    async fn seed(&self, stream_id: &str) -> (S, u64) {
        let Some(snapshots) = &self.snapshots else {
            return (self.registry.initial_state(), 0);
        };

        let snapshot = match snapshots.latest(stream_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return (self.registry.initial_state(), 0),
            Err(e) => {
                tracing::warn!(
                    stream_id,
                    error = %e,
                    "snapshot fetch failed; replaying from sequence 0"
                );
                return (self.registry.initial_state(), 0);
            }
        };

        match serde_json::from_value::<S>(snapshot.state) {
            Ok(state) => (state, snapshot.sequence_number),
            Err(e) => {
                tracing::warn!(
                    stream_id,
                    sequence = snapshot.sequence_number,
                    error = %e,
                    "snapshot failed to deserialize; replaying from sequence 0"
                );
                (self.registry.initial_state(), 0)
            }
        }
    }
}
