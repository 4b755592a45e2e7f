//! Retry-orchestrated dispatch loop.
//!
//! Each inbound message runs the cycle LOADING → HANDLING → COMMITTING.
//! A commit conflict discards the state handle and the handler's declared
//! events and starts the cycle over against freshly loaded state, up to a
//! bound. Transient storage failures during commit are retried in place
//! with backoff. This loop is the only place conflicts are handled.
//!
//! Handlers declare events; they do not commit them. Because a conflict
//! re-executes the entire handler, any externally observable action
//! inside a handler must be idempotent — the supported pattern is to
//! defer external effects until `handle` returns [`Committed`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;

use ledgerstream_core::error::StoreError;
use ledgerstream_core::event::NewEvent;
use ledgerstream_core::reducer::ReducerRegistry;
use ledgerstream_core::snapshot::{Snapshot, SnapshotStore};
use ledgerstream_core::state::StateRef;
use ledgerstream_core::store::{EventStore, ExpectedVersion};

use crate::error::{HandlerError, ProcessError};
use crate::loader::AggregateLoader;
use crate::retry::RetryPolicy;

/// When to write a snapshot after a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Never snapshot; every load replays the full stream.
    Never,
    /// Snapshot whenever a commit crosses a multiple of `n` events.
    EveryNEvents(u64),
}

impl SnapshotPolicy {
    /// Returns `true` if a commit moving the stream from `previous` to
    /// `current` should produce a snapshot.
    #[must_use]
    pub fn due(self, previous: u64, current: u64) -> bool {
        match self {
            Self::Never | Self::EveryNEvents(0) => false,
            Self::EveryNEvents(n) => previous / n < current / n,
        }
    }
}

/// Successful outcome of one handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    /// The stream's version after the commit.
    pub version: u64,
    /// Number of events appended. Zero when the handler declared none.
    pub appended: usize,
}

/// Per-stream serialized processor wrapping user message handlers in the
/// load → handle → commit cycle.
///
/// Two in-flight invocations for the same stream id never interleave
/// their cycles; invocations for distinct streams run fully parallel.
pub struct StreamProcessor<S> {
    loader: AggregateLoader<S>,
    events: Arc<dyn EventStore>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    registry: Arc<ReducerRegistry<S>>,
    retry: RetryPolicy,
    snapshot_policy: SnapshotPolicy,
    stream_guards: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S> std::fmt::Debug for StreamProcessor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProcessor")
            .field("retry", &self.retry)
            .field("snapshot_policy", &self.snapshot_policy)
            .finish()
    }
}

impl<S> StreamProcessor<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Creates a processor with the default retry policy and no
    /// snapshotting.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>, registry: Arc<ReducerRegistry<S>>) -> Self {
        Self {
            loader: AggregateLoader::new(events.clone(), registry.clone()),
            events,
            snapshots: None,
            registry,
            retry: RetryPolicy::default(),
            snapshot_policy: SnapshotPolicy::Never,
            stream_guards: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Enables snapshot-seeded loads and snapshot writes per `policy`.
    #[must_use]
    pub fn with_snapshots(
        mut self,
        snapshots: Arc<dyn SnapshotStore>,
        policy: SnapshotPolicy,
    ) -> Self {
        self.loader = self.loader.with_snapshots(snapshots.clone());
        self.snapshots = Some(snapshots);
        self.snapshot_policy = policy;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs one message through the load → handle → commit cycle.
    ///
    /// The handler receives a [`StateRef`] valid for exactly one commit
    /// attempt and returns the events to append. After a conflict the
    /// handler re-executes against a freshly loaded `StateRef`; the
    /// handler must therefore be safe to re-run. A handler declaring no
    /// events succeeds without touching the store.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Load`] if loading fails; never retried.
    /// - [`ProcessError::Handler`] if the handler fails; never retried.
    /// - [`ProcessError::Storage`] if commits keep hitting transient
    ///   storage failures past the bounded backoff retries.
    /// - [`ProcessError::MaxRetriesExceeded`] if conflict retries are
    ///   exhausted.
    pub async fn handle<H, Fut>(
        &self,
        stream_id: &str,
        handler: H,
    ) -> Result<Committed, ProcessError>
    where
        H: Fn(StateRef<S>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Vec<NewEvent>, HandlerError>> + Send,
    {
        let guard = self.stream_guard(stream_id);
        let result = {
            let _serialized = guard.lock().await;
            self.run_cycle(stream_id, &handler).await
        };
        drop(guard);
        self.prune_stream_guards();
        result
    }

    /// One serialized load → handle → commit cycle, including conflict
    /// re-execution and storage backoff. Callers hold the stream guard.
    async fn run_cycle<H, Fut>(
        &self,
        stream_id: &str,
        handler: &H,
    ) -> Result<Committed, ProcessError>
    where
        H: Fn(StateRef<S>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Vec<NewEvent>, HandlerError>> + Send,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;

            // LOADING. Storage failures here surface immediately.
            let state_ref = self.loader.load(stream_id).await?;
            let expected = state_ref.version;

            // HANDLING. The handler gets its own copy of the handle; the
            // original stays behind for the post-commit snapshot fold.
            let new_events = handler(StateRef::new(state_ref.state.clone(), expected)).await?;

            if new_events.is_empty() {
                return Ok(Committed {
                    version: expected,
                    appended: 0,
                });
            }

            // COMMITTING.
            match self.commit_with_backoff(stream_id, expected, &new_events).await {
                Ok(version) => {
                    self.maybe_snapshot(stream_id, state_ref, &new_events, version)
                        .await;
                    return Ok(Committed {
                        version,
                        appended: new_events.len(),
                    });
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    if attempts > self.retry.max_conflict_retries {
                        return Err(ProcessError::MaxRetriesExceeded {
                            stream_id: stream_id.to_owned(),
                            attempts,
                        });
                    }
                    tracing::debug!(
                        stream_id,
                        expected,
                        actual,
                        attempt = attempts,
                        "commit conflict; reloading and re-running handler"
                    );
                }
                Err(e) => return Err(ProcessError::Storage(e)),
            }
        }
    }

    /// Attempts the conditional append, absorbing transient storage
    /// failures with bounded backoff. Conflicts return immediately; they
    /// are the outer loop's concern.
    async fn commit_with_backoff(
        &self,
        stream_id: &str,
        expected: u64,
        new_events: &[NewEvent],
    ) -> Result<u64, StoreError> {
        let mut storage_attempts: u32 = 0;
        loop {
            match self
                .events
                .append(stream_id, ExpectedVersion::Exact(expected), new_events.to_vec())
                .await
            {
                Ok(version) => return Ok(version),
                Err(conflict @ StoreError::Conflict { .. }) => return Err(conflict),
                Err(e @ StoreError::Unavailable(_)) => {
                    storage_attempts += 1;
                    if storage_attempts > self.retry.max_storage_retries {
                        return Err(e);
                    }
                    let delay = self.retry.backoff_delay(storage_attempts);
                    tracing::debug!(
                        stream_id,
                        attempt = storage_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "storage unavailable; backing off before retrying commit"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Writes a snapshot after a successful commit when the policy says
    /// one is due. The snapshot state is the pre-commit state folded
    /// through the just-committed events, so it never runs ahead of the
    /// durable history. All failures are logged and swallowed: snapshots
    /// are a cache.
    async fn maybe_snapshot(
        &self,
        stream_id: &str,
        state_ref: StateRef<S>,
        new_events: &[NewEvent],
        version: u64,
    ) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        if !self.snapshot_policy.due(state_ref.version, version) {
            return;
        }

        let mut state = state_ref.state;
        for event in new_events {
            match self
                .registry
                .apply_parts(state, &event.event_type, event.payload.clone())
                .await
            {
                Ok(next) => state = next,
                Err(e) => {
                    tracing::warn!(
                        stream_id,
                        error = %e,
                        "snapshot fold failed; skipping snapshot"
                    );
                    return;
                }
            }
        }

        let state = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    stream_id,
                    error = %e,
                    "snapshot serialization failed; skipping snapshot"
                );
                return;
            }
        };

        if let Err(e) = snapshots
            .put(Snapshot {
                stream_id: stream_id.to_owned(),
                sequence_number: version,
                state,
            })
            .await
        {
            tracing::warn!(stream_id, sequence = version, error = %e, "snapshot write failed");
        }
    }

    /// Returns the serialization guard for a stream, creating it on first
    /// use.
    fn stream_guard(&self, stream_id: &str) -> Arc<AsyncMutex<()>> {
        let mut guards = self.stream_guards.lock().unwrap();
        guards
            .entry(stream_id.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops guards no in-flight invocation holds, so the map tracks the
    /// working set of streams rather than every stream ever handled.
    fn prune_stream_guards(&self) {
        let mut guards = self.stream_guards.lock().unwrap();
        guards.retain(|_, guard| Arc::strong_count(guard) > 1);
    }

    /// Number of streams currently holding a serialization guard.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn guarded_streams(&self) -> usize {
        self.stream_guards.lock().unwrap().len()
    }
}
