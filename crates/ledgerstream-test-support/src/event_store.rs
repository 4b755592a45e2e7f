//! Test event stores — scripted `EventStore` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ledgerstream_core::error::StoreError;
use ledgerstream_core::event::{NewEvent, RecordedEvent};
use ledgerstream_core::store::{EventStore, ExpectedVersion};

/// An event store that always reports `StoreError::Unavailable`. Useful
/// for testing the fatal-load and storage-retry-exhaustion paths.
#[derive(Debug, Default)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn events_after(
        &self,
        _stream_id: &str,
        _after: u64,
    ) -> Result<Vec<RecordedEvent>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn append(
        &self,
        _stream_id: &str,
        _expected: ExpectedVersion,
        _events: Vec<NewEvent>,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Wraps another store and fails the first `failures` appends with
/// `StoreError::Unavailable` before delegating. Reads always delegate.
/// Useful for testing backoff-then-succeed behavior.
pub struct FlakyEventStore {
    inner: Arc<dyn EventStore>,
    remaining_failures: Mutex<u32>,
}

impl std::fmt::Debug for FlakyEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyEventStore")
            .field("remaining_failures", &*self.remaining_failures.lock().unwrap())
            .finish()
    }
}

impl FlakyEventStore {
    /// Creates a wrapper that fails the next `failures` appends.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn EventStore>, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: Mutex::new(failures),
        }
    }
}

#[async_trait]
impl EventStore for FlakyEventStore {
    async fn events_after(
        &self,
        stream_id: &str,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, StoreError> {
        self.inner.events_after(stream_id, after).await
    }

    async fn append(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
    ) -> Result<u64, StoreError> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable("simulated outage".into()));
            }
        }
        self.inner.append(stream_id, expected, events).await
    }
}

/// Wraps another store and simulates a rival writer: before each of the
/// first `rivals` appends, a competing event is slipped into the same
/// stream, so the caller's conditional append genuinely conflicts and
/// must reload. With `rivals` below the caller's retry bound the loop
/// converges; at or above it, retries exhaust.
pub struct ContendedEventStore {
    inner: Arc<dyn EventStore>,
    remaining_rivals: Mutex<u32>,
    rival_event: NewEvent,
}

impl std::fmt::Debug for ContendedEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContendedEventStore")
            .field("remaining_rivals", &*self.remaining_rivals.lock().unwrap())
            .finish()
    }
}

impl ContendedEventStore {
    /// Creates a wrapper whose first `rivals` appends lose the version
    /// race to an injected competing event.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn EventStore>, rivals: u32) -> Self {
        Self {
            inner,
            remaining_rivals: Mutex::new(rivals),
            rival_event: NewEvent::new("RivalWrote", serde_json::json!({})),
        }
    }

    /// Overrides the event the rival writer slips in.
    #[must_use]
    pub fn with_rival_event(mut self, rival_event: NewEvent) -> Self {
        self.rival_event = rival_event;
        self
    }
}

#[async_trait]
impl EventStore for ContendedEventStore {
    async fn events_after(
        &self,
        stream_id: &str,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, StoreError> {
        self.inner.events_after(stream_id, after).await
    }

    async fn append(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
    ) -> Result<u64, StoreError> {
        let inject_rival = {
            let mut remaining = self.remaining_rivals.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        };
        if inject_rival {
            self.inner
                .append(stream_id, ExpectedVersion::Any, vec![self.rival_event.clone()])
                .await?;
        }
        self.inner.append(stream_id, expected, events).await
    }
}
