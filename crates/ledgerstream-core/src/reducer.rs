//! Reducer registry: explicit event-type-to-handler dispatch.
//!
//! During replay and during live appends, events are folded into state by
//! reducers looked up by the event's type tag. The mapping is built once
//! at startup through [`ReducerRegistryBuilder`] and validated there:
//! duplicate registrations and missing required handlers fail fast,
//! before any event is applied.
//!
//! Reducers return the next state value; the engine replaces the held
//! state with the returned one. Reducer bodies may await, but the
//! registry awaits each application before the next event, so events are
//! always applied in strict sequence order.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use crate::error::{ReducerError, RegistryError};
use crate::event::RecordedEvent;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A registered reducer: consumes the current state and one event
/// payload, produces the next state.
type ReducerFn<S> =
    Box<dyn Fn(S, serde_json::Value) -> BoxFuture<Result<S, ReducerError>> + Send + Sync>;

/// Immutable, validated mapping from event type tags to reducers, plus
/// the factory for the default initial state.
///
/// A sparse registry is legal: events with no registered reducer are
/// skipped, not rejected, so a projection can react to a subset of a
/// stream's event types.
pub struct ReducerRegistry<S> {
    initial: Box<dyn Fn() -> S + Send + Sync>,
    reducers: HashMap<String, ReducerFn<S>>,
}

impl<S> std::fmt::Debug for ReducerRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.reducers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ReducerRegistry")
            .field("event_types", &types)
            .finish()
    }
}

impl<S> ReducerRegistry<S> {
    /// Returns a fresh initial state instance.
    ///
    /// Every call produces a new value; instances are never pooled or
    /// shared across loads, so replays of different streams cannot
    /// contaminate each other.
    #[must_use]
    pub fn initial_state(&self) -> S {
        (self.initial)()
    }

    /// Returns `true` if a reducer is registered for the event type.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.reducers.contains_key(event_type)
    }

    /// Applies one recorded event to the state, returning the next state.
    /// Events with no registered reducer are skipped and the state is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ReducerError` if the matched reducer fails.
    pub async fn apply(&self, state: S, event: &RecordedEvent) -> Result<S, ReducerError> {
        self.apply_parts(state, &event.event_type, event.payload.clone())
            .await
    }

    /// Applies a raw (type tag, payload) pair to the state. Used by the
    /// engine to fold freshly committed events without re-reading them.
    ///
    /// # Errors
    ///
    /// Returns `ReducerError` if the matched reducer fails.
    pub async fn apply_parts(
        &self,
        state: S,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<S, ReducerError> {
        match self.reducers.get(event_type) {
            Some(reducer) => reducer(state, payload).await,
            None => Ok(state),
        }
    }
}

/// Builder for [`ReducerRegistry`]. Collects registrations and validates
/// them at [`build`](Self::build) time.
pub struct ReducerRegistryBuilder<S> {
    initial: Box<dyn Fn() -> S + Send + Sync>,
    reducers: HashMap<String, ReducerFn<S>>,
    duplicates: Vec<String>,
    required: HashSet<String>,
}

impl<S> std::fmt::Debug for ReducerRegistryBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerRegistryBuilder")
            .field("registered", &self.reducers.len())
            .field("required", &self.required.len())
            .finish()
    }
}

impl<S> ReducerRegistryBuilder<S>
where
    S: Send + 'static,
{
    /// Creates a builder whose registry seeds state from `initial`.
    #[must_use]
    pub fn new(initial: impl Fn() -> S + Send + Sync + 'static) -> Self {
        Self {
            initial: Box::new(initial),
            reducers: HashMap::new(),
            duplicates: Vec::new(),
            required: HashSet::new(),
        }
    }

    /// Registers a reducer for an event type. Registering the same type
    /// twice is reported as `RegistryError::DuplicateHandler` at build
    /// time.
    #[must_use]
    pub fn on<F, Fut>(mut self, event_type: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(S, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, ReducerError>> + Send + 'static,
    {
        let event_type = event_type.into();
        if self.reducers.contains_key(&event_type) {
            self.duplicates.push(event_type);
            return self;
        }
        self.reducers.insert(
            event_type,
            Box::new(move |state, payload| Box::pin(reducer(state, payload))),
        );
        self
    }

    /// Marks an event type as mandatory: `build` fails unless a reducer
    /// was registered for it.
    #[must_use]
    pub fn require(mut self, event_type: impl Into<String>) -> Self {
        self.required.insert(event_type.into());
        self
    }

    /// Validates the registrations and produces the registry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateHandler` if any event type was
    /// registered twice, or `RegistryError::MissingHandler` if a required
    /// event type has no reducer.
    pub fn build(mut self) -> Result<ReducerRegistry<S>, RegistryError> {
        if let Some(event_type) = self.duplicates.pop() {
            return Err(RegistryError::DuplicateHandler(event_type));
        }
        let mut required: Vec<String> = self.required.into_iter().collect();
        required.sort_unstable();
        for event_type in required {
            if !self.reducers.contains_key(&event_type) {
                return Err(RegistryError::MissingHandler(event_type));
            }
        }
        Ok(ReducerRegistry {
            initial: self.initial,
            reducers: self.reducers,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    struct Counter {
        total: i64,
    }

    fn recorded(event_type: &str, payload: serde_json::Value, seq: u64) -> RecordedEvent {
        RecordedEvent {
            event_id: Uuid::new_v4(),
            stream_id: "counter-1".to_owned(),
            sequence_number: seq,
            event_type: event_type.to_owned(),
            payload,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
        }
    }

    fn counter_registry() -> ReducerRegistry<Counter> {
        ReducerRegistryBuilder::new(Counter::default)
            .on("Incremented", |mut state: Counter, payload| async move {
                let amount = payload["amount"].as_i64().unwrap_or(0);
                state.total += amount;
                Ok(state)
            })
            .on("Decremented", |mut state: Counter, payload| async move {
                let amount = payload["amount"].as_i64().unwrap_or(0);
                state.total -= amount;
                Ok(state)
            })
            .build()
            .expect("valid registry")
    }

    #[tokio::test]
    async fn test_apply_folds_events_in_order() {
        let registry = counter_registry();
        let mut state = registry.initial_state();
        state = registry
            .apply(state, &recorded("Incremented", json!({"amount": 5}), 1))
            .await
            .unwrap();
        state = registry
            .apply(state, &recorded("Decremented", json!({"amount": 2}), 2))
            .await
            .unwrap();
        assert_eq!(state.total, 3);
    }

    #[tokio::test]
    async fn test_unregistered_event_type_is_skipped() {
        let registry = counter_registry();
        let state = registry
            .apply(
                Counter { total: 7 },
                &recorded("Renamed", json!({"name": "x"}), 1),
            )
            .await
            .unwrap();
        assert_eq!(state.total, 7);
        assert!(!registry.handles("Renamed"));
    }

    #[test]
    fn test_duplicate_registration_fails_at_build() {
        let result = ReducerRegistryBuilder::new(Counter::default)
            .on("Incremented", |state: Counter, _| async move { Ok(state) })
            .on("Incremented", |state: Counter, _| async move { Ok(state) })
            .build();
        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateHandler("Incremented".to_owned()))
        );
    }

    #[test]
    fn test_missing_required_handler_fails_at_build() {
        let result = ReducerRegistryBuilder::new(Counter::default)
            .on("Incremented", |state: Counter, _| async move { Ok(state) })
            .require("Decremented")
            .build();
        assert_eq!(
            result.err(),
            Some(RegistryError::MissingHandler("Decremented".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_initial_state_is_fresh_per_call() {
        let registry = counter_registry();
        let a = registry
            .apply_parts(registry.initial_state(), "Incremented", json!({"amount": 1}))
            .await
            .unwrap();
        let b = registry.initial_state();
        assert_eq!(a.total, 1);
        assert_eq!(b.total, 0);
    }
}
