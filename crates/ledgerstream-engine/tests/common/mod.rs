//! Shared fixtures: a counter aggregate folded from increment and
//! decrement events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use ledgerstream_core::error::ReducerError;
use ledgerstream_core::event::NewEvent;
use ledgerstream_core::reducer::{ReducerRegistry, ReducerRegistryBuilder};

/// Counter projection used across the engine tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub total: i64,
}

/// Builds the counter registry: `Incremented` adds, `Decremented`
/// subtracts, everything else is skipped.
pub fn counter_registry() -> Arc<ReducerRegistry<Counter>> {
    let registry = ReducerRegistryBuilder::new(Counter::default)
        .on("Incremented", |mut state: Counter, payload| async move {
            state.total += amount(&payload)?;
            Ok(state)
        })
        .on("Decremented", |mut state: Counter, payload| async move {
            state.total -= amount(&payload)?;
            Ok(state)
        })
        .build()
        .expect("counter registry is valid");
    Arc::new(registry)
}

fn amount(payload: &serde_json::Value) -> Result<i64, ReducerError> {
    payload["amount"]
        .as_i64()
        .ok_or_else(|| ReducerError::Apply("payload missing amount".to_owned()))
}

pub fn increment(amount: i64) -> NewEvent {
    NewEvent::new("Incremented", json!({ "amount": amount }))
}

pub fn decrement(amount: i64) -> NewEvent {
    NewEvent::new("Decremented", json!({ "amount": amount }))
}
