//! Shared test doubles for the Ledgerstream crates.

mod broker;
mod event_store;
mod snapshot_store;

pub use broker::{FailPoint, ScriptedProducer};
pub use event_store::{ContendedEventStore, FailingEventStore, FlakyEventStore};
pub use snapshot_store::{CorruptSnapshotStore, FailingSnapshotStore};
