//! Ledgerstream Store — reference implementations of the storage
//! collaborator traits.
//!
//! The in-memory stores here are the reference implementations of the
//! `EventStore` and `SnapshotStore` contracts and the substrate for the
//! engine's tests. A production deployment swaps in an adapter for its
//! actual log store; the contracts it must honor are documented on the
//! traits in `ledgerstream-core`.

mod clock;
mod memory;

pub use clock::{Clock, WallClock};
pub use memory::{InMemoryEventStore, InMemorySnapshotStore};
