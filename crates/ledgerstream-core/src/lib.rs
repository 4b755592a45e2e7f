//! Ledgerstream Core — shared abstractions.
//!
//! This crate defines the data model and traits that every other crate
//! depends on: events and streams, snapshots, the versioned state handle,
//! the reducer registry used to fold events into state, and the
//! collaborator traits for event and snapshot storage. It contains no
//! infrastructure code.

pub mod error;
pub mod event;
pub mod reducer;
pub mod snapshot;
pub mod state;
pub mod store;
