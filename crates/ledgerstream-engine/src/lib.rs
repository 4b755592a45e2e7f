//! Ledgerstream Engine — state reconstruction and command processing.
//!
//! The [`AggregateLoader`] rebuilds stream state from a snapshot plus the
//! event suffix after it. The [`StreamProcessor`] wraps a user message
//! handler in the load → handle → commit cycle, absorbing concurrency
//! conflicts with bounded re-execution and transient storage failures
//! with backoff.

pub mod error;
mod loader;
mod processor;
mod retry;

pub use error::{HandlerError, LoadError, ProcessError};
pub use loader::AggregateLoader;
pub use processor::{Committed, SnapshotPolicy, StreamProcessor};
pub use retry::RetryPolicy;
