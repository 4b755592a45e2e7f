//! Core error types.

use thiserror::Error;

/// Errors returned by event and snapshot stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the stream's last sequence number
    /// did not match the expected version, so nothing was appended.
    #[error(
        "concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}"
    )]
    Conflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The version the writer expected.
        expected: u64,
        /// The version the store actually held.
        actual: u64,
    },

    /// Transient infrastructure failure. Safe to retry with backoff.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while building a [`ReducerRegistry`].
///
/// Both variants are configuration mistakes and surface at startup, never
/// during event application.
///
/// [`ReducerRegistry`]: crate::reducer::ReducerRegistry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The same event type was registered twice.
    #[error("duplicate reducer registered for event type `{0}`")]
    DuplicateHandler(String),

    /// An event type marked as required has no registered reducer.
    #[error("no reducer registered for required event type `{0}`")]
    MissingHandler(String),
}

/// Errors raised by a reducer while applying one event to state.
#[derive(Debug, Error)]
pub enum ReducerError {
    /// The event payload did not deserialize into the shape the reducer
    /// expected.
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The reducer rejected the event for a domain reason.
    #[error("reducer failed: {0}")]
    Apply(String),
}
