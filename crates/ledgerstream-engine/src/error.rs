//! Engine error types.

use thiserror::Error;

use ledgerstream_core::error::{ReducerError, StoreError};

/// Errors raised while reconstructing stream state.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The event fetch failed. This is the only fatal path in a load;
    /// snapshot problems degrade to full replay instead.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// A reducer rejected an already-committed event during replay. The
    /// stream cannot be materialized until the registry and the history
    /// agree again.
    #[error("replay of stream {stream_id} failed at sequence {sequence}: {source}")]
    Replay {
        /// The stream being replayed.
        stream_id: String,
        /// Sequence number of the event that failed to apply.
        sequence: u64,
        /// The underlying reducer failure.
        #[source]
        source: ReducerError,
    },
}

/// A failure reported by a user message handler.
///
/// Handler failures are never retried: the retry loop only absorbs
/// concurrency conflicts and transient storage errors.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any displayable value.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Terminal failures of the retry-orchestrated dispatch loop.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The bounded retries were exhausted. The host decides whether to
    /// dead-letter, drop, or crash.
    #[error("retries exhausted for stream {stream_id} after {attempts} attempts")]
    MaxRetriesExceeded {
        /// The stream being processed.
        stream_id: String,
        /// Number of attempts made, including the first.
        attempts: u32,
    },

    /// Loading state failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Committing failed with a transient storage error after the bounded
    /// backoff retries.
    #[error(transparent)]
    Storage(StoreError),

    /// The user handler failed. Not retried.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}
