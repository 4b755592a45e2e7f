//! Versioned state handle.

/// A loaded state value paired with the stream version it was loaded at.
///
/// The version is the compare-and-swap precondition for the next commit.
/// A `StateRef` is consumed by exactly one commit attempt; after a
/// conflict the engine discards it and loads a fresh one.
#[derive(Debug, Clone)]
pub struct StateRef<S> {
    /// The reconstructed state.
    pub state: S,
    /// Sequence number of the last event folded into `state`, or 0 if the
    /// stream is empty.
    pub version: u64,
}

impl<S> StateRef<S> {
    /// Creates a state handle at the given version.
    #[must_use]
    pub fn new(state: S, version: u64) -> Self {
        Self { state, version }
    }
}
