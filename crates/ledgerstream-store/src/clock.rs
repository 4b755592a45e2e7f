//! Timestamp source for committed events.
//!
//! The store stamps `recorded_at` on every event at append time. The
//! source of those timestamps is injectable so tests can pin them; the
//! ordering authority within a stream is always the sequence number,
//! never the timestamp.

use chrono::{DateTime, Utc};

/// Supplies the commit timestamp for appended events.
pub trait Clock: Send + Sync {
    /// Returns the timestamp to stamp on the events of one append.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Wall-clock timestamps for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
