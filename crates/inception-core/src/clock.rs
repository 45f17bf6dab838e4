//! Clock abstraction for bundle timestamps.
//!
//! Blended bundle ids, `createdAt` fields and attestation `signedAt` fields
//! all read time through [`Clock`] so tests can pin them.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Returns the current Unix timestamp in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system time. Default for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Clock returning a constant timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// The fixed timestamp in milliseconds.
    pub timestamp_ms: u64,
}

impl FixedClock {
    /// Creates a fixed clock at `timestamp_ms`.
    #[must_use]
    pub const fn new(timestamp_ms: u64) -> Self {
        Self { timestamp_ms }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.timestamp_ms
    }
}
