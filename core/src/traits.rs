//! Core traits defining CIVICA interfaces

use crate::types::*;
use std::sync::atomic::{AtomicI64, Ordering};

/// Result type for CIVICA operations
pub type CivicaResult<T> = Result<T, crate::error::CivicaError>;

/// Trait for hashable types
pub trait Hashable {
    /// Compute the hash of this object
    fn hash(&self) -> Hash;
}

/// Trait for signable types
pub trait Signable: Hashable {
    /// Get the bytes to be signed
    fn signing_bytes(&self) -> Vec<u8>;
}

/// Source of wall-clock time for time-window checks
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock, used for replays and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicI64::new(start.as_secs()),
        }
    }

    /// Jump to an absolute time. Moving backwards is allowed.
    pub fn set(&self, time: Timestamp) {
        self.secs.store(time.as_secs(), Ordering::SeqCst);
    }

    /// Move forward by `secs` seconds
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(Timestamp::from_secs(100));
        assert_eq!(clock.now(), Timestamp::from_secs(100));

        clock.advance(50);
        assert_eq!(clock.now(), Timestamp::from_secs(150));

        clock.set(Timestamp::from_secs(10));
        assert_eq!(clock.now(), Timestamp::from_secs(10));
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now().as_secs() > 1_577_836_800);
    }
}
