//! Timestamp sources for new entries.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the timestamp stamped on each appended entry.
pub trait Clock: Send + Sync {
    /// Current time, in whatever unit the clock defines.
    fn now(&self) -> i64;
}

/// Wall clock in Unix milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Monotonic counter; every call returns the previous value plus one.
///
/// Deterministic, so two chains fed the same payloads produce the same hashes.
#[derive(Debug, Default)]
pub struct LogicalClock {
    next: AtomicI64,
}

impl LogicalClock {
    /// Start counting at `start`.
    pub fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_clock_ticks() {
        let clock = LogicalClock::starting_at(10);
        assert_eq!(clock.now(), 10);
        assert_eq!(clock.now(), 11);
        assert_eq!(clock.now(), 12);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800_000);
    }
}
