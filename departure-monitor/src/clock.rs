//! Sources of "now".
//!
//! The store and coordinator never read the system clock directly; they go
//! through a [`Clock`] so that departure selection can be evaluated at a
//! chosen instant.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Local};

/// A timezone-aware source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant, carrying the offset it was observed in.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A settable clock for tests and offline runs.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Parse an RFC 3339 timestamp into a fixed clock.
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self::new)
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_set_and_advance() {
        let clock = FixedClock::parse("2024-01-01T09:30:00+03:00").unwrap();
        assert_eq!(clock.now().to_rfc3339(), "2024-01-01T09:30:00+03:00");

        clock.advance(Duration::minutes(45));
        assert_eq!(clock.now().to_rfc3339(), "2024-01-01T10:15:00+03:00");

        clock.set(DateTime::parse_from_rfc3339("2024-01-02T00:00:00+00:00").unwrap());
        assert_eq!(clock.now().to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn system_clock_is_close_to_utc_now() {
        let now = SystemClock.now();
        let drift = (chrono::Utc::now() - now.with_timezone(&chrono::Utc)).num_seconds().abs();
        assert!(drift < 5);
    }
}
