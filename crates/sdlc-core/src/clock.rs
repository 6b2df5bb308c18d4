//! Time source abstraction
//!
//! Cache expiry, circuit-breaker cooldowns and quality-check debouncing all
//! read time through [`Clock`] so tests can drive them with [`ManualClock`]
//! instead of waiting on the wall clock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared handle to the wall clock
#[inline]
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at a fixed instant
    #[inline]
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Start at the current wall-clock time
    #[inline]
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += to_chrono(by);
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    /// Shared handle to this clock
    #[inline]
    #[must_use]
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Convert a std duration, saturating at one century
#[must_use]
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Time elapsed between `earlier` and the clock's now (zero if negative)
#[must_use]
pub fn elapsed_since(clock: &dyn Clock, earlier: DateTime<Utc>) -> Duration {
    (clock.now() - earlier).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_all_clones() {
        let clock = ManualClock::starting_now();
        let other = clock.clone();
        let before = clock.now();

        other.advance(Duration::from_secs(5));

        assert_eq!(clock.now() - before, chrono::Duration::seconds(5));
    }

    #[test]
    fn elapsed_since_never_negative() {
        let clock = ManualClock::starting_now();
        let future = clock.now() + chrono::Duration::seconds(10);
        assert_eq!(elapsed_since(&clock, future), Duration::ZERO);
    }

    #[test]
    fn to_chrono_saturates() {
        let huge = to_chrono(Duration::from_secs(u64::MAX));
        assert_eq!(huge, chrono::Duration::days(36_500));
    }
}
