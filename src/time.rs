//! Time abstraction for testability.
//!
//! Reload notifications are stamped through a [`Clock`] so tests can pin
//! the timestamp instead of relying on actual system time.

use std::time::SystemTime;

/// Abstraction over system time for testability.
///
/// # Example
///
/// ```
/// use hotconf::time::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now >= std::time::SystemTime::UNIX_EPOCH);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Production clock delegating to [`SystemTime::now()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
