//! [`Clock`] abstractions.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::DateTime;

/// Source of the current UTC [`DateTime`].
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current [`DateTime`].
    fn now(&self) -> DateTime;
}

/// [`Clock`] reading the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct System;

impl Clock for System {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// [`Clock`] which only moves when told to.
///
/// Clones share the same time, so advancing one of them advances all.
#[derive(Clone, Debug)]
pub struct Manual(Arc<Mutex<DateTime>>);

impl Manual {
    /// Creates a new [`Manual`] clock stopped at the provided [`DateTime`].
    #[must_use]
    pub fn new(at: DateTime) -> Self {
        Self(Arc::new(Mutex::new(at)))
    }

    /// Moves this [`Manual`] clock forward by the provided [`Duration`].
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }

    /// Sets this [`Manual`] clock to the provided [`DateTime`].
    pub fn set(&self, at: DateTime) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Default for Manual {
    fn default() -> Self {
        Self::new(DateTime::now())
    }
}

impl Clock for Manual {
    fn now(&self) -> DateTime {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{Clock as _, Manual, System};
    use crate::DateTime;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let start = DateTime::from_unix_timestamp(1_000).unwrap();
        let clock = Manual::new(start);

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now(), start + Duration::from_secs(61));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = Manual::new(DateTime::UNIX_EPOCH);
        let other = clock.clone();

        other.set(DateTime::from_unix_timestamp(5).unwrap());

        assert_eq!(clock.now().unix_timestamp(), 5);
    }

    #[test]
    fn system_clock_is_not_stuck_in_the_past() {
        let before = DateTime::now();

        assert!(System.now() >= before);
    }
}
