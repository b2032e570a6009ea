//! [`Timer`] of [`Session`]s.

use std::{sync::Arc, time::Duration};

use common::{Clock, DateTime};
use derive_more::{Display, Error};

#[cfg(doc)]
use super::Session;
use super::ExpirationDateTime;

/// Clock and expiration policy of [`Session`]s.
#[derive(Clone, Debug)]
pub struct Timer {
    /// Lifetime of a freshly created or renewed [`Session`].
    ttl: Duration,

    /// Fraction of the `ttl` below which a [`Session`] is due for renewal.
    refresh_fraction: f64,

    /// [`Clock`] providing the current time.
    clock: Arc<dyn Clock>,
}

impl Timer {
    /// Minimal allowed [`Session`] lifetime.
    pub const MIN_TTL: Duration = Duration::from_secs(60);

    /// Creates a new [`Timer`] with the provided policy.
    ///
    /// # Errors
    ///
    /// If the `ttl` is shorter than [`Timer::MIN_TTL`], or the
    /// `refresh_fraction` doesn't lie strictly between `0` and `1`.
    pub fn new(
        ttl: Duration,
        refresh_fraction: f64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        if ttl < Self::MIN_TTL {
            return Err(PolicyError::TtlTooShort(ttl));
        }
        if !(refresh_fraction > 0.0 && refresh_fraction < 1.0) {
            return Err(PolicyError::RefreshFractionOutOfRange(
                refresh_fraction,
            ));
        }
        Ok(Self {
            ttl,
            refresh_fraction,
            clock,
        })
    }

    /// Returns the lifetime of a fresh [`Session`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the current UTC [`DateTime`].
    #[must_use]
    pub fn current_time(&self) -> DateTime {
        self.clock.now()
    }

    /// Returns the expiration of a [`Session`] created or renewed right now.
    #[must_use]
    pub fn session_expiration(&self) -> ExpirationDateTime {
        (self.current_time() + self.ttl).coerce()
    }

    /// Returns the remaining lifetime below which a [`Session`] is renewed.
    #[must_use]
    pub fn refresh_trigger_interval(&self) -> Duration {
        self.ttl.mul_f64(self.refresh_fraction)
    }

    /// Returns the [`Clock`] of this [`Timer`].
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Error of an invalid [`Timer`] policy.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum PolicyError {
    /// `ttl` is shorter than [`Timer::MIN_TTL`].
    #[display("`Session` TTL must be at least 1 minute, got {_0:?}")]
    TtlTooShort(#[error(not(source))] Duration),

    /// `refresh_fraction` is outside of `(0, 1)`.
    #[display("refresh fraction must lie within (0, 1), got {_0}")]
    RefreshFractionOutOfRange(#[error(not(source))] f64),
}
