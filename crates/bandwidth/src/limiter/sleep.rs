use super::MICROS_PER_SECOND;
use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
use super::append_recorded_sleep;

/// Result returned by [`crate::BandwidthLimiter::register`] describing how
/// long the limiter slept.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct LimiterSleep {
    requested: Duration,
    actual: Duration,
}

impl LimiterSleep {
    /// Constructs a record from the requested and observed durations.
    pub const fn new(requested: Duration, actual: Duration) -> Self {
        Self { requested, actual }
    }

    /// Time the limiter asked to sleep.
    #[must_use]
    pub const fn requested(&self) -> Duration {
        self.requested
    }

    /// Time that actually elapsed while sleeping.
    #[must_use]
    pub const fn actual(&self) -> Duration {
        self.actual
    }

    /// Returns `true` when the limiter did not sleep.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.requested.is_zero() && self.actual.is_zero()
    }
}

pub(crate) fn duration_from_microseconds(us: u128) -> Duration {
    let seconds = u64::try_from(us / MICROS_PER_SECOND).unwrap_or(u64::MAX);
    let micros = (us % MICROS_PER_SECOND) as u32;
    Duration::new(seconds, micros * 1_000)
}

// Unit tests in this crate only record. With the feature enabled from
// another crate the sleep is both recorded and taken.
pub(crate) fn sleep_for(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    #[cfg(any(test, feature = "test-support"))]
    append_recorded_sleep(duration);

    #[cfg(not(test))]
    std::thread::sleep(duration);
}
