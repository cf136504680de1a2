use std::time::Duration;

mod core;
mod sleep;

pub use core::BandwidthLimiter;
pub use sleep::LimiterSleep;

pub(super) use sleep::{duration_from_microseconds, sleep_for};

pub(super) const MICROS_PER_SECOND: u128 = 1_000_000;
/// Calls closer together than this only accumulate debt.
pub(super) const MIN_TICK_MICROS: u128 = 100;
/// Debts worth less than this much transfer time are not slept off.
pub(super) const MIN_SLEEP_MICROS: u128 = 100;
/// Gaps longer than this are treated as clock trouble and reset the debt.
pub(super) const MAX_TICK_GAP: Duration = Duration::from_secs(10);

#[cfg(any(test, feature = "test-support"))]
mod test_support;
#[cfg(any(test, feature = "test-support"))]
pub(super) use self::test_support::append_recorded_sleep;
#[cfg(any(test, feature = "test-support"))]
pub use self::test_support::{RecordedSleepSession, recorded_sleep_session};

#[cfg(test)]
mod tests;
