use std::num::NonZeroU64;
use std::time::{Duration, Instant};

use super::{BandwidthLimiter, recorded_sleep_session};

fn limiter(rate: u64) -> BandwidthLimiter {
    BandwidthLimiter::new(NonZeroU64::new(rate).expect("non-zero rate"))
}

#[test]
fn first_write_only_resets() {
    let mut session = recorded_sleep_session();
    session.clear();

    let mut limiter = limiter(1_000);
    let sleep = limiter.register_at(5_000, Instant::now());
    assert!(sleep.is_noop());
    assert_eq!(limiter.debt(), 5_000);
    assert!(session.is_empty());
}

#[test]
fn zero_bytes_is_a_noop() {
    let mut limiter = limiter(1_000);
    assert!(limiter.register_at(0, Instant::now()).is_noop());
    assert_eq!(limiter.debt(), 0);
}

#[test]
fn debt_is_slept_off_at_configured_rate() {
    let mut session = recorded_sleep_session();
    session.clear();

    let start = Instant::now();
    let mut limiter = limiter(100_000);
    let _ = limiter.register_at(100_000, start);
    let sleep = limiter.register_at(100_000, start + Duration::from_millis(100));

    // 200000 bytes owed, 10000 allowed in 100ms: 190000 bytes at 100000 B/s.
    assert_eq!(sleep.requested(), Duration::from_millis(1_900));
    assert_eq!(limiter.debt(), 0);
    assert_eq!(session.take(), vec![Duration::from_millis(1_900)]);
}

#[test]
fn calls_within_100_microseconds_accumulate() {
    let mut session = recorded_sleep_session();
    session.clear();

    let start = Instant::now();
    let mut limiter = limiter(1_000_000);
    let _ = limiter.register_at(10, start);
    let sleep = limiter.register_at(10_000, start + Duration::from_micros(50));
    assert!(sleep.is_noop());
    assert_eq!(limiter.debt(), 10_010);
    assert!(session.is_empty());
}

#[test]
fn small_debt_does_not_sleep() {
    let mut session = recorded_sleep_session();
    session.clear();

    let start = Instant::now();
    let mut limiter = limiter(1_000_000);
    let _ = limiter.register_at(1, start);
    // 1 ms allows 1000 bytes; 50 remaining bytes are 50 µs of transfer.
    let sleep = limiter.register_at(1_049, start + Duration::from_millis(1));
    assert!(sleep.is_noop());
    assert_eq!(limiter.debt(), 50);
    assert!(session.is_empty());
}

#[test]
fn long_gap_resets_instead_of_sleeping() {
    let mut session = recorded_sleep_session();
    session.clear();

    let start = Instant::now();
    let mut limiter = limiter(10);
    let _ = limiter.register_at(1_000, start);
    let sleep = limiter.register_at(500, start + Duration::from_secs(11));
    assert!(sleep.is_noop());
    assert_eq!(limiter.debt(), 500);
    assert!(session.is_empty());
}

#[test]
fn clock_going_backwards_resets() {
    let start = Instant::now() + Duration::from_secs(1);
    let mut limiter = limiter(10);
    let _ = limiter.register_at(1_000, start);
    let sleep = limiter.register_at(7, start - Duration::from_millis(500));
    assert!(sleep.is_noop());
    assert_eq!(limiter.debt(), 7);
}

#[test]
fn rate_change_keeps_debt() {
    let mut limiter = limiter(10);
    let _ = limiter.register_at(99, Instant::now());
    limiter.set_rate(NonZeroU64::new(20).expect("non-zero"));
    assert_eq!(limiter.rate().get(), 20);
    assert_eq!(limiter.debt(), 99);
}
