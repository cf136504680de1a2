use std::num::NonZeroU64;
use std::time::{Duration, Instant};

use logging::trace_limit;

use super::{
    MAX_TICK_GAP, MICROS_PER_SECOND, MIN_SLEEP_MICROS, MIN_TICK_MICROS, LimiterSleep,
    duration_from_microseconds, sleep_for,
};

/// Byte-rate throttle for one writer.
///
/// Each call to [`register`](Self::register) adds the written bytes to a
/// debt, subtracts what the configured rate allowed since the previous tick,
/// and sleeps off whatever remains once it is worth more than 100 µs.
#[derive(Clone, Debug)]
pub struct BandwidthLimiter {
    rate: NonZeroU64,
    debt: u128,
    last_tick: Option<Instant>,
}

enum Decision {
    Accumulate,
    Tick,
    Sleep(Duration),
}

impl BandwidthLimiter {
    /// Creates a limiter for `rate` bytes per second.
    #[must_use]
    pub const fn new(rate: NonZeroU64) -> Self {
        Self {
            rate,
            debt: 0,
            last_tick: None,
        }
    }

    /// Configured rate in bytes per second.
    #[must_use]
    pub const fn rate(&self) -> NonZeroU64 {
        self.rate
    }

    /// Changes the rate. Accumulated debt is kept.
    pub const fn set_rate(&mut self, rate: NonZeroU64) {
        self.rate = rate;
    }

    /// Bytes written but not yet paid for.
    #[must_use]
    pub const fn debt(&self) -> u128 {
        self.debt
    }

    /// Accounts for `bytes` just written and sleeps if the writer is ahead of
    /// the configured rate.
    pub fn register(&mut self, bytes: usize) -> LimiterSleep {
        let now = Instant::now();
        match self.decide(bytes, now) {
            Decision::Accumulate => LimiterSleep::default(),
            Decision::Tick => {
                self.last_tick = Some(now);
                LimiterSleep::default()
            }
            Decision::Sleep(requested) => {
                sleep_for(requested);
                let after = Instant::now();
                self.last_tick = Some(after);
                self.debt = 0;
                LimiterSleep::new(requested, after.saturating_duration_since(now))
            }
        }
    }

    /// Same as [`register`](Self::register) but with a caller supplied clock
    /// reading. A sleep is recorded as ending exactly `requested` later.
    pub fn register_at(&mut self, bytes: usize, now: Instant) -> LimiterSleep {
        match self.decide(bytes, now) {
            Decision::Accumulate => LimiterSleep::default(),
            Decision::Tick => {
                self.last_tick = Some(now);
                LimiterSleep::default()
            }
            Decision::Sleep(requested) => {
                sleep_for(requested);
                self.last_tick = Some(now + requested);
                self.debt = 0;
                LimiterSleep::new(requested, requested)
            }
        }
    }

    fn decide(&mut self, bytes: usize, now: Instant) -> Decision {
        if bytes == 0 {
            return Decision::Accumulate;
        }
        self.debt += bytes as u128;

        let elapsed = self
            .last_tick
            .and_then(|tick| now.checked_duration_since(tick))
            .filter(|gap| *gap <= MAX_TICK_GAP);
        let Some(elapsed) = elapsed else {
            trace_limit!(bytes, "limiter reset");
            self.debt = bytes as u128;
            return Decision::Tick;
        };

        let elapsed_us = elapsed.as_micros();
        if elapsed_us < MIN_TICK_MICROS {
            return Decision::Accumulate;
        }

        let rate = u128::from(self.rate.get());
        let allowance = elapsed_us * rate / MICROS_PER_SECOND;
        self.debt = self.debt.saturating_sub(allowance);

        let sleep_us = self.debt * MICROS_PER_SECOND / rate;
        if sleep_us > MIN_SLEEP_MICROS {
            trace_limit!(debt = self.debt as u64, sleep_us = sleep_us as u64, "throttling writer");
            Decision::Sleep(duration_from_microseconds(sleep_us))
        } else {
            Decision::Tick
        }
    }
}
