use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

fn recorded_sleeps() -> &'static Mutex<Vec<Duration>> {
    static RECORDED_SLEEPS: OnceLock<Mutex<Vec<Duration>>> = OnceLock::new();
    RECORDED_SLEEPS.get_or_init(|| Mutex::new(Vec::new()))
}

fn recorded_sleep_session_lock() -> &'static Mutex<()> {
    static SESSION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    SESSION_LOCK.get_or_init(|| Mutex::new(()))
}

fn lock_recorded_sleeps() -> MutexGuard<'static, Vec<Duration>> {
    recorded_sleeps()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

pub(crate) fn append_recorded_sleep(duration: Duration) {
    lock_recorded_sleeps().push(duration);
}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
/// Guard giving one test exclusive use of the recorded sleep log.
///
/// Call [`RecordedSleepSession::clear`] first, run the code under test, then
/// inspect the log with [`RecordedSleepSession::take`].
pub struct RecordedSleepSession<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RecordedSleepSession<'_> {
    /// Discards previously recorded sleeps.
    pub fn clear(&mut self) {
        lock_recorded_sleeps().clear();
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_recorded_sleeps().is_empty()
    }

    /// Copies the recorded sleeps without draining them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Duration> {
        lock_recorded_sleeps().clone()
    }

    /// Drains and returns the recorded sleeps.
    pub fn take(&mut self) -> Vec<Duration> {
        std::mem::take(&mut *lock_recorded_sleeps())
    }

    /// Sum of the recorded sleeps.
    #[must_use]
    pub fn total(&self) -> Duration {
        lock_recorded_sleeps().iter().sum()
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
/// Starts a recorded sleep session, blocking until no other test holds one.
pub fn recorded_sleep_session() -> RecordedSleepSession<'static> {
    RecordedSleepSession {
        _guard: recorded_sleep_session_lock()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()),
    }
}
