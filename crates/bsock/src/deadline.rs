use std::io;
use std::time::{Duration, Instant};

use crate::transport::Transport;

/// Applies socket read/write timeouts for the duration of one I/O step and
/// clears them on drop.
///
/// The effective timeout is the shorter of the connection I/O timeout and
/// whatever remains of an explicit timer started with
/// [`crate::Connection::start_timer`].
pub(crate) struct DeadlineGuard<'a> {
    transport: &'a mut (dyn Transport + 'static),
}

impl<'a> DeadlineGuard<'a> {
    pub(crate) fn arm(
        transport: &'a mut (dyn Transport + 'static),
        io_timeout: Duration,
        timer: Option<Instant>,
    ) -> io::Result<Self> {
        let timeout = effective_timeout(io_timeout, timer, Instant::now());
        transport.set_read_timeout(Some(timeout))?;
        transport.set_write_timeout(Some(timeout))?;
        Ok(Self { transport })
    }

    pub(crate) fn transport(&mut self) -> &mut (dyn Transport + 'static) {
        self.transport
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        let _ = self.transport.set_read_timeout(None);
        let _ = self.transport.set_write_timeout(None);
    }
}

/// A zero timeout means "block forever" to the socket layer, so an expired
/// timer is mapped to the smallest non-zero timeout instead.
pub(crate) fn effective_timeout(io_timeout: Duration, timer: Option<Instant>, now: Instant) -> Duration {
    let remaining = timer.map_or(io_timeout, |deadline| {
        io_timeout.min(deadline.saturating_duration_since(now))
    });
    remaining.max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_shortens_io_timeout() {
        let now = Instant::now();
        let timeout = effective_timeout(
            Duration::from_secs(60),
            Some(now + Duration::from_secs(5)),
            now,
        );
        assert_eq!(timeout, Duration::from_secs(5));
    }

    #[test]
    fn expired_timer_never_means_forever() {
        let now = Instant::now();
        let timeout = effective_timeout(Duration::from_secs(60), Some(now), now);
        assert_eq!(timeout, Duration::from_millis(1));
    }

    #[test]
    fn no_timer_uses_io_timeout() {
        let now = Instant::now();
        assert_eq!(
            effective_timeout(Duration::from_secs(9), None, now),
            Duration::from_secs(9)
        );
    }
}
