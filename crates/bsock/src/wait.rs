use std::io;
use std::time::Duration;

use logging::trace_net;

use crate::connection::Connection;

/// Outcome of waiting for incoming data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitStatus {
    /// Data (or end of stream) can be read without blocking.
    Ready,
    /// Nothing arrived before the timeout.
    Timeout,
    /// The wait itself failed; see [`Connection::bstrerror`].
    Error,
}

impl Connection {
    /// Waits up to `timeout` for data.
    ///
    /// Interrupted waits are restarted. On a TLS transport, readiness caused
    /// by TLS record traffic alone (a renegotiation, say) does not count and
    /// the wait starts over.
    pub fn wait_data(&mut self, timeout: Duration) -> WaitStatus {
        self.wait_readable(timeout, true)
    }

    /// Like [`Self::wait_data`] but returns on the first interruption, and
    /// treats TLS-only traffic as a timeout.
    pub fn wait_data_intr(&mut self, timeout: Duration) -> WaitStatus {
        self.wait_readable(timeout, false)
    }

    fn wait_readable(&mut self, timeout: Duration, restart: bool) -> WaitStatus {
        loop {
            let Some(transport) = self.transport.as_deref_mut() else {
                self.last_os_error = Some(libc::EBADF);
                return WaitStatus::Error;
            };
            match transport.wait_readable(timeout) {
                Ok(false) => {
                    self.last_os_error = None;
                    return WaitStatus::Timeout;
                }
                Ok(true) => {
                    self.last_os_error = None;
                    if transport.is_tls() && !transport.tls_has_data() {
                        trace_net!(peer = %self.peer, "readable without application data");
                        if restart {
                            continue;
                        }
                        return WaitStatus::Timeout;
                    }
                    return WaitStatus::Ready;
                }
                Err(err) if restart && err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.capture_os_error(&err);
                    return WaitStatus::Error;
                }
            }
        }
    }
}
