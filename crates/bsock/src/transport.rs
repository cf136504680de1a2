//! The byte stream underneath a connection.
//!
//! A plain TCP stream and a TLS session look the same to the framing code:
//! both implement [`Transport`]. TLS itself is not implemented here; a
//! [`TlsEngine`] wraps one transport into another during authentication.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// A bidirectional byte stream a connection can frame messages over.
pub trait Transport: Read + Write + Send {
    /// Sets the read timeout, `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Sets the write timeout, `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Shuts down one or both directions of the underlying socket.
    fn shutdown(&self, how: Shutdown) -> io::Result<()>;

    /// Opens a second handle to the same stream for a duplicate connection.
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>>;

    /// Address of the remote end.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Address of the local end.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Switches non-blocking mode.
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Underlying TCP stream, used to reach socket options.
    fn tcp_stream(&self) -> Option<&TcpStream> {
        None
    }

    /// Waits until the stream is readable or `timeout` expires. Returns
    /// `Ok(true)` when readable, which includes end of stream.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        match self.tcp_stream() {
            Some(stream) => wait_readable_tcp(stream, timeout),
            None => Ok(true),
        }
    }

    /// Sends a TLS close notification. Plain streams do nothing.
    fn tls_shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// After the socket became readable, reports whether application data
    /// (as opposed to TLS record traffic) is available.
    fn tls_has_data(&mut self) -> bool {
        true
    }

    /// Reports whether this transport is a TLS session.
    fn is_tls(&self) -> bool {
        false
    }
}

impl Transport for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_write_timeout(self, timeout)
    }

    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        Self::shutdown(self, how)
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Self::peer_addr(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Self::local_addr(self)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        Self::set_nonblocking(self, nonblocking)
    }

    fn tcp_stream(&self) -> Option<&TcpStream> {
        Some(self)
    }
}

/// Readiness wait built on `peek` with a read timeout, restoring the
/// previous timeout afterwards.
pub(crate) fn wait_readable_tcp(stream: &TcpStream, timeout: Duration) -> io::Result<bool> {
    let previous = stream.read_timeout()?;
    stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
    let mut byte = [0u8; 1];
    let outcome = match stream.peek(&mut byte) {
        Ok(_) => Ok(true),
        Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(false)
        }
        Err(err) => Err(err),
    };
    stream.set_read_timeout(previous)?;
    outcome
}

/// Which side of a TLS handshake to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsRole {
    /// Initiates the handshake.
    Client,
    /// Accepts the handshake.
    Server,
}

/// Runs TLS handshakes for the authentication layer.
///
/// The engine consumes the plain transport and returns the encrypted one.
/// Certificate and pre-shared-key configuration live inside the engine.
pub trait TlsEngine: Send + Sync {
    /// Performs the handshake in the given role.
    fn handshake(
        &self,
        transport: Box<dyn Transport>,
        role: TlsRole,
        peer_host: &str,
    ) -> io::Result<Box<dyn Transport>>;

    /// Ends TLS after authentication when the session should continue in
    /// clear text. The default keeps the TLS transport.
    fn downgrade(&self, transport: Box<dyn Transport>) -> io::Result<Box<dyn Transport>> {
        Ok(transport)
    }
}
