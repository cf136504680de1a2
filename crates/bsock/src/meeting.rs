//! Rendezvous point for a connection that is established by the remote end.
//!
//! A daemon that cannot reach a client directly waits for the client to
//! call in. The listener side stores the accepted connection with
//! [`BsockMeeting::set`]; the job side picks it up with
//! [`BsockMeeting::get`], which first checks that the peer is still alive.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use logging::trace_net;
use protocol::Signal;
use socket2::{SockRef, TcpKeepalive};

use crate::bsock::Bsock;
use crate::connection::Connection;
use crate::error::RecvResult;

/// Keepalive idle time applied while a connection is parked.
pub const PARKED_KEEPALIVE_IDLE: Duration = Duration::from_secs(10_000);

/// Keepalive interval applied while a connection is parked.
pub const PARKED_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5_000);

/// Time the peer has to answer the is-alive check.
pub const ALIVE_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Slot {
    socket: Option<Bsock>,
    saved: Option<SavedKeepalive>,
}

#[derive(Clone, Copy, Debug)]
struct SavedKeepalive {
    time: Duration,
    interval: Duration,
}

/// Hands a connection established by the peer to the thread waiting for it.
#[derive(Default)]
pub struct BsockMeeting {
    slot: Mutex<Slot>,
    arrived: Condvar,
}

impl BsockMeeting {
    /// Creates an empty meeting point.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `socket`, replacing and closing any connection already parked,
    /// and wakes the waiters.
    ///
    /// While parked the socket keeps long keepalive timers so an idle client
    /// is not dropped by intermediate firewalls.
    pub fn set(&self, socket: Bsock) {
        let mut slot = self.lock();
        let previous = slot.socket.take();
        slot.saved = park_keepalive(&socket);
        trace_net!(peer = %socket.peer(), replaced = previous.is_some(), "meeting socket parked");
        slot.socket = Some(socket);
        drop(slot);
        drop(previous);
        self.arrived.notify_all();
    }

    /// Host name of the parked connection, if any.
    #[must_use]
    pub fn is_set(&self) -> Option<String> {
        self.lock()
            .socket
            .as_ref()
            .map(|socket| socket.host().to_owned())
    }

    /// Waits up to `timeout` for a live connection and takes it.
    ///
    /// A parked connection must answer an is-alive signal. One that does not
    /// is closed and the wait continues with the time left.
    #[must_use]
    pub fn get(&self, timeout: Duration) -> Option<Bsock> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(mut socket) = slot.socket.take() {
                let saved = slot.saved.take();
                drop(slot);
                if answers_is_alive(&mut socket) {
                    restore_keepalive(&socket, saved);
                    return Some(socket);
                }
                trace_net!(peer = %socket.peer(), "meeting socket failed is-alive check");
                drop(socket);
                slot = self.lock();
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .arrived
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Answers an is-alive check on the client side of a meeting.
    ///
    /// Receives one message and, when it is the is-alive signal, answers it. Returns
    /// `false` for anything else.
    pub fn wait_request(connection: &mut Connection) -> bool {
        match connection.recv() {
            RecvResult::Signal(Signal::IsAlive) => connection.signal(Signal::IsAlive).is_ok(),
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BsockMeeting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BsockMeeting")
            .field("parked", &self.is_set())
            .finish()
    }
}

fn answers_is_alive(socket: &mut Bsock) -> bool {
    socket.start_timer(ALIVE_CHECK_TIMEOUT);
    let alive = socket.signal(Signal::IsAlive).is_ok()
        && matches!(socket.recv(), RecvResult::Signal(Signal::IsAlive));
    socket.stop_timer();
    alive
}

fn park_keepalive(socket: &Bsock) -> Option<SavedKeepalive> {
    let stream = socket.transport.as_deref()?.tcp_stream()?;
    let sock = SockRef::from(stream);
    let saved = match (sock.tcp_keepalive_time(), sock.tcp_keepalive_interval()) {
        (Ok(time), Ok(interval)) => Some(SavedKeepalive { time, interval }),
        _ => None,
    };
    let parked = TcpKeepalive::new()
        .with_time(PARKED_KEEPALIVE_IDLE)
        .with_interval(PARKED_KEEPALIVE_INTERVAL);
    if let Err(err) = sock.set_keepalive(true).and_then(|()| sock.set_tcp_keepalive(&parked)) {
        trace_net!(peer = %socket.peer(), error = %err, "cannot set parked keepalive");
    }
    saved
}

fn restore_keepalive(socket: &Bsock, saved: Option<SavedKeepalive>) {
    let (Some(saved), Some(stream)) = (
        saved,
        socket.transport.as_deref().and_then(|t| t.tcp_stream()),
    ) else {
        return;
    };
    let keepalive = TcpKeepalive::new()
        .with_time(saved.time)
        .with_interval(saved.interval);
    if let Err(err) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        trace_net!(peer = %socket.peer(), error = %err, "cannot restore keepalive");
    }
}
