//! The owning master handle and its duplicates.

use std::net::{Shutdown, TcpStream};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};

use logging::trace_net;

use crate::chain::{Canceller, Chain, MemberStatus};
use crate::config::BsockOptions;
use crate::connection::Connection;
use crate::error::{BsockError, RecvError, RecvResult};
use crate::peer::PeerIdentity;
use crate::transport::Transport;

/// A master connection.
///
/// The master owns every duplicate made from it. Dropping the master (or
/// calling [`Bsock::destroy`]) closes and releases the duplicates first and
/// then itself. All [`Connection`] operations are reachable through
/// `Deref`.
pub struct Bsock {
    conn: Connection,
    dups: Vec<Arc<Mutex<Connection>>>,
}

impl Bsock {
    /// Wraps an already connected transport.
    pub fn from_transport(
        transport: Box<dyn Transport>,
        peer: PeerIdentity,
        options: BsockOptions,
    ) -> Self {
        Self {
            conn: Connection::new(transport, peer, options, Chain::new(), false),
            dups: Vec::new(),
        }
    }

    /// Wraps an accepted inbound stream. The host and port shown in
    /// diagnostics are taken from the stream's peer address.
    pub fn from_stream(
        stream: TcpStream,
        who: impl Into<String>,
        options: BsockOptions,
    ) -> Result<Self, BsockError> {
        let addr = stream.peer_addr()?;
        let peer = PeerIdentity::new(who, addr.ip().to_string(), addr.port());
        trace_net!(%peer, "accepted connection");
        Ok(Self::from_transport(Box::new(stream), peer, options))
    }

    /// Creates a duplicate sharing this connection's chain.
    ///
    /// The duplicate has its own buffers and its own handle on the
    /// transport. It is closed and released together with the master.
    pub fn duplicate(&mut self) -> Result<Duplicate, BsockError> {
        self.dups.retain(is_open);
        let transport = self.conn.transport_ref()?.try_clone_transport()?;
        let conn = Connection::duplicate_of(&self.conn, transport);
        let status = Arc::clone(conn.status());
        let dup = Arc::new(Mutex::new(conn));
        let handle = Duplicate {
            inner: Arc::downgrade(&dup),
            status,
            canceller: self.conn.canceller(),
        };
        self.dups.push(dup);
        trace_net!(peer = %self.conn.peer(), dups = self.dups.len(), "duplicated connection");
        Ok(handle)
    }

    /// Number of duplicates that have not been closed.
    pub fn duplicates(&self) -> usize {
        self.dups.iter().filter(|dup| is_open(dup)).count()
    }

    /// Shares read/write locks between the master and its duplicates.
    /// Returns `false` when locking was already on.
    pub fn set_locking(&mut self) -> bool {
        self.conn.chain.enable_locking()
    }

    /// Drops the shared read/write locks.
    pub fn clear_locking(&mut self) {
        self.conn.chain.disable_locking();
    }

    /// Reports whether the shared locks exist.
    pub fn is_locking(&self) -> bool {
        self.conn.chain.is_locking()
    }

    /// The chain this master heads.
    pub fn chain(&self) -> &Arc<Chain> {
        &self.conn.chain
    }

    /// Closes and releases every duplicate, then this connection.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Deref for Bsock {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for Bsock {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for Bsock {
    fn drop(&mut self) {
        for dup in self.dups.drain(..) {
            let mut guard = match dup.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    // Another thread is inside a blocking call on the
                    // duplicate; shutting the socket down wakes it.
                    if let Some(transport) = self.conn.transport.as_deref() {
                        let _ = transport.shutdown(Shutdown::Both);
                    }
                    lock(&dup)
                }
            };
            guard.close();
        }
        self.conn.close();
    }
}

impl std::fmt::Debug for Bsock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bsock")
            .field("conn", &self.conn)
            .field("dups", &self.dups.len())
            .finish()
    }
}

/// Non-owning handle on a duplicate connection.
///
/// The handle can move to another thread. Once the master is destroyed
/// every operation reports [`BsockError::Destroyed`] (or
/// [`RecvError::Destroyed`] for receives).
#[derive(Clone, Debug)]
pub struct Duplicate {
    inner: Weak<Mutex<Connection>>,
    status: Arc<MemberStatus>,
    canceller: Canceller,
}

impl Duplicate {
    /// Runs `f` with exclusive access to the duplicate connection.
    pub fn with<R>(&self, f: impl FnOnce(&mut Connection) -> R) -> Result<R, BsockError> {
        let conn = self.inner.upgrade().ok_or(BsockError::Destroyed)?;
        let mut guard = lock(&conn);
        Ok(f(&mut guard))
    }

    /// Sends `payload` as one message.
    pub fn send(&self, payload: &[u8]) -> Result<(), BsockError> {
        self.with(|conn| {
            conn.set_msg(payload);
            conn.send()
        })?
    }

    /// Receives one message, returning the result and a copy of the
    /// payload.
    pub fn recv(&self) -> (RecvResult, Vec<u8>) {
        self.with(|conn| {
            let result = conn.recv();
            (result, conn.msg().to_vec())
        })
        .unwrap_or_else(|_| (RecvResult::Error(RecvError::Destroyed), Vec::new()))
    }

    /// Cancels the whole chain. Works even after the master is gone.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Closes the duplicate. The transport handle is released; the master
    /// keeps its own.
    pub fn close(&self) -> Result<(), BsockError> {
        self.with(Connection::close)
    }

    /// Status flags of the duplicate, readable without taking its lock.
    pub const fn status(&self) -> &Arc<MemberStatus> {
        &self.status
    }

    /// Reports whether the master still exists.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// A duplicate busy in another thread counts as open.
fn is_open(dup: &Arc<Mutex<Connection>>) -> bool {
    match dup.try_lock() {
        Ok(guard) => !guard.is_closed(),
        Err(TryLockError::Poisoned(poison)) => !poison.into_inner().is_closed(),
        Err(TryLockError::WouldBlock) => true,
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poison| poison.into_inner())
}
