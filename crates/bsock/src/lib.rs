#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Framed, bidirectional message connections between bnet daemons. A
//! [`Bsock`] owns one TCP (or TLS) stream and moves length-prefixed messages
//! and out-of-band signals across it. Payloads go through comm-line
//! compression and an optional bandwidth limiter on the way out; incoming
//! frames are validated against the receive ceiling and decompressed into
//! the connection's message buffer.
//!
//! # Design
//!
//! [`Connection`] holds the per-socket state: message buffer, counters,
//! status flags, spool file and timer. [`Bsock`] wraps the master connection
//! and owns its duplicates, which share the master's [`Chain`]. Cancelling
//! any member marks every member of the chain terminated so that blocked
//! readers and writers give up at their next deadline.
//!
//! The stream itself sits behind the [`Transport`] trait. Plain TCP streams
//! implement it directly; TLS sessions are produced by a [`TlsEngine`]
//! during authentication and swapped in with
//! [`Connection::replace_transport`].
//!
//! Job messages (warnings, errors and fatal reports that the owning job
//! prints) flow to the [`logging::JobMessageSink`] in [`BsockOptions`]. Trace
//! output uses the `tracing` macros from the `logging` crate.
//!
//! # Invariants
//!
//! - A connection never writes a partial frame on purpose: every frame is
//!   assembled into one buffer and written by a single call.
//! - After an error, a close or a termination, sends fail without touching
//!   the transport.
//! - `close` is idempotent, and only the master shuts the socket down.
//! - The message buffer always holds a NUL after the last message byte.
//!
//! # Examples
//!
//! ```no_run
//! use bsock::{Bsock, BsockOptions, ConnectConfig, RecvResult};
//!
//! let mut sd = Bsock::open(
//!     &ConnectConfig::new(),
//!     "Storage daemon",
//!     "sd.example.com",
//!     9103,
//!     BsockOptions::new(),
//! )?;
//! sd.fsend(format_args!("Hello Start Job {}\n", "backup.1"))?;
//! if let RecvResult::Data(_) = sd.recv() {
//!     println!("{}", sd.msg_text());
//! }
//! # Ok::<(), bsock::BsockError>(())
//! ```

mod blocking;
mod bsock;
mod buffer;
mod chain;
mod config;
mod connect;
mod connection;
mod deadline;
mod despool;
mod error;
mod job;
mod meeting;
mod peer;
mod send_hook;
mod transport;
mod wait;

pub use blocking::BlockingMode;
pub use bsock::{Bsock, Duplicate};
pub use buffer::{BufferDirection, TAPE_BSIZE};
pub use chain::{Canceller, Chain, MemberStatus};
pub use config::{
    BsockOptions, ConnectConfig, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_RETRY_TIME,
    DEFAULT_NETWORK_BUFFER_SIZE, DEFAULT_RETRY_INTERVAL,
};
pub use connect::{dedupe_addresses, resolve_addresses};
pub use connection::Connection;
pub use despool::DESPOOL_PROGRESS_EVERY;
pub use error::{BsockError, OversizedPacket, RecvError, RecvResult};
pub use job::{JobControl, NoJob, SharedJob};
pub use meeting::{BsockMeeting, PARKED_KEEPALIVE_IDLE, PARKED_KEEPALIVE_INTERVAL, ALIVE_CHECK_TIMEOUT};
pub use peer::PeerIdentity;
pub use send_hook::SendHook;
pub use transport::{TlsEngine, TlsRole, Transport};
pub use wait::WaitStatus;
