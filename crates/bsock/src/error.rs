use std::io;

use compress::CommCompressError;
use protocol::{ProtocolError, Signal};

use crate::peer::PeerIdentity;

/// Failures of connection-level operations.
///
/// Display strings follow the diagnostics daemons have always printed, so
/// log scrapers keep matching.
#[derive(Debug, thiserror::Error)]
pub enum BsockError {
    /// The connection was closed.
    #[error("Socket is closed")]
    Closed,

    /// An earlier transport error poisoned the connection.
    #[error("Socket has errors={errors} on call to {peer}")]
    Errored {
        /// Error count.
        errors: u32,
        /// Remote end.
        peer: PeerIdentity,
    },

    /// The connection was terminated by a signal or a cancellation.
    #[error("Bsock send while terminated=1 on call to {peer}")]
    Terminated {
        /// Remote end.
        peer: PeerIdentity,
    },

    /// The message is larger than any peer will accept.
    #[error("Socket has insane msglen={len} on call to {peer}")]
    InsaneLength {
        /// Message length.
        len: usize,
        /// Remote end.
        peer: PeerIdentity,
    },

    /// The send hook refused the message.
    #[error("Flowcontrol failure on {peer}")]
    FlowControl {
        /// Remote end.
        peer: PeerIdentity,
    },

    /// Writing the frame failed.
    #[error("Write error sending {len} bytes to {peer}: ERR={source}")]
    Write {
        /// Frame size.
        len: usize,
        /// Remote end.
        peer: PeerIdentity,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The transport accepted only part of the frame.
    #[error("Wrote {len} bytes to {peer}, but only {accepted} accepted.")]
    ShortWrite {
        /// Frame size.
        len: usize,
        /// Bytes accepted.
        accepted: usize,
        /// Remote end.
        peer: PeerIdentity,
    },

    /// The master of this duplicate was destroyed.
    #[error("socket was destroyed together with its master")]
    Destroyed,

    /// Host name resolution failed.
    #[error("gethostbyname() for host \"{host}\" failed: ERR={source}")]
    Resolve {
        /// Host that failed to resolve.
        host: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A socket could not be created.
    #[error("Socket open error. proto={proto} port={port}. ERR={source}")]
    SocketOpen {
        /// Address family.
        proto: i32,
        /// Target port.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The configured source address could not be bound.
    #[error("Source address bind error. proto={proto}. ERR={source}")]
    SourceBind {
        /// Address family.
        proto: i32,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// No candidate address accepted the connection before the retry budget
    /// ran out.
    #[error("Unable to connect to {name} on {host}:{port}. ERR={source}")]
    Connect {
        /// Daemon name.
        name: String,
        /// Host.
        host: String,
        /// Port.
        port: u16,
        /// Last connect error.
        #[source]
        source: io::Error,
    },

    /// The job owning the connection was canceled.
    #[error("job canceled")]
    Canceled,

    /// A frame could not be built or a spool record could not be read.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The spool file reported a read error.
    #[error("fread attr spool I/O error.")]
    SpoolIo(#[source] io::Error),

    /// Spool operations need a spool file.
    #[error("no spool file attached")]
    NoSpool,

    /// The comm-line compressor failed.
    #[error(transparent)]
    Compress(#[from] CommCompressError),

    /// Socket configuration failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BsockError {
    /// Reports whether another connection attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// Why [`RecvResult::Error`] was returned.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// Fewer bytes arrived than the header announced.
    #[error("Read expected {expected} got {got} from {peer}")]
    Truncated {
        /// Bytes announced.
        expected: usize,
        /// Bytes received.
        got: usize,
        /// Remote end.
        peer: PeerIdentity,
    },

    /// The transport failed while reading a payload.
    #[error("Read error from {peer}: ERR={source}")]
    Read {
        /// Remote end.
        peer: PeerIdentity,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The payload was marked compressed but did not decompress.
    #[error("Decompress error from {peer}: {source}")]
    Decompress {
        /// Remote end.
        peer: PeerIdentity,
        /// Decoder failure.
        #[source]
        source: CommCompressError,
    },

    /// The master of this duplicate was destroyed.
    #[error("socket was destroyed together with its master")]
    Destroyed,
}

/// A peer announced a payload above the receive ceiling.
///
/// Only reported through the job sink; the receive itself yields
/// [`RecvResult::Signal`] with [`Signal::Terminate`].
#[derive(Debug, thiserror::Error)]
#[error("Packet size={len} too big from \"{peer}\". Maximum permitted {max}. Terminating connection.")]
pub struct OversizedPacket {
    /// Announced payload length.
    pub len: usize,
    /// Receive ceiling.
    pub max: usize,
    /// Remote end.
    pub peer: PeerIdentity,
}

/// Outcome of one receive.
#[derive(Debug)]
pub enum RecvResult {
    /// A data message of this many bytes is in the message buffer.
    Data(usize),
    /// The peer sent a signal instead of data.
    Signal(Signal),
    /// The peer went away, or the connection is no longer usable.
    HardEof,
    /// The message could not be read.
    Error(RecvError),
    /// A command message of this many bytes is in the message buffer.
    Command(usize),
}

impl RecvResult {
    /// Payload length for data and command results.
    #[must_use]
    pub const fn message_len(&self) -> Option<usize> {
        match self {
            Self::Data(n) | Self::Command(n) => Some(*n),
            _ => None,
        }
    }

    /// Reports whether this is a data or command result.
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(self, Self::Data(_) | Self::Command(_))
    }

    /// Returns the signal, if one was received.
    #[must_use]
    pub const fn signal(&self) -> Option<Signal> {
        match self {
            Self::Signal(signal) => Some(*signal),
            _ => None,
        }
    }

    /// Reports whether the connection cannot deliver more messages.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::HardEof | Self::Error(_))
            || matches!(self, Self::Signal(Signal::Terminate))
    }
}
