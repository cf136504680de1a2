use logging::{JobMessageSink, MessageType, trace_net};
use socket2::SockRef;

use crate::config::DEFAULT_NETWORK_BUFFER_SIZE;
use crate::connection::Connection;

/// Step by which a refused socket buffer size is reduced.
pub const TAPE_BSIZE: usize = 64_512;

/// Which kernel socket buffers [`Connection::set_buffer_size`] adjusts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BufferDirection {
    /// `SO_RCVBUF` only.
    Read,
    /// `SO_SNDBUF` only.
    Write,
    /// Both buffers.
    Both,
}

impl BufferDirection {
    const fn read(self) -> bool {
        matches!(self, Self::Read | Self::Both)
    }

    const fn write(self) -> bool {
        matches!(self, Self::Write | Self::Both)
    }
}

impl Connection {
    /// Sizes the message buffer and the kernel socket buffers.
    ///
    /// A size of zero reserves [`DEFAULT_NETWORK_BUFFER_SIZE`] for the
    /// message buffer and leaves the kernel buffers at the system defaults.
    /// Otherwise each refused size is reduced by [`TAPE_BSIZE`] until the
    /// kernel accepts it, with a warning when the result is smaller than
    /// requested. Returns the size obtained.
    pub fn set_buffer_size(&mut self, size: usize, direction: BufferDirection) -> usize {
        let requested = if size == 0 {
            DEFAULT_NETWORK_BUFFER_SIZE
        } else {
            size
        };
        self.msg
            .reserve((requested + 100).saturating_sub(self.msg.len()));
        if size == 0 {
            return requested;
        }

        let Some(stream) = self.transport.as_deref().and_then(|t| t.tcp_stream()) else {
            trace_net!(peer = %self.peer, "no socket to size");
            return requested;
        };
        let socket = SockRef::from(stream);
        let sink = self.options.sink.as_ref();
        let mut obtained = requested;

        if direction.read() {
            obtained = shrink_until_accepted(requested, sink, |n| socket.set_recv_buffer_size(n));
        }
        if direction.write() {
            obtained = shrink_until_accepted(requested, sink, |n| socket.set_send_buffer_size(n));
        }
        trace_net!(peer = %self.peer, obtained, "network buffer size");
        obtained
    }
}

fn shrink_until_accepted<F>(requested: usize, sink: &dyn JobMessageSink, mut apply: F) -> usize
where
    F: FnMut(usize) -> std::io::Result<()>,
{
    let mut size = requested;
    while size > TAPE_BSIZE {
        match apply(size) {
            Ok(()) => break,
            Err(err) => {
                sink.emit(MessageType::Error, &format!("sockopt error: {err}"));
                size -= TAPE_BSIZE;
            }
        }
    }
    if size != requested {
        sink.emit(
            MessageType::Warning,
            &format!("Warning network buffer = {size} bytes not max size."),
        );
    }
    size
}
