use logging::MessageType;

use crate::connection::Connection;
use crate::error::BsockError;

/// Blocking mode of a connection's socket.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BlockingMode {
    /// Reads and writes wait for the socket.
    #[default]
    Blocking,
    /// Reads and writes return `WouldBlock` instead of waiting.
    NonBlocking,
}

impl Connection {
    /// Switches the socket to non-blocking mode and returns the previous
    /// mode for [`Self::restore_blocking`].
    pub fn set_nonblocking(&mut self) -> Result<BlockingMode, BsockError> {
        let previous = self.blocking_mode();
        self.apply_blocking(BlockingMode::NonBlocking)?;
        Ok(previous)
    }

    /// Switches the socket to blocking mode and returns the previous mode.
    pub fn set_blocking(&mut self) -> Result<BlockingMode, BsockError> {
        let previous = self.blocking_mode();
        self.apply_blocking(BlockingMode::Blocking)?;
        Ok(previous)
    }

    /// Restores a mode returned by [`Self::set_blocking`] or
    /// [`Self::set_nonblocking`].
    pub fn restore_blocking(&mut self, mode: BlockingMode) -> Result<(), BsockError> {
        self.apply_blocking(mode)
    }

    /// Current blocking mode.
    pub const fn blocking_mode(&self) -> BlockingMode {
        if self.blocking {
            BlockingMode::Blocking
        } else {
            BlockingMode::NonBlocking
        }
    }

    fn apply_blocking(&mut self, mode: BlockingMode) -> Result<(), BsockError> {
        let transport = self.transport_ref()?;
        if let Err(err) = transport.set_nonblocking(mode == BlockingMode::NonBlocking) {
            self.options
                .sink
                .emit(MessageType::Abort, &format!("fcntl F_SETFL error. ERR={err}"));
            return Err(err.into());
        }
        self.blocking = mode == BlockingMode::Blocking;
        Ok(())
    }
}
