//! Packet header codec.
//!
//! Every frame starts with a big-endian `i32`. Non-negative values carry the
//! payload length with two high bits reserved for the comm-line compressed
//! marker and the extended-header marker; negative values are signals. When
//! the extended marker is present a second big-endian word carries
//! [`FrameFlags`].

mod constants;
mod error;
mod flags;
mod header;

pub use constants::{
    COMPRESSED_BIT, EXTENDED_HEADER_LEN, HDR_EXTEND_BIT, HEADER_LEN, MAX_OFFSET, MAX_RECV_PAYLOAD,
    MAX_SEND_PAYLOAD,
};
pub use error::ProtocolError;
pub use flags::{DATA_COMPRESSED_BIT, FrameFlags, IS_CMD_BIT, NO_COMPRESS_BIT, OFFSET_BIT};
pub use header::{HeaderWord, PacketHeader};

#[cfg(test)]
mod tests;
