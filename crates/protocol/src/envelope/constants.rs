/// Size of the basic header: one big-endian `i32`.
pub const HEADER_LEN: usize = 4;

/// Size of the extended header: length word plus flags word.
pub const EXTENDED_HEADER_LEN: usize = 8;

/// Length-word bit marking a comm-line LZ4 compressed payload.
pub const COMPRESSED_BIT: i32 = 1 << 30;

/// Length-word bit announcing a flags word after the length word.
pub const HDR_EXTEND_BIT: i32 = 1 << 29;

/// Largest payload a receiver accepts. Larger declarations terminate the
/// connection.
pub const MAX_RECV_PAYLOAD: usize = 1_000_000;

/// Sanity ceiling for outgoing payloads. Larger sends are caller bugs.
pub const MAX_SEND_PAYLOAD: usize = 4_000_000;

/// Largest data-compression offset encodable in the flags low byte.
pub const MAX_OFFSET: u8 = 254;

pub(crate) const LENGTH_MASK: i32 = !(COMPRESSED_BIT | HDR_EXTEND_BIT);
