use std::io;

use super::constants::{MAX_OFFSET, MAX_SEND_PAYLOAD};

/// Failures raised while constructing, decoding or replaying frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Fewer bytes than a header word were available.
    #[error("frame header truncated: expected {expected} bytes, got {actual}")]
    TruncatedHeader {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// A data-compression offset does not fit the flags low byte.
    #[error("data compression offset {0} exceeds the maximum of {MAX_OFFSET}")]
    OffsetOutOfRange(usize),

    /// The offset points past the end of the payload.
    #[error("data compression offset {offset} is beyond the {len}-byte payload")]
    OffsetBeyondPayload {
        /// Requested offset.
        offset: usize,
        /// Payload length.
        len: usize,
    },

    /// An outgoing payload exceeds the sender sanity ceiling.
    #[error("payload length {0} exceeds the sender limit of {MAX_SEND_PAYLOAD} bytes")]
    OversizedPayload(usize),

    /// A signal header was requested with a non-negative code.
    #[error("signal code {0} is not negative")]
    InvalidSignal(i32),

    /// A spool record announced more payload than the file holds.
    #[error("fread attr spool error. Wanted={wanted} got={got} bytes.")]
    TruncatedSpool {
        /// Bytes announced by the record header.
        wanted: usize,
        /// Bytes actually present.
        got: usize,
    },

    /// The spool file could not be read or written.
    #[error("attr spool I/O error: {0}")]
    SpoolIo(#[from] io::Error),
}
