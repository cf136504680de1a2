use super::constants::{
    COMPRESSED_BIT, EXTENDED_HEADER_LEN, HDR_EXTEND_BIT, HEADER_LEN, LENGTH_MASK, MAX_RECV_PAYLOAD,
    MAX_SEND_PAYLOAD,
};
use super::error::ProtocolError;
use super::flags::FrameFlags;

/// Header of an outgoing frame.
///
/// Signals are always sent with the basic header. Data frames use the
/// extended header whenever any flag is set, including zero-length command
/// frames, so the receiver always finds the flags word it was told about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketHeader {
    /// A signal code travelling in place of a length.
    Signal(i32),
    /// A payload of `len` bytes.
    Data {
        /// Payload bytes that follow the header.
        len: u32,
        /// Whether comm-line compression was applied to the payload.
        compressed: bool,
        /// Extended-header flags.
        flags: FrameFlags,
    },
}

impl PacketHeader {
    /// Builds a signal header. Signal codes are negative.
    pub const fn signal(code: i32) -> Result<Self, ProtocolError> {
        if code >= 0 {
            return Err(ProtocolError::InvalidSignal(code));
        }
        Ok(Self::Signal(code))
    }

    /// Builds a data header, enforcing the sender sanity ceiling.
    pub const fn data(len: usize, compressed: bool, flags: FrameFlags) -> Result<Self, ProtocolError> {
        if len > MAX_SEND_PAYLOAD {
            return Err(ProtocolError::OversizedPayload(len));
        }
        Ok(Self::Data {
            len: len as u32,
            compressed,
            flags,
        })
    }

    /// Number of header bytes this header occupies on the wire.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::Signal(_) => HEADER_LEN,
            Self::Data { flags, .. } => {
                if flags.is_empty() {
                    HEADER_LEN
                } else {
                    EXTENDED_HEADER_LEN
                }
            }
        }
    }

    /// Payload bytes announced by the header.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        match self {
            Self::Signal(_) => 0,
            Self::Data { len, .. } => *len as usize,
        }
    }

    /// Returns the first header word with its marker bits applied.
    #[must_use]
    pub const fn length_word(&self) -> i32 {
        match self {
            Self::Signal(code) => *code,
            Self::Data {
                len,
                compressed,
                flags,
            } => {
                let mut word = *len as i32;
                if *compressed {
                    word |= COMPRESSED_BIT;
                }
                if !flags.is_empty() {
                    word |= HDR_EXTEND_BIT;
                }
                word
            }
        }
    }

    /// Appends the big-endian header bytes to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.length_word().to_be_bytes());
        if let Self::Data { flags, .. } = self {
            if !flags.is_empty() {
                out.extend_from_slice(&flags.to_wire().to_be_bytes());
            }
        }
    }
}

/// Decoded first word of an incoming frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderWord {
    /// Negative word: a signal code, no payload follows.
    Signal(i32),
    /// Non-negative word: a payload length with marker bits removed.
    Length {
        /// Announced payload length.
        len: usize,
        /// Comm-line compressed marker.
        compressed: bool,
        /// A flags word follows before the payload.
        extended: bool,
    },
}

impl HeaderWord {
    /// Interprets a host-order header word.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            return Self::Signal(raw);
        }
        Self::Length {
            len: (raw & LENGTH_MASK) as usize,
            compressed: raw & COMPRESSED_BIT != 0,
            extended: raw & HDR_EXTEND_BIT != 0,
        }
    }

    /// Parses the first four bytes of `bytes` as a big-endian header word.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let word: [u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|prefix| prefix.try_into().ok())
            .ok_or(ProtocolError::TruncatedHeader {
                expected: HEADER_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self::from_raw(i32::from_be_bytes(word)))
    }

    /// Reports whether the announced payload exceeds the receive ceiling.
    #[must_use]
    pub const fn is_oversized(self) -> bool {
        matches!(self, Self::Length { len, .. } if len > MAX_RECV_PAYLOAD)
    }
}

impl From<[u8; HEADER_LEN]> for HeaderWord {
    fn from(bytes: [u8; HEADER_LEN]) -> Self {
        Self::from_raw(i32::from_be_bytes(bytes))
    }
}
