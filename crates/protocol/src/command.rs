//! Command codes carried at the start of command frames.
//!
//! A command frame has the command flag set in its extended header and its
//! payload starts with a big-endian `i32` code followed by command-specific
//! bytes.

/// Dispatcher codes for command frames.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(i32)]
pub enum CommandCode {
    #[doc(alias = "BNET_CMD_NONE")]
    /// Reserved.
    None = 0,
    #[doc(alias = "BNET_CMD_ACK_HASH")]
    /// Deduplication acknowledge of a hash.
    AckHash = 1,
    #[doc(alias = "BNET_CMD_UNK_HASH")]
    /// Deduplication hash is unknown.
    UnknownHash = 2,
    #[doc(alias = "BNET_CMD_GET_HASH")]
    /// Request a hash.
    GetHash = 3,
    #[doc(alias = "BNET_CMD_STO_BLOCK")]
    /// Store a block.
    StoreBlock = 4,
    #[doc(alias = "BNET_CMD_REC_ACK")]
    /// Record acknowledgement.
    RecordAck = 5,
    #[doc(alias = "BNET_CMD_STP_THREAD")]
    /// Stop the peer's worker thread.
    StopThread = 6,
    #[doc(alias = "BNET_CMD_STP_FLOWCTRL")]
    /// Stop flow control.
    StopFlowControl = 7,
}

/// Length of the command prefix.
pub const COMMAND_PREFIX_LEN: usize = 4;

impl CommandCode {
    /// Returns the numeric code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps a numeric code to a command.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::AckHash),
            2 => Some(Self::UnknownHash),
            3 => Some(Self::GetHash),
            4 => Some(Self::StoreBlock),
            5 => Some(Self::RecordAck),
            6 => Some(Self::StopThread),
            7 => Some(Self::StopFlowControl),
            _ => None,
        }
    }

    /// Builds a command payload from the code and its argument bytes.
    #[must_use]
    pub fn encode_payload(self, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(COMMAND_PREFIX_LEN + body.len());
        out.extend_from_slice(&self.as_i32().to_be_bytes());
        out.extend_from_slice(body);
        out
    }
}

/// Splits a command payload into its raw code and argument bytes.
///
/// Returns `None` when the payload is shorter than the code prefix. The raw
/// code is returned so callers can report codes they do not understand.
#[must_use]
pub fn split_command(payload: &[u8]) -> Option<(i32, &[u8])> {
    let (prefix, body) = payload.split_first_chunk::<COMMAND_PREFIX_LEN>()?;
    Some((i32::from_be_bytes(*prefix), body))
}
