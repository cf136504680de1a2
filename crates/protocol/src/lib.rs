#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Wire-level building blocks for the bnet inter-daemon transport.
//!
//! Every message on a bnet connection starts with a big-endian 32-bit word.
//! A positive word is a payload length whose two high bits mark comm-line
//! compression and an extended header; a negative word is a [`Signal`]. When
//! the extended header is present a second word carries [`FrameFlags`]
//! (command, no-compress, data-compressed and a data-compression offset).
//!
//! This crate owns that encoding and nothing else: it never touches a socket.
//! Higher layers build frames with [`assemble_data_frame`], classify incoming
//! words with [`HeaderWord`], and replay spooled traffic with [`SpoolReader`].
//!
//! # Examples
//!
//! Encode a command frame and classify its header on the receiving side.
//!
//! ```
//! use protocol::{FrameFlags, HeaderWord, assemble_data_frame};
//!
//! let flags = FrameFlags::new().with_command();
//! let frame = assemble_data_frame(false, flags, &[b"status"]).unwrap();
//!
//! match HeaderWord::decode(&frame).unwrap() {
//!     HeaderWord::Length { len, extended, .. } => {
//!         assert_eq!(len, 6);
//!         assert!(extended);
//!     }
//!     HeaderWord::Signal(_) => unreachable!(),
//! }
//! ```
//!
//! Signals round-trip through their wire codes.
//!
//! ```
//! use protocol::Signal;
//!
//! assert_eq!(Signal::from_code(-1), Signal::EndOfData);
//! assert_eq!(Signal::Terminate.code(), -4);
//! assert_eq!(Signal::from_code(-77).to_string(), "Unknown sig -77");
//! ```

mod command;
mod envelope;
mod frame;
mod signal;
mod spool;
mod tls_need;

pub use command::{COMMAND_PREFIX_LEN, CommandCode, split_command};
pub use envelope::{
    COMPRESSED_BIT, DATA_COMPRESSED_BIT, EXTENDED_HEADER_LEN, FrameFlags, HDR_EXTEND_BIT,
    HEADER_LEN, HeaderWord, IS_CMD_BIT, MAX_OFFSET, MAX_RECV_PAYLOAD, MAX_SEND_PAYLOAD,
    NO_COMPRESS_BIT, OFFSET_BIT, PacketHeader, ProtocolError,
};
pub use frame::{assemble_data_frame, assemble_signal_frame};
pub use signal::Signal;
pub use spool::{SpoolEntry, SpoolReader, write_spool_marker, write_spool_record};
pub use tls_need::{TlsNeed, TlsPskNeed};
