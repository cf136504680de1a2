pub(super) use super::{
    COMPRESSED_BIT, EXTENDED_HEADER_LEN, FrameFlags, HDR_EXTEND_BIT, HEADER_LEN, HeaderWord,
    IS_CMD_BIT, MAX_RECV_PAYLOAD, MAX_SEND_PAYLOAD, OFFSET_BIT, PacketHeader, ProtocolError,
};

mod header;
