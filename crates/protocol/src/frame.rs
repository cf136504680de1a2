//! Contiguous frame assembly.
//!
//! A frame is written with a single write call, so the header, the optional
//! flags word and every payload segment are concatenated into one owned
//! buffer first. Payloads with a data-compression offset are built from two
//! segments: the uncompressed prefix and the (possibly compressed) remainder.

use crate::envelope::{FrameFlags, PacketHeader, ProtocolError};

/// Builds the wire image of a data frame from payload segments.
///
/// The announced length is the sum of the segment lengths.
pub fn assemble_data_frame(
    compressed: bool,
    flags: FrameFlags,
    segments: &[&[u8]],
) -> Result<Vec<u8>, ProtocolError> {
    let len: usize = segments.iter().map(|segment| segment.len()).sum();
    let header = PacketHeader::data(len, compressed, flags)?;
    let mut out = Vec::with_capacity(header.encoded_len() + len);
    header.encode_into(&mut out);
    for segment in segments {
        out.extend_from_slice(segment);
    }
    Ok(out)
}

/// Builds the wire image of a signal frame.
pub fn assemble_signal_frame(code: i32) -> Result<Vec<u8>, ProtocolError> {
    let header = PacketHeader::signal(code)?;
    let mut out = Vec::with_capacity(header.encoded_len());
    header.encode_into(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EXTENDED_HEADER_LEN, HEADER_LEN};

    #[test]
    fn segments_are_concatenated_after_header() {
        let frame = assemble_data_frame(false, FrameFlags::NONE, &[b"ab", b"", b"cd"])
            .expect("frame builds");
        assert_eq!(&frame[..HEADER_LEN], &[0, 0, 0, 4]);
        assert_eq!(&frame[HEADER_LEN..], b"abcd");
    }

    #[test]
    fn flagged_frame_reserves_flags_word() {
        let flags = FrameFlags::new().with_no_compress();
        let frame = assemble_data_frame(false, flags, &[b"xyz"]).expect("frame builds");
        assert_eq!(frame.len(), EXTENDED_HEADER_LEN + 3);
        assert_eq!(&frame[EXTENDED_HEADER_LEN..], b"xyz");
    }

    #[test]
    fn signal_frame_is_header_only() {
        let frame = assemble_signal_frame(-5).expect("negative code");
        assert_eq!(frame, (-5i32).to_be_bytes());
        assert!(assemble_signal_frame(3).is_err());
    }
}
