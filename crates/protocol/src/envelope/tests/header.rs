use super::*;

#[test]
fn plain_data_header_is_four_bytes() {
    let header = PacketHeader::data(5, false, FrameFlags::NONE).expect("constructible header");
    let mut out = Vec::new();
    header.encode_into(&mut out);
    assert_eq!(out, [0, 0, 0, 5]);
    assert_eq!(header.encoded_len(), HEADER_LEN);
}

#[test]
fn compressed_bit_lands_in_length_word() {
    let header = PacketHeader::data(100, true, FrameFlags::NONE).expect("constructible header");
    assert_eq!(header.length_word(), 100 | COMPRESSED_BIT);
    assert_eq!(
        HeaderWord::from_raw(header.length_word()),
        HeaderWord::Length {
            len: 100,
            compressed: true,
            extended: false,
        }
    );
}

#[test]
fn flagged_data_header_carries_flags_word() {
    let flags = FrameFlags::new().with_command();
    let header = PacketHeader::data(12, false, flags).expect("constructible header");
    let mut out = Vec::new();
    header.encode_into(&mut out);

    assert_eq!(out.len(), EXTENDED_HEADER_LEN);
    assert_eq!(header.length_word(), 12 | HDR_EXTEND_BIT);
    assert_eq!(&out[4..], IS_CMD_BIT.to_be_bytes());
}

#[test]
fn zero_length_command_still_uses_extended_header() {
    let header =
        PacketHeader::data(0, false, FrameFlags::new().with_command()).expect("constructible");
    let mut out = Vec::new();
    header.encode_into(&mut out);

    assert_eq!(out.len(), EXTENDED_HEADER_LEN);
    let word = HeaderWord::decode(&out).expect("decodes");
    assert_eq!(
        word,
        HeaderWord::Length {
            len: 0,
            compressed: false,
            extended: true,
        }
    );
}

#[test]
fn signal_header_is_always_basic() {
    let header = PacketHeader::signal(-1).expect("negative code");
    let mut out = Vec::new();
    header.encode_into(&mut out);

    assert_eq!(out, (-1i32).to_be_bytes());
    assert_eq!(header.payload_len(), 0);
    assert_eq!(HeaderWord::decode(&out).expect("decodes"), HeaderWord::Signal(-1));
}

#[test]
fn signal_rejects_non_negative_codes() {
    assert!(matches!(
        PacketHeader::signal(0),
        Err(ProtocolError::InvalidSignal(0))
    ));
}

#[test]
fn data_rejects_payloads_over_sender_limit() {
    assert!(PacketHeader::data(MAX_SEND_PAYLOAD, false, FrameFlags::NONE).is_ok());
    let err = PacketHeader::data(MAX_SEND_PAYLOAD + 1, false, FrameFlags::NONE)
        .expect_err("over the limit");
    assert!(matches!(err, ProtocolError::OversizedPayload(_)));
}

#[test]
fn oversize_detection_uses_receive_limit() {
    let at_limit = HeaderWord::from_raw(i32::try_from(MAX_RECV_PAYLOAD).expect("fits"));
    let over = HeaderWord::from_raw(i32::try_from(MAX_RECV_PAYLOAD + 1).expect("fits"));
    assert!(!at_limit.is_oversized());
    assert!(over.is_oversized());
    assert!(!HeaderWord::Signal(-4).is_oversized());
}

#[test]
fn decode_reports_truncated_input() {
    let err = HeaderWord::decode(&[0, 1]).expect_err("too short");
    assert!(matches!(
        err,
        ProtocolError::TruncatedHeader {
            expected: 4,
            actual: 2
        }
    ));
}

#[test]
fn offset_flag_survives_extended_header() {
    let flags = FrameFlags::new()
        .with_offset(9)
        .expect("offset fits")
        .with_data_compressed();
    let header = PacketHeader::data(40, false, flags).expect("constructible header");
    let mut out = Vec::new();
    header.encode_into(&mut out);

    let word = u32::from_be_bytes(out[4..8].try_into().expect("four bytes"));
    assert_ne!(word & OFFSET_BIT, 0);
    assert_eq!(FrameFlags::from_wire(word), flags);
}

#[test]
fn array_conversion_matches_decode() {
    let bytes = 77i32.to_be_bytes();
    assert_eq!(
        HeaderWord::from(bytes),
        HeaderWord::decode(&bytes).expect("decodes")
    );
}
