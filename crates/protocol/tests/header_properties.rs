//! Property tests for the frame header codec.
//!
//! Verifies that:
//! - any sendable length and flag set decodes to the same length and markers
//! - the flags word survives packing for every legal offset
//! - arbitrary header words never panic the classifier
//! - spool files replay every record they were written with

use std::io::Cursor;

use proptest::prelude::*;
use protocol::{
    EXTENDED_HEADER_LEN, FrameFlags, HEADER_LEN, HeaderWord, MAX_OFFSET, MAX_SEND_PAYLOAD,
    SpoolEntry, SpoolReader, assemble_data_frame, write_spool_marker, write_spool_record,
};

// ============================================================================
// Strategies
// ============================================================================

fn flags_strategy() -> impl Strategy<Value = FrameFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), 0..=MAX_OFFSET).prop_map(
        |(command, no_compress, data_compressed, offset)| {
            let mut flags = FrameFlags::new()
                .with_offset(usize::from(offset))
                .unwrap_or(FrameFlags::NONE);
            if command {
                flags = flags.with_command();
            }
            if no_compress {
                flags = flags.with_no_compress();
            }
            if data_compressed {
                flags = flags.with_data_compressed();
            }
            flags
        },
    )
}

// ============================================================================
// Header codec
// ============================================================================

proptest! {
    #[test]
    fn length_and_markers_survive_encoding(
        len in 0usize..=MAX_SEND_PAYLOAD,
        compressed in any::<bool>(),
        flags in flags_strategy(),
    ) {
        let header = protocol::PacketHeader::data(len, compressed, flags).unwrap();
        let mut out = Vec::new();
        header.encode_into(&mut out);

        let expected_len = if flags.is_empty() { HEADER_LEN } else { EXTENDED_HEADER_LEN };
        prop_assert_eq!(out.len(), expected_len);
        prop_assert_eq!(
            HeaderWord::decode(&out).unwrap(),
            HeaderWord::Length { len, compressed, extended: !flags.is_empty() }
        );
        if !flags.is_empty() {
            let word = u32::from_be_bytes(out[4..8].try_into().unwrap());
            prop_assert_eq!(FrameFlags::from_wire(word), flags);
        }
    }

    #[test]
    fn classifier_accepts_any_word(raw in any::<i32>()) {
        match HeaderWord::from_raw(raw) {
            HeaderWord::Signal(code) => prop_assert!(code < 0),
            HeaderWord::Length { len, .. } => prop_assert!(len < (1 << 29)),
        }
    }

    #[test]
    fn frames_carry_payload_after_header(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let frame = assemble_data_frame(false, FrameFlags::NONE, &[&payload]).unwrap();
        prop_assert_eq!(&frame[HEADER_LEN..], payload.as_slice());
    }
}

// ============================================================================
// Spool replay
// ============================================================================

proptest! {
    #[test]
    fn spool_replays_all_records(
        records in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 0..16)
    ) {
        let mut spool = Vec::new();
        for record in &records {
            write_spool_record(&mut spool, record).unwrap();
        }
        write_spool_marker(&mut spool, -1).unwrap();

        let mut reader = SpoolReader::new(Cursor::new(spool));
        for record in &records {
            prop_assert_eq!(reader.next_entry().unwrap(), Some(SpoolEntry::Data(record.len())));
            prop_assert_eq!(reader.payload(), record.as_slice());
        }
        prop_assert_eq!(reader.next_entry().unwrap(), Some(SpoolEntry::Marker(-1)));
        prop_assert_eq!(reader.next_entry().unwrap(), None);
    }
}

#[test]
fn spool_file_on_disk_replays() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("attr.spool");
    {
        let mut file = std::fs::File::create(&path).expect("create");
        write_spool_record(&mut file, b"attributes").expect("write");
    }
    let file = std::fs::File::open(&path).expect("open");
    let mut reader = SpoolReader::new(file);
    assert_eq!(reader.next_entry().expect("read"), Some(SpoolEntry::Data(10)));
    assert_eq!(reader.payload(), b"attributes");
}
