use super::constants::MAX_OFFSET;
use super::error::ProtocolError;

/// Flags-word bit: the payload is a command for the peer's dispatcher.
pub const IS_CMD_BIT: u32 = 1 << 28;
/// Flags-word bit: the low byte holds a data-compression offset.
pub const OFFSET_BIT: u32 = 1 << 27;
/// Flags-word bit: the sender asked that the payload not be compressed.
pub const NO_COMPRESS_BIT: u32 = 1 << 25;
/// Flags-word bit: the payload region after the offset is LZ4 compressed.
pub const DATA_COMPRESSED_BIT: u32 = 1 << 24;

const OFFSET_MASK: u32 = 0xFF;

/// Per-frame options carried by the extended header.
///
/// The struct keeps the independent booleans and the offset apart; the packed
/// representation only exists at the codec edge ([`Self::to_wire`] and
/// [`Self::from_wire`]). A non-zero offset implies the offset bit.
///
/// ```
/// use protocol::FrameFlags;
///
/// let flags = FrameFlags::new().with_command().with_offset(12).unwrap();
/// assert!(flags.is_command());
/// assert_eq!(flags.offset(), 12);
/// assert_eq!(FrameFlags::from_wire(flags.to_wire()), flags);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct FrameFlags {
    command: bool,
    no_compress: bool,
    data_compressed: bool,
    offset: u8,
}

impl FrameFlags {
    /// Flags for a plain frame.
    pub const NONE: Self = Self {
        command: false,
        no_compress: false,
        data_compressed: false,
        offset: 0,
    };

    /// Returns an empty flag set.
    #[must_use]
    pub const fn new() -> Self {
        Self::NONE
    }

    /// Marks the frame as a command.
    #[must_use]
    pub const fn with_command(mut self) -> Self {
        self.command = true;
        self
    }

    /// Suppresses comm-line compression for this frame.
    #[must_use]
    pub const fn with_no_compress(mut self) -> Self {
        self.no_compress = true;
        self
    }

    /// Declares that the caller already compressed the payload.
    #[must_use]
    pub const fn with_data_compressed(mut self) -> Self {
        self.data_compressed = true;
        self
    }

    /// Sets the data-compression offset. Bytes before the offset travel
    /// uncompressed.
    pub fn with_offset(mut self, offset: usize) -> Result<Self, ProtocolError> {
        let offset = u8::try_from(offset)
            .ok()
            .filter(|value| *value <= MAX_OFFSET)
            .ok_or(ProtocolError::OffsetOutOfRange(offset))?;
        self.offset = offset;
        Ok(self)
    }

    /// Clears the data-compressed marker.
    #[must_use]
    pub const fn without_data_compressed(mut self) -> Self {
        self.data_compressed = false;
        self
    }

    /// Reports whether the command bit is set.
    #[must_use]
    pub const fn is_command(self) -> bool {
        self.command
    }

    /// Reports whether comm-line compression was suppressed.
    #[must_use]
    pub const fn is_no_compress(self) -> bool {
        self.no_compress
    }

    /// Reports whether the payload after the offset is compressed.
    #[must_use]
    pub const fn is_data_compressed(self) -> bool {
        self.data_compressed
    }

    /// Returns the data-compression offset, zero when absent.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset as usize
    }

    /// Reports whether a data-compression offset is present.
    #[must_use]
    pub const fn has_offset(self) -> bool {
        self.offset != 0
    }

    /// Reports whether no flag is set, in which case the basic header is used.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.command && !self.no_compress && !self.data_compressed && self.offset == 0
    }

    /// Packs the flags into the extended-header word.
    #[must_use]
    pub const fn to_wire(self) -> u32 {
        let mut word = self.offset as u32;
        if self.offset != 0 {
            word |= OFFSET_BIT;
        }
        if self.command {
            word |= IS_CMD_BIT;
        }
        if self.no_compress {
            word |= NO_COMPRESS_BIT;
        }
        if self.data_compressed {
            word |= DATA_COMPRESSED_BIT;
        }
        word
    }

    /// Unpacks an extended-header word. Unknown bits are ignored, and the
    /// offset is only honoured when the offset bit is present.
    #[must_use]
    pub const fn from_wire(word: u32) -> Self {
        let offset = if word & OFFSET_BIT != 0 {
            (word & OFFSET_MASK) as u8
        } else {
            0
        };
        Self {
            command: word & IS_CMD_BIT != 0,
            no_compress: word & NO_COMPRESS_BIT != 0,
            data_compressed: word & DATA_COMPRESSED_BIT != 0,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_flags_pack_to_zero() {
        assert_eq!(FrameFlags::NONE.to_wire(), 0);
        assert!(FrameFlags::new().is_empty());
    }

    #[test]
    fn offset_sets_offset_bit_and_low_byte() {
        let flags = FrameFlags::new().with_offset(17).expect("offset fits");
        assert_eq!(flags.to_wire(), OFFSET_BIT | 17);
        assert!(flags.has_offset());
        assert!(!flags.is_empty());
    }

    #[test]
    fn zero_offset_leaves_offset_bit_clear() {
        let flags = FrameFlags::new().with_offset(0).expect("zero offset");
        assert_eq!(flags.to_wire(), 0);
    }

    #[test]
    fn offset_255_is_rejected() {
        let err = FrameFlags::new().with_offset(255).expect_err("too large");
        assert!(matches!(err, ProtocolError::OffsetOutOfRange(255)));
        assert!(FrameFlags::new().with_offset(254).is_ok());
    }

    #[test]
    fn individual_bits_match_upstream_layout() {
        assert_eq!(FrameFlags::new().with_command().to_wire(), 0x1000_0000);
        assert_eq!(FrameFlags::new().with_no_compress().to_wire(), 0x0200_0000);
        assert_eq!(
            FrameFlags::new().with_data_compressed().to_wire(),
            0x0100_0000
        );
    }

    #[test]
    fn from_wire_ignores_low_byte_without_offset_bit() {
        let flags = FrameFlags::from_wire(IS_CMD_BIT | 0x42);
        assert!(flags.is_command());
        assert_eq!(flags.offset(), 0);
    }

    #[test]
    fn from_wire_ignores_reserved_bits() {
        let flags = FrameFlags::from_wire((1 << 26) | (1 << 20));
        assert!(flags.is_empty());
    }
}
