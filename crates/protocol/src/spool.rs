//! Attribute spool file format.
//!
//! A spool file holds frames that were diverted to disk instead of the
//! socket. Each record is a basic header (big-endian `i32` length) followed
//! by that many payload bytes when the length is positive. Non-positive
//! lengths are signals or empty messages and carry no payload.

use std::io::{self, Read, Write};

use crate::envelope::{HEADER_LEN, ProtocolError};

/// One record read back from a spool file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SpoolEntry {
    /// A payload record; the bytes are in the reader's buffer.
    Data(usize),
    /// A record whose header held a non-positive value.
    Marker(i32),
}

/// Appends a payload record to a spool.
pub fn write_spool_record<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    let len = i32::try_from(payload.len())
        .map_err(|_| ProtocolError::OversizedPayload(payload.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Appends a header-only record (signal or empty message) to a spool.
pub fn write_spool_marker<W: Write>(writer: &mut W, value: i32) -> Result<(), ProtocolError> {
    if value > 0 {
        return Err(ProtocolError::InvalidSignal(value));
    }
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Sequential reader over spool records.
///
/// The payload of the last [`SpoolEntry::Data`] record is available through
/// [`SpoolReader::payload`] until the next call to [`SpoolReader::next_entry`].
#[derive(Debug)]
pub struct SpoolReader<R> {
    inner: R,
    buffer: Vec<u8>,
    records: u64,
    bytes: u64,
}

impl<R: Read> SpoolReader<R> {
    /// Wraps a reader positioned at the first record.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            records: 0,
            bytes: 0,
        }
    }

    /// Reads the next record. `Ok(None)` marks a clean end of file.
    pub fn next_entry(&mut self) -> Result<Option<SpoolEntry>, ProtocolError> {
        let mut header = [0u8; HEADER_LEN];
        let got = read_fully(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(ProtocolError::TruncatedSpool {
                wanted: HEADER_LEN,
                got,
            });
        }
        self.bytes += HEADER_LEN as u64;
        self.records += 1;

        let value = i32::from_be_bytes(header);
        let Ok(len) = usize::try_from(value) else {
            return Ok(Some(SpoolEntry::Marker(value)));
        };
        if len == 0 {
            return Ok(Some(SpoolEntry::Marker(0)));
        }

        self.buffer.resize(len, 0);
        let got = read_fully(&mut self.inner, &mut self.buffer)?;
        if got != len {
            return Err(ProtocolError::TruncatedSpool { wanted: len, got });
        }
        self.bytes += len as u64;
        Ok(Some(SpoolEntry::Data(len)))
    }

    /// Payload of the most recent data record.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    /// Records read so far.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Bytes consumed so far, headers included.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
