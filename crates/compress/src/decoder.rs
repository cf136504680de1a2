//! Receive-side decompression with a growing scratch buffer.

use lz4_flex::block::{DecompressError, decompress_into};

use crate::error::CommCompressError;

/// Decompression attempts before giving up.
pub const MAX_DECOMPRESS_ATTEMPTS: u32 = 7;

/// Smallest scratch size used after the first failed attempt.
pub const MIN_RETRY_SCRATCH: usize = 65_536;

/// Decompresses `input` into `scratch`, returning the decompressed length.
///
/// The first attempt uses four times the compressed length. Each attempt that
/// runs out of room grows the buffer to [`MIN_RETRY_SCRATCH`] if it was
/// smaller, otherwise doubles it. Any other decoder error fails at once.
pub fn decompress_adaptive(input: &[u8], scratch: &mut Vec<u8>) -> Result<usize, CommCompressError> {
    let mut size = input.len() * 4;
    for _ in 0..MAX_DECOMPRESS_ATTEMPTS {
        scratch.clear();
        scratch.resize(size, 0);
        match decompress_into(input, scratch) {
            Ok(n) => {
                scratch.truncate(n);
                return Ok(n);
            }
            Err(DecompressError::OutputTooSmall { .. }) => {
                size = if size < MIN_RETRY_SCRATCH {
                    MIN_RETRY_SCRATCH
                } else {
                    size * 2
                };
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(CommCompressError::OutputTooLarge {
        limit: size,
        attempts: MAX_DECOMPRESS_ATTEMPTS,
    })
}

/// Decompresses the part of `msg` after `offset` in place.
///
/// The bytes before `offset` are kept. On return `msg` holds the header
/// region followed by the decompressed data, and the new length is returned.
pub fn decompress_message(
    msg: &mut Vec<u8>,
    offset: usize,
    scratch: &mut Vec<u8>,
) -> Result<usize, CommCompressError> {
    if offset > msg.len() {
        return Err(CommCompressError::OffsetBeyondMessage {
            offset,
            len: msg.len(),
        });
    }
    let n = decompress_adaptive(&msg[offset..], scratch)?;
    msg.truncate(offset);
    msg.extend_from_slice(&scratch[..n]);
    Ok(msg.len())
}
