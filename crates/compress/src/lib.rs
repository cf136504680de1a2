#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Comm-line compression for bnet frames. Messages longer than
//! [`MIN_COMPRESS_LEN`] bytes are run through the LZ4 block compressor and
//! sent compressed only when that saves at least [`MIN_SAVINGS`] bytes.
//! Receivers decompress into a scratch buffer that grows until the output
//! fits or [`MAX_DECOMPRESS_ATTEMPTS`] is reached.
//!
//! # Design
//!
//! [`CommCompressor`] owns one connection's scratch buffer and counters, so
//! the send path never allocates once the buffer has grown to the largest
//! message seen. A data-compression offset splits a message into an
//! uncompressed header region and a compressed remainder; both
//! [`CommCompressor::compress`] and [`decompress_message`] keep the header
//! region in place.
//!
//! # Invariants
//!
//! - Both counters in [`CompressionStats`] advance on every call to
//!   [`CommCompressor::compress`], whether or not compression was applied.
//! - Spooling connections never compress.
//!
//! # Examples
//!
//! ```
//! use compress::{CommCompressor, CompressionPolicy, decompress_message};
//!
//! let mut compressor = CommCompressor::new(CompressionPolicy::enabled());
//! let msg = b"abcdefgh".repeat(100);
//! let mut wire = compressor.compress(&msg, 0).unwrap().unwrap().to_vec();
//!
//! let mut scratch = Vec::new();
//! decompress_message(&mut wire, 0, &mut scratch).unwrap();
//! assert_eq!(wire, msg);
//! ```

mod decoder;
mod encoder;
mod error;
mod policy;
mod stats;

pub use decoder::{
    MAX_DECOMPRESS_ATTEMPTS, MIN_RETRY_SCRATCH, decompress_adaptive, decompress_message,
};
pub use encoder::CommCompressor;
pub use error::CommCompressError;
pub use policy::{CompressionPolicy, MIN_COMPRESS_LEN, MIN_SAVINGS, worth_keeping};
pub use stats::CompressionStats;
