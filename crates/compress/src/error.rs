/// Failures raised by the comm-line codec.
#[derive(Debug, thiserror::Error)]
pub enum CommCompressError {
    /// The data-compression offset lies past the end of the message.
    #[error("compression offset {offset} is beyond the {len}-byte message")]
    OffsetBeyondMessage {
        /// Requested offset.
        offset: usize,
        /// Message length.
        len: usize,
    },

    /// The LZ4 encoder rejected the input.
    #[error("LZ4 compression failed: {0}")]
    Compress(#[from] lz4_flex::block::CompressError),

    /// The LZ4 decoder rejected the input.
    #[error("LZ4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// The decompressed size never fit the scratch buffer.
    #[error("decompressed data exceeds {limit} bytes after {attempts} attempts")]
    OutputTooLarge {
        /// Largest scratch size tried.
        limit: usize,
        /// Attempts made.
        attempts: u32,
    },
}
