/// Running totals of bytes offered to and produced by the compressor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CompressionStats {
    /// Bytes handed to the send path before compression.
    pub comm_bytes: u64,
    /// Bytes that went on the wire after the compression decision.
    pub comm_compressed_bytes: u64,
}

impl CompressionStats {
    /// Ratio of wire bytes to raw bytes, `1.0` when nothing was sent.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.comm_bytes == 0 {
            return 1.0;
        }
        self.comm_compressed_bytes as f64 / self.comm_bytes as f64
    }
}
