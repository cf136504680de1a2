//! When a message is worth compressing.

/// Messages of this many bytes or fewer are never compressed.
pub const MIN_COMPRESS_LEN: usize = 20;

/// A compressed result must be at least this many bytes smaller than the
/// original to be used.
pub const MIN_SAVINGS: usize = 10;

/// Inputs to the per-message compression decision.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CompressionPolicy {
    /// Compression is enabled on the connection.
    pub enabled: bool,
    /// The connection is currently diverting frames to a spool file.
    pub spooling: bool,
}

impl CompressionPolicy {
    /// Policy for a connection with compression switched on.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            spooling: false,
        }
    }

    /// Reports whether a message of `len` bytes should be tried.
    #[must_use]
    pub const fn should_attempt(self, len: usize) -> bool {
        len > MIN_COMPRESS_LEN && self.enabled && !self.spooling
    }
}

/// Reports whether `compressed` bytes are a worthwhile replacement for
/// `original` bytes.
#[must_use]
pub const fn worth_keeping(compressed: usize, original: usize) -> bool {
    compressed > 0 && compressed + MIN_SAVINGS <= original
}
