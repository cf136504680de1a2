//! Send-side comm-line compression.

use lz4_flex::block::{compress_into, get_maximum_output_size};

use crate::error::CommCompressError;
use crate::policy::{CompressionPolicy, worth_keeping};
use crate::stats::CompressionStats;

/// Per-connection compressor with its scratch buffer and byte counters.
///
/// The region of a message before `offset` is copied verbatim; only the
/// remainder is compressed. The scratch buffer is reused across messages and
/// grows to the largest bound seen.
#[derive(Debug, Default)]
pub struct CommCompressor {
    policy: CompressionPolicy,
    stats: CompressionStats,
    scratch: Vec<u8>,
}

impl CommCompressor {
    /// Creates a compressor with the given policy.
    #[must_use]
    pub const fn new(policy: CompressionPolicy) -> Self {
        Self {
            policy,
            stats: CompressionStats {
                comm_bytes: 0,
                comm_compressed_bytes: 0,
            },
            scratch: Vec::new(),
        }
    }

    /// Current policy.
    #[must_use]
    pub const fn policy(&self) -> CompressionPolicy {
        self.policy
    }

    /// Enables or disables compression for later messages.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.policy.enabled = enabled;
    }

    /// Marks whether frames are being diverted to a spool file.
    pub const fn set_spooling(&mut self, spooling: bool) {
        self.policy.spooling = spooling;
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> CompressionStats {
        self.stats
    }

    /// Runs the compression decision for one outgoing message.
    ///
    /// Returns the bytes to put on the wire when compression was applied and
    /// saved enough, or `None` when `msg` should be sent as it is. Both
    /// counters are updated either way.
    pub fn compress(
        &mut self,
        msg: &[u8],
        offset: usize,
    ) -> Result<Option<&[u8]>, CommCompressError> {
        if offset > msg.len() {
            return Err(CommCompressError::OffsetBeyondMessage {
                offset,
                len: msg.len(),
            });
        }
        self.stats.comm_bytes += msg.len() as u64;

        if !self.policy.should_attempt(msg.len()) {
            self.stats.comm_compressed_bytes += msg.len() as u64;
            return Ok(None);
        }

        let region = &msg[offset..];
        self.scratch.clear();
        self.scratch
            .resize(offset + get_maximum_output_size(region.len()), 0);
        self.scratch[..offset].copy_from_slice(&msg[..offset]);
        let clen = compress_into(region, &mut self.scratch[offset..])?;

        if worth_keeping(clen, region.len()) {
            self.scratch.truncate(offset + clen);
            self.stats.comm_compressed_bytes += self.scratch.len() as u64;
            Ok(Some(&self.scratch))
        } else {
            self.stats.comm_compressed_bytes += msg.len() as u64;
            Ok(None)
        }
    }
}
