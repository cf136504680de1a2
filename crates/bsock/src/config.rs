use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use logging::{SharedSink, default_sink};

use crate::job::{NoJob, SharedJob};

/// Default I/O timeout: effectively forever, but finite so deadlines can be
/// computed.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(200 * 24 * 60 * 60);

/// Default network buffer size used when a caller asks for size zero.
pub const DEFAULT_NETWORK_BUFFER_SIZE: usize = 64 * 1024;

/// Default pause between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// Default total connection budget.
pub const DEFAULT_MAX_RETRY_TIME: Duration = Duration::from_secs(30 * 60);

/// Per-connection behaviour shared by every constructor.
#[derive(Clone)]
pub struct BsockOptions {
    /// Upper bound for any single read or write.
    pub io_timeout: Duration,
    /// Enables comm-line compression on sends.
    pub compression: bool,
    /// Writer-side bandwidth limit in bytes per second.
    pub bandwidth_limit: Option<NonZeroU64>,
    /// Destination for job messages.
    pub sink: SharedSink,
    /// Cancellation state of the owning job.
    pub job: SharedJob,
}

impl Default for BsockOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BsockOptions {
    /// Options with the defaults: long timeout, no compression, no limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            compression: false,
            bandwidth_limit: None,
            sink: default_sink(),
            job: Arc::new(NoJob),
        }
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Enables or disables comm-line compression.
    #[must_use]
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Sets the bandwidth limit. Zero removes it.
    #[must_use]
    pub fn bandwidth_limit(mut self, bytes_per_second: u64) -> Self {
        self.bandwidth_limit = NonZeroU64::new(bytes_per_second);
        self
    }

    /// Routes job messages to `sink`.
    #[must_use]
    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Attaches the owning job.
    #[must_use]
    pub fn job(mut self, job: SharedJob) -> Self {
        self.job = job;
        self
    }
}

impl fmt::Debug for BsockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BsockOptions")
            .field("io_timeout", &self.io_timeout)
            .field("compression", &self.compression)
            .field("bandwidth_limit", &self.bandwidth_limit)
            .finish_non_exhaustive()
    }
}

/// Inputs of the connect retry loop.
#[derive(Clone, Debug)]
pub struct ConnectConfig {
    /// Pause between attempts.
    pub retry_interval: Duration,
    /// Total time budget for all attempts.
    pub max_retry_time: Duration,
    /// TCP keep-idle time; zero leaves the system default.
    pub heartbeat_interval: Duration,
    /// Emit a warning each time the retry counter wraps.
    pub verbose: bool,
    /// Local address to bind before connecting.
    pub source_address: Option<SocketAddr>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectConfig {
    /// Defaults: 15 s between attempts, 30 minutes in total.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retry_time: DEFAULT_MAX_RETRY_TIME,
            heartbeat_interval: Duration::ZERO,
            verbose: false,
            source_address: None,
        }
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub const fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the total budget.
    #[must_use]
    pub const fn max_retry_time(mut self, budget: Duration) -> Self {
        self.max_retry_time = budget;
        self
    }

    /// Sets the TCP keep-idle time.
    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enables retry warnings.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Binds outgoing sockets to `addr`.
    #[must_use]
    pub const fn source_address(mut self, addr: Option<SocketAddr>) -> Self {
        self.source_address = addr;
        self
    }
}
