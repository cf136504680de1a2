//! crates/logging/src/message_type.rs
//! Job-message severities.

use std::fmt;

use tracing::Level;

/// Severity attached to a job message.
///
/// The set mirrors the message classes the daemons route into job reports.
/// `Abort` and `Fatal` terminate the job at the caller's discretion; the
/// transport itself never aborts the process on their behalf.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    /// Unrecoverable internal failure.
    Abort,
    /// Failure that ends the current job.
    Fatal,
    /// Non-fatal error.
    Error,
    /// Warning that does not affect the outcome.
    Warning,
    /// Informational status line.
    Info,
    /// Security-relevant event (failed authentication, TLS mismatch).
    Security,
}

impl MessageType {
    /// Returns the upper-case label used when rendering the message.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Security => "SECURITY",
        }
    }

    /// Maps the severity onto a tracing level.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Abort | Self::Fatal | Self::Error | Self::Security => Level::ERROR,
            Self::Warning => Level::WARN,
            Self::Info => Level::INFO,
        }
    }

    /// Reports whether the severity ends the job.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Abort | Self::Fatal)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
