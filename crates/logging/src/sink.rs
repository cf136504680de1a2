//! crates/logging/src/sink.rs
//! Destinations for job messages.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::MessageType;

/// Receives operator-facing job messages.
///
/// Implementations must be cheap to call and must not perform I/O on the
/// connection that produced the message.
pub trait JobMessageSink: Send + Sync {
    /// Delivers one message.
    fn emit(&self, kind: MessageType, text: &str);
}

/// Reference-counted sink shared between a connection and its duplicates.
pub type SharedSink = Arc<dyn JobMessageSink>;

/// Returns the process-default sink, a [`TracingSink`].
#[must_use]
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Forwards job messages to `tracing` under the `bnet::jobmsg` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl JobMessageSink for TracingSink {
    fn emit(&self, kind: MessageType, text: &str) {
        let text = text.trim_end_matches('\n');
        match kind {
            MessageType::Abort | MessageType::Fatal | MessageType::Error => {
                tracing::error!(target: "bnet::jobmsg", severity = kind.as_str(), "{text}");
            }
            MessageType::Security => {
                tracing::error!(target: "bnet::security", severity = kind.as_str(), "{text}");
            }
            MessageType::Warning => {
                tracing::warn!(target: "bnet::jobmsg", severity = kind.as_str(), "{text}");
            }
            MessageType::Info => {
                tracing::info!(target: "bnet::jobmsg", severity = kind.as_str(), "{text}");
            }
        }
    }
}

/// A captured job message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobMessage {
    /// Severity of the message.
    pub kind: MessageType,
    /// Rendered text without a trailing newline.
    pub text: String,
}

impl fmt::Display for JobMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.text)
    }
}

/// Sink that stores every message in memory.
///
/// Used by tests to assert on the diagnostics a connection produced.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<JobMessage>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sink wrapped in an [`Arc`], ready to hand to a
    /// connection while the caller keeps a handle for inspection.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Removes and returns all captured messages.
    pub fn drain(&self) -> Vec<JobMessage> {
        let mut guard = self
            .messages
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        std::mem::take(&mut *guard)
    }

    /// Returns a copy of the captured messages without clearing them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Reports whether any captured message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.snapshot().iter().any(|msg| msg.text.contains(needle))
    }
}

impl JobMessageSink for CollectingSink {
    fn emit(&self, kind: MessageType, text: &str) {
        let mut guard = self
            .messages
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        guard.push(JobMessage {
            kind,
            text: text.trim_end_matches('\n').to_owned(),
        });
    }
}
