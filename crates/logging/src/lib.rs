#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` carries the diagnostics plumbing shared by every bnet crate. Two
//! channels exist side by side:
//!
//! - **Job messages**: operator-facing diagnostics ("Socket is closed",
//!   "Unable to connect to ...") tagged with a [`MessageType`] severity and
//!   delivered to a [`JobMessageSink`]. Daemons route these into their job
//!   reports; tests capture them with a [`CollectingSink`].
//! - **Traces**: developer diagnostics emitted through [`tracing`] under
//!   per-subsystem targets (see [`trace_net!`], [`trace_connect!`],
//!   [`trace_auth!`], [`trace_limit!`] and [`trace_frame!`]).
//!
//! # Design
//!
//! Connections hold a [`SharedSink`] so a single sink instance can be shared
//! by a master connection and its duplicates. The default sink,
//! [`TracingSink`], forwards job messages to `tracing` under the
//! `bnet::jobmsg` target with a level derived from the severity, which keeps
//! library users free of any bespoke logging backend.
//!
//! # Invariants
//!
//! - Sinks never block on I/O owned by the transport; they must be callable
//!   while a connection holds its write lock.
//! - [`CollectingSink`] preserves emission order.
//!
//! # Examples
//!
//! ```
//! use logging::{CollectingSink, JobMessageSink, MessageType};
//!
//! let sink = CollectingSink::new();
//! sink.emit(MessageType::Warning, "Cannot set SO_KEEPALIVE on socket");
//! let drained = sink.drain();
//! assert_eq!(drained.len(), 1);
//! assert_eq!(drained[0].kind, MessageType::Warning);
//! ```
//!
//! # See also
//!
//! - [`init_tracing`] for installing a subscriber in binaries and tests.

mod message_type;
mod sink;
mod subscriber;
mod tracing_macros;

pub use message_type::MessageType;
pub use sink::{
    CollectingSink, JobMessage, JobMessageSink, SharedSink, TracingSink, default_sink,
};
pub use subscriber::{LOG_ENV_VAR, init_tracing, try_init_tracing};
