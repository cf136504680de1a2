#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `bnet` is the network layer backup daemons use to talk to each other:
//! framed messages and signals over TCP, comm-line compression, bandwidth
//! limiting, spooling, and password plus TLS authentication.
//!
//! The work is split across workspace crates and re-exported here:
//!
//! - [`protocol`]: frame headers, flags, signals and the spool format.
//! - [`compress`]: LZ4 comm-line compression.
//! - [`bandwidth`]: the writer-side rate limiter and speed parser.
//! - [`bsock`]: connections, duplicates, connect/retry and the meeting point.
//! - [`auth`]: CRAM-MD5 and TLS negotiation.
//! - [`logging`]: job message sinks and tracing setup.
//!
//! # Examples
//!
//! ```no_run
//! use bnet::bsock::{Bsock, BsockOptions, ConnectConfig};
//! use bnet::auth::authenticate_director;
//!
//! bnet::logging::init_tracing("info");
//! let mut dir = Bsock::connect(
//!     &ConnectConfig::new(),
//!     "Director daemon",
//!     "bacula-dir.example",
//!     9101,
//!     BsockOptions::new(),
//! )?;
//! let greeting = authenticate_director(&mut dir, "console", "secret", None)?;
//! println!("{greeting}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use auth;
pub use bandwidth;
pub use bsock;
pub use compress;
pub use logging;
pub use protocol;

pub use auth::{AuthConfig, AuthError, Authenticator, authenticate_director};
pub use bsock::{Bsock, BsockError, BsockOptions, ConnectConfig, Connection, RecvResult};
pub use protocol::{FrameFlags, Signal};
