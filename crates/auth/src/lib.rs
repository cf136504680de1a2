#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Authentication for bnet connections. Both ends share a password and
//! prove it with a CRAM-MD5 exchange in each direction ([`CramMd5`]). TLS
//! needs are advertised along the way; when both sides can speak
//! certificate or pre-shared-key TLS, the transport is upgraded through a
//! [`bsock::TlsEngine`].
//!
//! [`Authenticator`] runs the daemon-to-daemon flows and reports failures to
//! the connection's job sink. [`authenticate_director`] is the shorter login
//! used by consoles.
//!
//! # Examples
//!
//! ```
//! use auth::{TlsRequirement, test_tls_requirement};
//! use protocol::{TlsNeed, TlsPskNeed};
//!
//! let local = TlsPskNeed::new(TlsNeed::Required, TlsNeed::None);
//! let remote = TlsPskNeed::new(TlsNeed::None, TlsNeed::Ok);
//! assert_eq!(test_tls_requirement(local, remote), TlsRequirement::ErrLocal);
//! ```

mod class;
mod cram;
mod director;
mod error;
mod session;
mod tls;

pub use class::{DaemonClass, DaemonRole};
pub use cram::{
    AUTH_FAILED, AUTH_OK, CramMd5, DEFAULT_FAILURE_DELAY, PeerChallenge, RESPONSE_WAIT,
    digest_response, make_challenge, parse_challenge,
};
pub use director::{DirectorLogin, HELLO_TIMEOUT, OK_HELLO, authenticate_director, bash_spaces};
pub use error::AuthError;
pub use session::{AUTH_TIMEOUT, AuthConfig, Authenticator, parse_starttls};
pub use tls::{
    TlsChannel, TlsRequirement, TlsSettings, shared_channel, test_single_requirement,
    test_tls_requirement,
};
