//! Client side of the Director handshake used by consoles and monitors.

use std::time::Duration;

use bsock::{Connection, TlsEngine, TlsRole};
use logging::trace_auth;
use protocol::TlsNeed;

use crate::cram::{CramMd5, DEFAULT_FAILURE_DELAY};
use crate::error::AuthError;
use crate::tls::{TlsRequirement, test_single_requirement};

/// Deadline for the whole Hello exchange.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(15);

/// Prefix of the Director's greeting after a successful login.
pub const OK_HELLO: &str = "1000 OK:";

/// Replaces spaces so a name travels as a single word.
#[must_use]
pub fn bash_spaces(name: &str) -> String {
    name.replace(' ', "\u{1}")
}

/// Logs in to a Director.
///
/// Returns the Director's greeting on success.
pub fn authenticate_director(
    conn: &mut Connection,
    name: &str,
    password: &str,
    engine: Option<&dyn TlsEngine>,
) -> Result<String, AuthError> {
    DirectorLogin::new(name, password)
        .tls_engine(engine)
        .authenticate(conn)
}

/// Parameters of a Director login.
#[derive(Clone, Copy)]
pub struct DirectorLogin<'a> {
    name: &'a str,
    password: &'a str,
    engine: Option<&'a dyn TlsEngine>,
    failure_delay: Duration,
}

impl<'a> DirectorLogin<'a> {
    /// Logs in as `name` with `password`, without TLS.
    #[must_use]
    pub const fn new(name: &'a str, password: &'a str) -> Self {
        Self {
            name,
            password,
            engine: None,
            failure_delay: DEFAULT_FAILURE_DELAY,
        }
    }

    /// Uses `engine` for TLS. A configured engine makes TLS mandatory.
    #[must_use]
    pub const fn tls_engine(mut self, engine: Option<&'a dyn TlsEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the pause after a failed challenge exchange.
    #[must_use]
    pub const fn failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Runs the login on `conn` under [`HELLO_TIMEOUT`].
    ///
    /// The connection stays open on failure.
    pub fn authenticate(&self, conn: &mut Connection) -> Result<String, AuthError> {
        conn.start_timer(HELLO_TIMEOUT);
        let outcome = self
            .handshake(conn)
            .map_err(|source| AuthError::DirectorBailOut {
                host: conn.host().to_owned(),
                port: conn.port(),
                source: Box::new(source),
            })
            .and_then(|()| read_greeting(conn));
        conn.stop_timer();
        outcome
    }

    fn handshake(&self, conn: &mut Connection) -> Result<(), AuthError> {
        conn.fsend(format_args!("Hello {} calling\n", bash_spaces(self.name)))?;

        let local_need = if self.engine.is_some() {
            TlsNeed::Required
        } else {
            TlsNeed::None
        };

        let cram = CramMd5::new(self.password, self.name).failure_delay(self.failure_delay);
        let remote_need = cram
            .respond(conn, false)
            .and_then(|peer| {
                cram.challenge(conn, local_need, peer.compatible)?;
                Ok(peer.remote_need)
            })
            .map_err(|source| AuthError::DirectorAuthorization {
                host: conn.host().to_owned(),
                port: conn.port(),
                source: Box::new(source),
            })?;
        trace_auth!(peer = %conn.peer(), %local_need, %remote_need, "director challenge complete");

        match test_single_requirement(local_need, remote_need) {
            TlsRequirement::ErrLocal => {
                return Err(AuthError::DirectorTlsMissing {
                    host: conn.host().to_owned(),
                    port: conn.port(),
                });
            }
            TlsRequirement::ErrRemote => {
                return Err(AuthError::DirectorRequiresTls {
                    host: conn.host().to_owned(),
                    port: conn.port(),
                });
            }
            TlsRequirement::Ok => {}
        }

        if let Some(engine) = self.engine {
            if local_need.can_tls() && remote_need.can_tls() {
                let host = conn.host().to_owned();
                conn.replace_transport(|transport| {
                    engine.handshake(transport, TlsRole::Client, &host)
                })
                .map_err(|source| AuthError::TlsNegotiation {
                    name: "Director".to_owned(),
                    host,
                    port: conn.port(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DirectorLogin<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorLogin")
            .field("name", &self.name)
            .field("tls", &self.engine.is_some())
            .field("failure_delay", &self.failure_delay)
            .finish_non_exhaustive()
    }
}

fn read_greeting(conn: &mut Connection) -> Result<String, AuthError> {
    if !conn.recv().is_message() {
        return Err(AuthError::BadHello {
            err: conn.bstrerror(),
            host: conn.host().to_owned(),
            port: conn.port(),
        });
    }
    let greeting = conn.msg_text().into_owned();
    trace_auth!(peer = %conn.peer(), greeting = %greeting.trim_end(), "director greeting");
    if greeting.starts_with(OK_HELLO) {
        Ok(greeting)
    } else {
        Err(AuthError::HelloRejected {
            host: conn.host().to_owned(),
            port: conn.port(),
            reply: greeting,
        })
    }
}
