//! Daemon-to-daemon authentication.
//!
//! The server side optionally announces `starttls` first, challenges the
//! client, then answers the client's challenge. The client side mirrors it.
//! TLS starts as soon as both sides know each other's needs, so the
//! password exchange normally runs encrypted.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bsock::{Connection, TlsEngine, TlsRole};
use logging::{MessageType, trace_auth};
use protocol::TlsPskNeed;

use crate::class::{DaemonClass, DaemonRole};
use crate::cram::{CramMd5, DEFAULT_FAILURE_DELAY};
use crate::error::AuthError;
use crate::tls::{TlsChannel, TlsRequirement, TlsSettings, shared_channel, test_tls_requirement};

/// Default deadline for a whole authentication exchange.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// What one daemon knows before authenticating a connection.
#[derive(Clone)]
pub struct AuthConfig {
    /// Which side of the connection this daemon is.
    pub role: DaemonRole,
    /// Kind of this daemon.
    pub local_class: DaemonClass,
    /// Kind of the remote daemon.
    pub remote_class: DaemonClass,
    /// Name used in our challenges.
    pub local_name: String,
    /// Shared secret.
    pub password: String,
    /// TLS settings of the resource.
    pub tls: TlsSettings,
    /// Engine for certificate TLS.
    pub tls_engine: Option<Arc<dyn TlsEngine>>,
    /// Engine for pre-shared-key TLS.
    pub psk_engine: Option<Arc<dyn TlsEngine>>,
    /// Deadline for the whole exchange.
    pub timeout: Duration,
    /// Pause after a failed exchange.
    pub failure_delay: Duration,
}

impl AuthConfig {
    /// Creates a configuration without TLS.
    pub fn new(
        role: DaemonRole,
        local_class: DaemonClass,
        remote_class: DaemonClass,
        local_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            role,
            local_class,
            remote_class,
            local_name: local_name.into(),
            password: password.into(),
            tls: TlsSettings::default(),
            tls_engine: None,
            psk_engine: None,
            timeout: AUTH_TIMEOUT,
            failure_delay: DEFAULT_FAILURE_DELAY,
        }
    }

    /// Sets the TLS settings.
    pub fn tls(mut self, settings: TlsSettings) -> Self {
        self.tls = settings;
        self
    }

    /// Sets the certificate TLS engine.
    pub fn tls_engine(mut self, engine: Arc<dyn TlsEngine>) -> Self {
        self.tls_engine = Some(engine);
        self
    }

    /// Sets the pre-shared-key TLS engine.
    pub fn psk_engine(mut self, engine: Arc<dyn TlsEngine>) -> Self {
        self.psk_engine = Some(engine);
        self
    }

    /// Sets the exchange deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pause after a failed exchange.
    pub fn failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Local needs, with PSK counted as available when a PSK engine is set.
    pub fn local_need(&self) -> TlsPskNeed {
        let mut settings = self.tls;
        settings.psk_available |= self.psk_engine.is_some();
        settings.local_need()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("role", &self.role)
            .field("local_class", &self.local_class)
            .field("remote_class", &self.remote_class)
            .field("local_name", &self.local_name)
            .field("tls", &self.tls)
            .field("tls_engine", &self.tls_engine.is_some())
            .field("psk_engine", &self.psk_engine.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// One authentication exchange on a connection.
///
/// The connection timer bounds the exchange from [`Authenticator::new`]
/// until the authenticator is dropped.
pub struct Authenticator<'a> {
    conn: &'a mut Connection,
    config: &'a AuthConfig,
    local: TlsPskNeed,
    remote: TlsPskNeed,
    tls_started: bool,
    challenge_pending: bool,
}

impl<'a> Authenticator<'a> {
    /// Starts the authentication timer on `conn`.
    pub fn new(conn: &'a mut Connection, config: &'a AuthConfig) -> Self {
        conn.start_timer(config.timeout);
        let local = config.local_need();
        trace_auth!(peer = %conn.peer(), local_need = local.encode(), "authentication started");
        Self {
            conn,
            config,
            local,
            remote: TlsPskNeed::default(),
            tls_started: false,
            challenge_pending: false,
        }
    }

    /// Records the needs the peer announced in its hello, encoded as
    /// `tls + psk * 100`.
    pub fn decode_remote_need(&mut self, encoded: i32) {
        self.remote = TlsPskNeed::decode(encoded);
        trace_auth!(peer = %self.conn.peer(), remote_need = encoded, "remote need");
    }

    /// Local needs.
    pub const fn local_need(&self) -> TlsPskNeed {
        self.local
    }

    /// Remote needs known so far.
    pub const fn remote_need(&self) -> TlsPskNeed {
        self.remote
    }

    /// Reports whether TLS was started during this exchange.
    pub const fn tls_started(&self) -> bool {
        self.tls_started
    }

    /// Runs the server side: optional `starttls`, our challenge, then our
    /// response.
    ///
    /// Without TLS the requirements are checked again once the exchange
    /// has revealed the peer's TLS level.
    pub fn server_authenticate(&mut self) -> Result<(), AuthError> {
        self.server_early_tls()?;
        let outcome = self.server_exchange();
        if let Err(err) = &outcome {
            trace_auth!(peer = %self.conn.peer(), error = %err, "server authentication failed");
            self.report_server_failure();
        }
        if outcome.is_ok() && !self.tls_started {
            self.check_tls_requirement()?;
        }
        self.finish_tls_authenticate()?;
        outcome
    }

    /// Runs the client side: optional `starttls`, our response, then our
    /// challenge.
    pub fn client_authenticate(&mut self) -> Result<(), AuthError> {
        self.client_early_tls()?;
        let outcome = self.client_exchange();
        if let Err(err) = &outcome {
            trace_auth!(peer = %self.conn.peer(), error = %err, "client authentication failed");
            self.report_client_failure();
        }
        if outcome.is_ok() && !self.tls_started {
            self.check_tls_requirement()?;
        }
        self.finish_tls_authenticate()?;
        outcome
    }

    fn cram(&self) -> CramMd5<'a> {
        let config = self.config;
        CramMd5::new(&config.password, &config.local_name).failure_delay(config.failure_delay)
    }

    fn server_exchange(&mut self) -> Result<(), AuthError> {
        let cram = self.cram();
        cram.challenge(self.conn, self.local.tls, true)?;
        if self.pair_is(DaemonClass::FileDaemon, DaemonClass::Director)
            && self.config.role == DaemonRole::Server
        {
            self.check_canceled()?;
        }
        let peer = cram.respond(self.conn, false)?;
        self.remote.tls = peer.remote_need;
        Ok(())
    }

    fn client_exchange(&mut self) -> Result<(), AuthError> {
        let cram = self.cram();
        let sd_to_sd = self.pair_is(DaemonClass::StorageDaemon, DaemonClass::StorageDaemon);
        if sd_to_sd || self.pair_is(DaemonClass::FileDaemon, DaemonClass::StorageDaemon) {
            self.check_canceled()?;
        }
        let peer = cram.respond(self.conn, self.challenge_pending)?;
        self.challenge_pending = false;
        self.remote.tls = peer.remote_need;
        if sd_to_sd {
            self.check_canceled()?;
        }
        cram.challenge(self.conn, self.local.tls, peer.compatible)
    }

    fn server_early_tls(&mut self) -> Result<(), AuthError> {
        if shared_channel(self.local, self.remote).is_none() {
            return Ok(());
        }
        let encoded = self.local.encode();
        if let Err(err) = self.conn.fsend(format_args!("starttls tlspsk={encoded}\n")) {
            self.conn.options().sink.emit(
                MessageType::Security,
                &format!(
                    "Connection with {}:{} starttls comm error. ERR={}",
                    self.conn.who(),
                    self.conn.host(),
                    self.conn.bstrerror()
                ),
            );
            self.pause();
            return Err(err.into());
        }
        self.handle_tls()
    }

    fn client_early_tls(&mut self) -> Result<(), AuthError> {
        if !self.conn.recv().is_message() {
            let err = AuthError::NoResponse {
                peer: self.conn.peer().to_string(),
                err: self.conn.bstrerror(),
            };
            self.pause();
            return Err(err);
        }
        let line = self.conn.msg_text().into_owned();
        match parse_starttls(&line) {
            Some(encoded) => {
                self.decode_remote_need(encoded);
                self.handle_tls()?;
                self.challenge_pending = false;
            }
            None => self.challenge_pending = true,
        }
        Ok(())
    }

    /// Checks the requirements of both sides and starts TLS when they
    /// share a channel. Runs at most once per exchange.
    fn handle_tls(&mut self) -> Result<(), AuthError> {
        if self.tls_started {
            return Ok(());
        }
        self.check_tls_requirement()?;

        let engine = match shared_channel(self.local, self.remote) {
            Some(TlsChannel::Certificate) => self.config.tls_engine.clone(),
            Some(TlsChannel::PreSharedKey) => self.config.psk_engine.clone(),
            None => None,
        };
        let Some(engine) = engine else {
            trace_auth!(peer = %self.conn.peer(), "continuing in clear text");
            return Ok(());
        };

        let role = match self.config.role {
            DaemonRole::Client => TlsRole::Client,
            DaemonRole::Server => TlsRole::Server,
        };
        let host = self.conn.host().to_owned();
        if let Err(source) = self
            .conn
            .replace_transport(|transport| engine.handshake(transport, role, &host))
        {
            let err = AuthError::TlsNegotiation {
                name: self.config.remote_class.short_name().to_owned(),
                host,
                port: self.conn.port(),
                source,
            };
            self.conn.options().sink.emit(MessageType::Fatal, &err.to_string());
            return Err(err);
        }
        self.tls_started = true;
        trace_auth!(peer = %self.conn.peer(), "TLS started");
        Ok(())
    }

    fn check_tls_requirement(&self) -> Result<(), AuthError> {
        if test_tls_requirement(self.local, self.remote) == TlsRequirement::Ok {
            return Ok(());
        }
        let kind = if self.pair_is(DaemonClass::Director, DaemonClass::Console) {
            MessageType::Security
        } else {
            MessageType::Fatal
        };
        let err = AuthError::TlsRequirement {
            class: self.config.remote_class,
            who: self.conn.who().to_owned(),
            host: self.conn.host().to_owned(),
        };
        self.conn.options().sink.emit(kind, &err.to_string());
        Err(err)
    }

    fn finish_tls_authenticate(&mut self) -> Result<(), AuthError> {
        if !(self.config.tls.tls_authenticate && self.tls_started) {
            return Ok(());
        }
        let Some(engine) = self.config.tls_engine.clone() else {
            return Ok(());
        };
        self.conn
            .replace_transport(|transport| engine.downgrade(transport))
            .map_err(|err| AuthError::Transport(err.into()))?;
        self.tls_started = false;
        trace_auth!(peer = %self.conn.peer(), "TLS dropped after authentication");
        Ok(())
    }

    fn report_client_failure(&self) {
        let local = self.config.local_class;
        let remote = self.config.remote_class;
        let text = if self.is_fd_sd_pair() {
            format!(
                "Authorization key rejected by {} at {} rejected.",
                remote.long_name(),
                self.conn.who()
            )
        } else if local == DaemonClass::Director
            && matches!(remote, DaemonClass::StorageDaemon | DaemonClass::FileDaemon)
        {
            format!(
                "{} unable to authenticate with {} at \"{}:{}\". Possible causes:\n\
                 Passwords or names not the same or\n\
                 Maximum Concurrent Jobs exceeded on the {} or\n\
                 {} networking messed up (restart daemon).",
                local.long_name(),
                remote.long_name(),
                self.conn.host(),
                self.conn.port(),
                remote.short_name(),
                remote.short_name()
            )
        } else {
            return;
        };
        self.conn.options().sink.emit(MessageType::Fatal, &text);
    }

    fn report_server_failure(&self) {
        let local = self.config.local_class;
        let remote = self.config.remote_class;
        let server = self.config.role == DaemonRole::Server;
        let text = if (server && self.pair_is(DaemonClass::Director, DaemonClass::Console))
            || local == DaemonClass::Gui
        {
            return;
        } else if server && self.pair_is(DaemonClass::FileDaemon, DaemonClass::Director) {
            format!("Incorrect password given by Director at {}.", self.conn.who())
        } else if self.is_fd_sd_pair() {
            format!(
                "Incorrect authorization key from {} at {} rejected.",
                remote.long_name(),
                self.conn.who()
            )
        } else {
            format!("Incorrect password given by {}.", remote.long_name())
        };
        self.conn.options().sink.emit(MessageType::Fatal, &text);
    }

    fn pair_is(&self, local: DaemonClass, remote: DaemonClass) -> bool {
        self.config.local_class == local && self.config.remote_class == remote
    }

    fn is_fd_sd_pair(&self) -> bool {
        self.pair_is(DaemonClass::FileDaemon, DaemonClass::StorageDaemon)
            || self.pair_is(DaemonClass::StorageDaemon, DaemonClass::FileDaemon)
    }

    fn check_canceled(&self) -> Result<(), AuthError> {
        if self.conn.options().job.is_canceled() {
            Err(AuthError::Canceled)
        } else {
            Ok(())
        }
    }

    fn pause(&self) {
        if !self.config.failure_delay.is_zero() {
            thread::sleep(self.config.failure_delay);
        }
    }
}

impl Drop for Authenticator<'_> {
    fn drop(&mut self) {
        self.conn.stop_timer();
    }
}

impl fmt::Debug for Authenticator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("peer", self.conn.peer())
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("tls_started", &self.tls_started)
            .finish_non_exhaustive()
    }
}

/// Parses `starttls tlspsk=<n>`.
#[must_use]
pub fn parse_starttls(line: &str) -> Option<i32> {
    line.trim_end()
        .strip_prefix("starttls tlspsk=")?
        .parse()
        .ok()
}
