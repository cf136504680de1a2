//! CRAM-MD5 challenge and response.
//!
//! The challenger sends `auth cram-md5c <challenge> ssl=<need>` and expects
//! the base64 encoded HMAC-MD5 of the challenge keyed with the shared
//! password. Both sides run the exchange once in each direction, so each
//! proves knowledge of the password without sending it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use bsock::{Connection, RecvResult, WaitStatus};
use hmac::{Hmac, Mac};
use logging::trace_auth;
use md5::{Digest, Md5};
use protocol::TlsNeed;

use crate::error::AuthError;

type HmacMd5 = Hmac<Md5>;

/// Reply to a correct response.
pub const AUTH_OK: &str = "1000 OK auth\n";

/// Reply to a wrong response.
pub const AUTH_FAILED: &str = "1999 Authorization failed.\n";

/// How long the challenger waits for the response.
pub const RESPONSE_WAIT: Duration = Duration::from_secs(180);

/// Pause after a failed exchange, slowing down password guessing.
pub const DEFAULT_FAILURE_DELAY: Duration = Duration::from_secs(5);

/// A challenge as read by the responder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerChallenge {
    /// The challenge string, angle brackets included.
    pub challenge: String,
    /// TLS need the challenger advertised.
    pub remote_need: TlsNeed,
    /// The challenger used the `cram-md5c` form.
    pub compatible: bool,
}

/// Parses an `auth cram-md5[c] <challenge> [ssl=<n>]` line.
#[must_use]
pub fn parse_challenge(line: &str) -> Option<PeerChallenge> {
    let mut words = line.split_ascii_whitespace();
    if words.next()? != "auth" {
        return None;
    }
    let compatible = match words.next()? {
        "cram-md5c" => true,
        "cram-md5" => false,
        _ => return None,
    };
    let challenge = words.next()?.to_owned();
    let remote_need = match words.next() {
        Some(word) => {
            let level = word.strip_prefix("ssl=")?.parse::<i32>().ok()?;
            TlsNeed::from_i32(level)
        }
        None if !compatible => TlsNeed::None,
        None => return None,
    };
    Some(PeerChallenge {
        challenge,
        remote_need,
        compatible,
    })
}

/// Base64 HMAC-MD5 of `challenge` keyed with `password`.
pub fn digest_response(password: &str, challenge: &str) -> Result<String, AuthError> {
    let mut mac =
        HmacMd5::new_from_slice(password.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(challenge.as_bytes());
    Ok(STANDARD_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Builds a fresh `<random.time@host>` challenge.
///
/// Whitespace in `host` is bashed so the challenge stays a single word on
/// the `auth` line.
#[must_use]
pub fn make_challenge(host: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let mut hasher = Md5::new();
    hasher.update(now.as_nanos().to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(host.as_bytes());
    let digest = hasher.finalize();
    let random = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let host: String = host
        .chars()
        .map(|c| if c.is_ascii_whitespace() { '\u{1}' } else { c })
        .collect();

    format!("<{random}.{}@{host}>", now.as_secs())
}

/// One side of the CRAM-MD5 exchange.
#[derive(Clone, Copy, Debug)]
pub struct CramMd5<'a> {
    password: &'a str,
    local_name: &'a str,
    failure_delay: Duration,
}

impl<'a> CramMd5<'a> {
    /// Creates an exchange keyed with `password`. `local_name` appears in
    /// our challenges.
    #[must_use]
    pub const fn new(password: &'a str, local_name: &'a str) -> Self {
        Self {
            password,
            local_name,
            failure_delay: DEFAULT_FAILURE_DELAY,
        }
    }

    /// Sets the pause after a failed exchange.
    #[must_use]
    pub const fn failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Challenges the peer and checks its response.
    ///
    /// The peer learns the verdict: `1000 OK auth` or
    /// `1999 Authorization failed.`.
    pub fn challenge(
        &self,
        conn: &mut Connection,
        local_need: TlsNeed,
        compatible: bool,
    ) -> Result<(), AuthError> {
        let challenge = make_challenge(self.local_name);
        let verb = if compatible { "cram-md5c" } else { "cram-md5" };
        trace_auth!(peer = %conn.peer(), %challenge, "sending challenge");
        conn.fsend(format_args!(
            "auth {verb} {challenge} ssl={}\n",
            local_need.as_i32()
        ))?;

        if conn.wait_data(RESPONSE_WAIT) != WaitStatus::Ready || !conn.recv().is_message() {
            let err = self.no_response(conn);
            self.pause();
            return Err(err);
        }

        let expected = digest_response(self.password, &challenge)?;
        let received = conn.msg_text();
        let received = received.trim_end_matches(['\0', '\n', '\r']);
        if received == expected {
            conn.fsend(format_args!("{AUTH_OK}"))?;
            trace_auth!(peer = %conn.peer(), "challenge answered");
            Ok(())
        } else {
            trace_auth!(peer = %conn.peer(), "challenge response mismatch");
            conn.fsend(format_args!("{AUTH_FAILED}"))?;
            self.pause();
            Err(AuthError::BadResponse {
                peer: conn.peer().to_string(),
            })
        }
    }

    /// Answers the peer's challenge.
    ///
    /// With `already_received` the challenge line is taken from the current
    /// message instead of being read first.
    pub fn respond(
        &self,
        conn: &mut Connection,
        already_received: bool,
    ) -> Result<PeerChallenge, AuthError> {
        if !already_received && !conn.recv().is_message() {
            let err = self.no_response(conn);
            self.pause();
            return Err(err);
        }

        let line = conn.msg_text().into_owned();
        let Some(peer) = parse_challenge(&line) else {
            trace_auth!(peer = %conn.peer(), line = %line.trim_end(), "cannot scan challenge");
            conn.fsend(format_args!("{AUTH_FAILED}"))?;
            self.pause();
            return Err(AuthError::BadChallenge {
                line: line.trim_end().to_owned(),
            });
        };

        let mut answer = digest_response(self.password, &peer.challenge)?.into_bytes();
        answer.push(0);
        conn.set_msg(&answer);
        conn.send()?;

        if !conn.recv().is_message() {
            let err = self.no_response(conn);
            self.pause();
            return Err(err);
        }
        if conn.msg_text() == AUTH_OK {
            trace_auth!(peer = %conn.peer(), "response accepted");
            return Ok(peer);
        }

        let reply = conn.msg_text().trim_end().to_owned();
        self.pause();
        Err(AuthError::Rejected {
            peer: conn.peer().to_string(),
            reply,
        })
    }

    fn no_response(&self, conn: &Connection) -> AuthError {
        AuthError::NoResponse {
            peer: conn.peer().to_string(),
            err: conn.bstrerror(),
        }
    }

    fn pause(&self) {
        if !self.failure_delay.is_zero() {
            thread::sleep(self.failure_delay);
        }
    }
}
