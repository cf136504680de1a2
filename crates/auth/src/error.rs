use bsock::BsockError;

use crate::class::DaemonClass;

/// Failures of the authentication handshake.
///
/// Display strings match the diagnostics daemons print for the same
/// failure. The connection is left open; tearing it down is up to the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Sending a handshake line failed.
    #[error(transparent)]
    Transport(#[from] BsockError),

    /// The peer went away or sent nothing before the deadline.
    #[error("Bnet receive error waiting for authentication from {peer}: ERR={err}")]
    NoResponse {
        /// Remote end.
        peer: String,
        /// Connection error text.
        err: String,
    },

    /// The challenge line could not be parsed.
    #[error("Cannot scan challenge: {line}")]
    BadChallenge {
        /// The line as received.
        line: String,
    },

    /// The peer's answer to our challenge did not match.
    #[error("Incorrect response to challenge from {peer}")]
    BadResponse {
        /// Remote end.
        peer: String,
    },

    /// The peer rejected our answer to its challenge.
    #[error("Authorization rejected by {peer}: {reply}")]
    Rejected {
        /// Remote end.
        peer: String,
        /// The peer's reply, trimmed.
        reply: String,
    },

    /// The owning job was canceled during the handshake.
    #[error("job canceled during authentication")]
    Canceled,

    /// The key could not be used for the keyed hash.
    #[error("invalid CRAM-MD5 key")]
    InvalidKey,

    /// The TLS requirements of both sides cannot be met together.
    #[error("Authorization problem: {class} \"{who}:{host}\" did not advertise required TLS support.")]
    TlsRequirement {
        /// Class of the remote daemon.
        class: DaemonClass,
        /// Remote daemon name.
        who: String,
        /// Remote host.
        host: String,
    },

    /// The TLS handshake failed.
    #[error("TLS negotiation failed with {name} at \"{host}:{port}\"")]
    TlsNegotiation {
        /// Remote daemon kind as shown to the user.
        name: String,
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
        /// Handshake failure.
        #[source]
        source: std::io::Error,
    },

    /// The Director's challenge/response exchange failed.
    #[error("Director authorization error at \"{host}:{port}\"")]
    DirectorAuthorization {
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
        /// Underlying failure.
        #[source]
        source: Box<AuthError>,
    },

    /// TLS is required locally but the Director does not offer it.
    #[error(
        "Authorization error: Remote server at \"{host}:{port}\" did not advertise required TLS support."
    )]
    DirectorTlsMissing {
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
    },

    /// The Director requires TLS but it is not configured locally.
    #[error("Authorization error with Director at \"{host}:{port}\": Remote server requires TLS.")]
    DirectorRequiresTls {
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
    },

    /// Any Director handshake failure before the greeting, reported with
    /// the generic advice.
    #[error(
        "Authorization error with Director at \"{host}:{port}\"\nMost likely the passwords do not agree.\nIf you are using TLS, there may have been a certificate validation error during the TLS handshake."
    )]
    DirectorBailOut {
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
        /// The specific failure.
        #[source]
        source: Box<AuthError>,
    },

    /// No greeting arrived after authentication.
    #[error("Bad errmsg to Hello command: ERR={err}\nThe Director at \"{host}:{port}\" may not be running.")]
    BadHello {
        /// Connection error text.
        err: String,
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
    },

    /// The greeting did not start with the success prefix.
    #[error("Director at \"{host}:{port}\" rejected Hello command")]
    HelloRejected {
        /// Director host.
        host: String,
        /// Director port.
        port: u16,
        /// The greeting as received.
        reply: String,
    },
}

impl AuthError {
    /// The failure that caused a wrapped Director error.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::DirectorAuthorization { source, .. } | Self::DirectorBailOut { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bail_out_names_host_and_advice() {
        let err = AuthError::DirectorBailOut {
            host: "dir.example".into(),
            port: 9101,
            source: Box::new(AuthError::DirectorRequiresTls {
                host: "dir.example".into(),
                port: 9101,
            }),
        };
        let text = err.to_string();
        assert!(text.contains("\"dir.example:9101\""));
        assert!(text.contains("Most likely the passwords do not agree"));
        assert!(matches!(err.root_cause(), AuthError::DirectorRequiresTls { .. }));
    }

    #[test]
    fn tls_requirement_names_remote_class() {
        let err = AuthError::TlsRequirement {
            class: DaemonClass::StorageDaemon,
            who: "sd".into(),
            host: "10.0.0.2".into(),
        };
        assert_eq!(
            err.to_string(),
            "Authorization problem: SD \"sd:10.0.0.2\" did not advertise required TLS support."
        );
    }
}
