use std::fmt;

/// Who is on the other end of a connection, as shown in diagnostics.
///
/// Displays as `who:host:port`, the form every transport message uses.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct PeerIdentity {
    /// Name of the remote daemon or role ("Director daemon", "client", ...).
    pub who: String,
    /// Host name or address as given by the caller.
    pub host: String,
    /// Remote port.
    pub port: u16,
}

impl PeerIdentity {
    /// Creates an identity.
    pub fn new(who: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            who: who.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.who, self.host, self.port)
    }
}
