//! TLS requirement negotiation.
//!
//! Each side advertises how much it wants certificate TLS and pre-shared-key
//! TLS. A connection can go ahead when both sides share a channel they can
//! speak, or when neither side requires encryption.

use protocol::{TlsNeed, TlsPskNeed};

/// Outcome of comparing local and remote TLS needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsRequirement {
    /// The requirements can be met.
    Ok,
    /// The local side requires something the remote cannot offer.
    ErrLocal,
    /// The remote side requires something the local side cannot offer.
    ErrRemote,
}

/// TLS settings of a daemon resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TlsSettings {
    /// Certificate TLS is configured.
    pub tls_enable: bool,
    /// Encryption is mandatory.
    pub tls_require: bool,
    /// TLS is used for the handshake only and dropped afterwards.
    pub tls_authenticate: bool,
    /// Pre-shared-key TLS is enabled.
    pub psk_enable: bool,
    /// A pre-shared-key context could be built.
    pub psk_available: bool,
}

impl TlsSettings {
    /// Local needs derived from the settings.
    ///
    /// | tls enable | require | psk enable | result            |
    /// |------------|---------|------------|-------------------|
    /// | n          | n       | n          | clear text        |
    /// | n          | n       | y          | PSK welcome       |
    /// | n          | y       | y          | PSK required      |
    /// | y          | n       | n          | TLS welcome       |
    /// | y          | n       | y          | TLS and PSK welcome |
    /// | y          | y       | n          | TLS required      |
    /// | y          | y       | y          | TLS or PSK required |
    ///
    /// PSK is only welcome when a PSK context is available.
    #[must_use]
    pub const fn local_need(&self) -> TlsPskNeed {
        let tls = match (self.tls_enable, self.tls_require) {
            (false, _) => TlsNeed::None,
            (true, false) => TlsNeed::Ok,
            (true, true) => TlsNeed::Required,
        };
        let psk = match (self.psk_enable, self.tls_require, self.psk_available) {
            (false, _, _) => TlsNeed::None,
            (true, true, _) => TlsNeed::Required,
            (true, false, true) => TlsNeed::Ok,
            (true, false, false) => TlsNeed::None,
        };
        TlsPskNeed::new(tls, psk)
    }
}

/// Compares two-axis needs.
///
/// When a channel both sides can speak exists, the connection proceeds.
/// Otherwise it proceeds in clear text unless one side requires encryption;
/// a local requirement is reported before a remote one.
#[must_use]
pub const fn test_tls_requirement(local: TlsPskNeed, remote: TlsPskNeed) -> TlsRequirement {
    if shared_channel(local, remote).is_some() {
        return TlsRequirement::Ok;
    }
    if local.requires_any() {
        TlsRequirement::ErrLocal
    } else if remote.requires_any() {
        TlsRequirement::ErrRemote
    } else {
        TlsRequirement::Ok
    }
}

/// Compares single-axis needs, as used by daemons that only know
/// certificate TLS.
#[must_use]
pub fn test_single_requirement(local: TlsNeed, remote: TlsNeed) -> TlsRequirement {
    if local == TlsNeed::Ok || remote == TlsNeed::Ok {
        TlsRequirement::Ok
    } else if remote < local {
        TlsRequirement::ErrLocal
    } else if remote > local {
        TlsRequirement::ErrRemote
    } else {
        TlsRequirement::Ok
    }
}

/// Channel to run a handshake on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsChannel {
    /// Certificate TLS.
    Certificate,
    /// Pre-shared-key TLS.
    PreSharedKey,
}

/// Picks the channel both sides can speak, preferring certificate TLS.
#[must_use]
pub const fn shared_channel(local: TlsPskNeed, remote: TlsPskNeed) -> Option<TlsChannel> {
    if local.tls.can_tls() && remote.tls.can_tls() {
        Some(TlsChannel::Certificate)
    } else if local.psk.can_tls() && remote.psk.can_tls() {
        Some(TlsChannel::PreSharedKey)
    } else {
        None
    }
}
