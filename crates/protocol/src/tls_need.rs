use core::fmt;

/// How strongly one side wants an encrypted channel.
///
/// Ordering matters: the authentication code compares the levels of both
/// peers, so `None < Ok < Required`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(i32)]
pub enum TlsNeed {
    #[doc(alias = "BNET_TLS_NONE")]
    /// Cannot do TLS.
    #[default]
    None = 0,
    #[doc(alias = "BNET_TLS_OK")]
    /// Can do TLS but not required.
    Ok = 1,
    #[doc(alias = "BNET_TLS_REQUIRED")]
    /// TLS is required.
    Required = 2,
}

impl TlsNeed {
    /// Returns the numeric level advertised on the wire.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps an advertised level. Out-of-range values are clamped so a
    /// misbehaving peer is treated as not speaking TLS or as requiring it.
    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        match value {
            i32::MIN..=0 => Self::None,
            1 => Self::Ok,
            _ => Self::Required,
        }
    }

    /// Reports whether this side can run a handshake at all.
    #[must_use]
    pub const fn can_tls(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for TlsNeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Ok => "ok",
            Self::Required => "required",
        })
    }
}

/// Combined certificate-TLS and pre-shared-key TLS needs.
///
/// On the wire both travel as one integer, `tls + psk * 100`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct TlsPskNeed {
    /// Certificate based TLS level.
    pub tls: TlsNeed,
    /// Pre-shared key TLS level.
    pub psk: TlsNeed,
}

impl TlsPskNeed {
    /// Creates a combined need.
    #[must_use]
    pub const fn new(tls: TlsNeed, psk: TlsNeed) -> Self {
        Self { tls, psk }
    }

    /// Encodes as `tls + psk * 100`.
    #[must_use]
    pub const fn encode(self) -> i32 {
        self.tls.as_i32() + self.psk.as_i32() * 100
    }

    /// Decodes the combined integer.
    #[must_use]
    pub const fn decode(value: i32) -> Self {
        Self {
            tls: TlsNeed::from_i32(value % 100),
            psk: TlsNeed::from_i32(value / 100),
        }
    }

    /// Reports whether either axis is required.
    #[must_use]
    pub const fn requires_any(self) -> bool {
        matches!(self.tls, TlsNeed::Required) || matches!(self.psk, TlsNeed::Required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(TlsNeed::None < TlsNeed::Ok);
        assert!(TlsNeed::Ok < TlsNeed::Required);
    }

    #[test]
    fn combined_encoding_matches_wire_values() {
        let need = TlsPskNeed::new(TlsNeed::Ok, TlsNeed::Required);
        assert_eq!(need.encode(), 201);
        assert_eq!(TlsPskNeed::decode(201), need);
        assert_eq!(TlsPskNeed::decode(2), TlsPskNeed::new(TlsNeed::Required, TlsNeed::None));
    }

    #[test]
    fn out_of_range_levels_clamp() {
        assert_eq!(TlsNeed::from_i32(-3), TlsNeed::None);
        assert_eq!(TlsNeed::from_i32(7), TlsNeed::Required);
    }

    #[test]
    fn requires_any_checks_both_axes() {
        assert!(TlsPskNeed::new(TlsNeed::None, TlsNeed::Required).requires_any());
        assert!(!TlsPskNeed::new(TlsNeed::Ok, TlsNeed::Ok).requires_any());
    }
}
