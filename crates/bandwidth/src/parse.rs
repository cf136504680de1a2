use std::num::NonZeroU64;

use memchr::memchr;

/// Errors returned when a speed setting cannot be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BandwidthParseError {
    /// The text is not a number optionally followed by a speed unit.
    #[error("expected a speed number, got an unparsable value")]
    Invalid,
    /// The unit is not one of `k/s`, `kb/s`, `m/s` or `mb/s`.
    #[error("unknown speed unit")]
    UnknownUnit,
    /// The value is zero, which would disable throttling.
    #[error("speed must be greater than zero")]
    Zero,
    /// The value overflows 64 bits.
    #[error("speed is too large")]
    TooLarge,
}

/// Unit suffixes and their multipliers. Binary multiples use the short form.
const UNITS: [(&str, u64); 5] = [
    ("b/s", 1),
    ("k/s", 1_024),
    ("kb/s", 1_000),
    ("m/s", 1_048_576),
    ("mb/s", 1_000_000),
];

/// Parses a speed such as `"500"`, `"100 kb/s"`, `"5k/s"` or `"1.5 MB/s"`
/// into bytes per second.
///
/// A bare number is bytes per second. Units are case-insensitive and may be
/// separated from the number by whitespace.
pub fn parse_bandwidth_limit(text: &str) -> Result<NonZeroU64, BandwidthParseError> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if number.is_empty() {
        return Err(BandwidthParseError::Invalid);
    }

    let multiplier = unit_multiplier(unit.trim_start())?;
    let value = scale(number, multiplier)?;
    NonZeroU64::new(value).ok_or(BandwidthParseError::Zero)
}

fn unit_multiplier(unit: &str) -> Result<u64, BandwidthParseError> {
    if unit.is_empty() {
        return Ok(1);
    }
    if memchr(b'/', unit.as_bytes()).is_none() {
        return Err(BandwidthParseError::UnknownUnit);
    }
    let lowered = unit.to_ascii_lowercase();
    UNITS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, multiplier)| *multiplier)
        .ok_or(BandwidthParseError::UnknownUnit)
}

fn scale(number: &str, multiplier: u64) -> Result<u64, BandwidthParseError> {
    let (whole, fraction) = match memchr(b'.', number.as_bytes()) {
        Some(dot) => (&number[..dot], &number[dot + 1..]),
        None => (number, ""),
    };
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(BandwidthParseError::Invalid);
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| BandwidthParseError::TooLarge)?
    };
    let mut value = whole
        .checked_mul(multiplier)
        .ok_or(BandwidthParseError::TooLarge)?;

    if !fraction.is_empty() {
        let digits = fraction.len().min(9) as u32;
        let fraction: u64 = fraction[..digits as usize]
            .parse()
            .map_err(|_| BandwidthParseError::Invalid)?;
        let scaled = u128::from(fraction) * u128::from(multiplier) / 10u128.pow(digits);
        value = value
            .checked_add(u64::try_from(scaled).map_err(|_| BandwidthParseError::TooLarge)?)
            .ok_or(BandwidthParseError::TooLarge)?;
    }
    Ok(value)
}
