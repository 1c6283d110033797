//! Value parsers and validation helpers.

use std::time::Duration;

use crate::defaults::{MAX_READAHEAD_BYTES, MIN_POLL_INTERVAL_MS};
use crate::error::{ConfigError, ConfigResult};

const BYTE_UNITS: [(&str, u64); 9] = [
    ("b", 1),
    ("kb", 1_000),
    ("kib", 1 << 10),
    ("mb", 1_000_000),
    ("mib", 1 << 20),
    ("gb", 1_000_000_000),
    ("gib", 1 << 30),
    ("k", 1 << 10),
    ("m", 1 << 20),
];

/// Parse a byte count such as `4096`, `512kB`, or `10 MiB` (unit suffixes are case-insensitive).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for empty input, unknown units, zero, or sizes above 1 GiB.
pub fn parse_byte_size(value: &str) -> ConfigResult<u64> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(ConfigError::invalid(
            "readahead_bytes",
            value,
            "must start with a number",
        ));
    }
    let count: u64 = digits
        .parse()
        .map_err(|_| ConfigError::invalid("readahead_bytes", value, "number out of range"))?;
    let unit = unit.trim().to_ascii_lowercase();
    let multiplier = if unit.is_empty() {
        1
    } else {
        BYTE_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, multiplier)| *multiplier)
            .ok_or_else(|| ConfigError::invalid("readahead_bytes", value, "unknown size unit"))?
    };
    let bytes = count
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::invalid("readahead_bytes", value, "size overflows"))?;
    if bytes == 0 {
        return Err(ConfigError::invalid(
            "readahead_bytes",
            value,
            "must be greater than zero",
        ));
    }
    if bytes > MAX_READAHEAD_BYTES {
        return Err(ConfigError::invalid(
            "readahead_bytes",
            value,
            "must be at most 1 GiB",
        ));
    }
    Ok(bytes)
}

/// Convert a poll interval in milliseconds, enforcing the minimum.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the interval is below the minimum.
pub fn poll_interval(millis: u64) -> ConfigResult<Duration> {
    if millis < MIN_POLL_INTERVAL_MS {
        return Err(ConfigError::invalid(
            "poll_interval_ms",
            millis.to_string(),
            "must be at least 50 milliseconds",
        ));
    }
    Ok(Duration::from_millis(millis))
}

/// Ensure the log filter is non-empty.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the filter is blank.
pub fn log_level(value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid("log_level", value, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
