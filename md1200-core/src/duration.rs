//! Duration strings
//!
//! Unit-suffixed durations as written in config files and environment
//! variables: `200ms`, `30s`, `1m30s`, `1h`. Parsing and formatting are
//! delegated to `humantime`; this module maps failures onto
//! [`Md1200Error::Config`].

use crate::{Md1200Error, Result};
use std::time::Duration;

/// Parse a duration such as `"1m30s"`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use md1200_core::parse_duration;
///
/// assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    humantime::parse_duration(s)
        .map_err(|e| Md1200Error::Config(format!("Invalid duration '{}': {}", input, e)))
}

/// Render a duration in a form [`parse_duration`] reads back unchanged.
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}
