//! Target time parsing for the command line
//!
//! Accepts `now`, an RFC 3339 timestamp, or a span such as `+36h` or `2d12h30m`
//! counted from a reference time (the colony's install time).

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

/// Resolve `spec` to an absolute time
pub fn parse_until(spec: &str, from: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(spec) {
        return Ok(at.with_timezone(&Utc));
    }
    Ok(from + parse_span(spec)?)
}

/// Parse a span made of `<n>d`, `<n>h`, `<n>m` and `<n>s` parts
pub fn parse_span(spec: &str) -> Result<Duration> {
    let body = spec.strip_prefix('+').unwrap_or(spec);
    let whole_re = Regex::new(r"^(?:\d+[dhms])+$")?;
    if !whole_re.is_match(body) {
        return Err(anyhow!(
            "unrecognized time '{}': expected 'now', RFC 3339 or a span like +36h",
            spec
        ));
    }

    let part_re = Regex::new(r"(\d+)([dhms])")?;
    let mut seconds: i64 = 0;
    for cap in part_re.captures_iter(body) {
        let value: i64 = cap[1].parse()?;
        let unit = match &cap[2] {
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        seconds = value
            .checked_mul(unit)
            .and_then(|s| seconds.checked_add(s))
            .ok_or_else(|| anyhow!("time span '{}' is too large", spec))?;
    }
    Ok(Duration::seconds(seconds))
}
