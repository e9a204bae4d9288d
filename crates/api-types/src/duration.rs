//! Task-duration parsing and formatting.
//!
//! The scheduling API accepts two spellings of a duration: ISO-8601
//! (`PT1H30M`) and the compact unit form (`1h30m`). The client side
//! always emits ISO-8601; the parser here accepts both so existing
//! callers keep working.

use std::time::Duration;

/// A duration string could not be interpreted.
#[derive(Debug, thiserror::Error)]
#[error("invalid duration '{input}': {reason}")]
pub struct DurationParseError {
    input: String,
    reason: String,
}

impl DurationParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a task duration from either accepted spelling.
///
/// Strings starting with `P` (or `p`) are treated as ISO-8601;
/// anything else goes through the compact unit parser, which accepts
/// forms like `1h30m`, `90m`, `45s` and the Go-style `1h0m0s`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::new(input, "empty string"));
    }

    if trimmed.starts_with('P') || trimmed.starts_with('p') {
        parse_iso8601(trimmed).map_err(|reason| DurationParseError::new(input, reason))
    } else {
        humantime::parse_duration(trimmed)
            .map_err(|e| DurationParseError::new(input, e.to_string()))
    }
}

/// Format a duration in the canonical ISO-8601 form (`PT1H30M`).
///
/// Sub-second precision is dropped; a zero duration renders `PT0S`.
pub fn format_iso8601(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "PT0S".to_string();
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

/// Minimal ISO-8601 duration parser: `P[nD]T[nH][nM][nS]`.
///
/// Components must be non-negative integers; years, months and weeks
/// are rejected since a task duration at that scale is outside any
/// forecast horizon anyway.
fn parse_iso8601(input: &str) -> Result<Duration, String> {
    let mut chars = input.chars().peekable();
    match chars.next() {
        Some('P') | Some('p') => {}
        _ => return Err("missing leading 'P'".to_string()),
    }

    let mut in_time_part = false;
    let mut saw_component = false;
    let mut total_secs: u64 = 0;

    while let Some(&c) = chars.peek() {
        if c == 'T' || c == 't' {
            if in_time_part {
                return Err("duplicate 'T' designator".to_string());
            }
            in_time_part = true;
            chars.next();
            continue;
        }

        if !c.is_ascii_digit() {
            return Err(format!("unexpected character '{c}'"));
        }

        let mut value: u64 = 0;
        while let Some(&d) = chars.peek() {
            if let Some(digit) = d.to_digit(10) {
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(digit)))
                    .ok_or_else(|| "component overflows".to_string())?;
                chars.next();
            } else {
                break;
            }
        }

        let unit = chars
            .next()
            .ok_or_else(|| "number without unit designator".to_string())?;
        let secs = match (unit.to_ascii_uppercase(), in_time_part) {
            ('D', false) => value.checked_mul(86_400),
            ('H', true) => value.checked_mul(3_600),
            ('M', true) => value.checked_mul(60),
            ('S', true) => Some(value),
            ('M', false) => return Err("months are not supported".to_string()),
            (u, _) => return Err(format!("unsupported designator '{u}'")),
        }
        .ok_or_else(|| "component overflows".to_string())?;

        total_secs = total_secs
            .checked_add(secs)
            .ok_or_else(|| "duration overflows".to_string())?;
        saw_component = true;
    }

    if !saw_component {
        return Err("no components".to_string());
    }

    Ok(Duration::from_secs(total_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso8601_forms() {
        assert_eq!(parse_duration("PT1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(
            parse_duration("PT1H30M").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(parse_duration("PT45S").unwrap(), Duration::from_secs(45));
        assert_eq!(
            parse_duration("P1DT2H").unwrap(),
            Duration::from_secs(86_400 + 7200)
        );
        assert_eq!(parse_duration("pt5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn parses_compact_forms() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        // The Go client formatted durations like this.
        assert_eq!(parse_duration("1h0m0s").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
        assert!(parse_duration("banana").is_err());
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("PT1X").is_err());
        assert!(parse_duration("P1M").is_err(), "months are ambiguous");
        assert!(parse_duration("PT1H30").is_err(), "trailing bare number");
    }

    #[test]
    fn formats_iso8601() {
        assert_eq!(format_iso8601(Duration::from_secs(0)), "PT0S");
        assert_eq!(format_iso8601(Duration::from_secs(45)), "PT45S");
        assert_eq!(format_iso8601(Duration::from_secs(3600)), "PT1H");
        assert_eq!(format_iso8601(Duration::from_secs(5400)), "PT1H30M");
        assert_eq!(format_iso8601(Duration::from_secs(3661)), "PT1H1M1S");
    }

    #[test]
    fn format_then_parse_round_trips() {
        for secs in [1u64, 59, 60, 61, 3600, 5400, 86_400, 90_000] {
            let duration = Duration::from_secs(secs);
            let formatted = format_iso8601(duration);
            assert_eq!(parse_duration(&formatted).unwrap(), duration, "{formatted}");
        }
    }
}
