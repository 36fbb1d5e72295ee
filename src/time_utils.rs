//! Stateless helpers for formatting and parsing timestamps.
//!
//! Elapsed times are rendered as `1d2h3m4s5ms6ns` with zero units skipped.
//! Real times are rendered as `YYYY-MM-DDTHH:MM:SS.nnnnnnnnn`.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::error::TimeError;

pub const NS_PER_MS: i64 = 1_000_000;
pub const NS_PER_S: i64 = 1_000 * NS_PER_MS;
pub const NS_PER_MIN: i64 = 60 * NS_PER_S;
pub const NS_PER_HOUR: i64 = 60 * NS_PER_MIN;
pub const NS_PER_DAY: i64 = 24 * NS_PER_HOUR;

const ELAPSED_UNITS: [(&str, i64); 6] = [
    ("d", NS_PER_DAY),
    ("h", NS_PER_HOUR),
    ("m", NS_PER_MIN),
    ("s", NS_PER_S),
    ("ms", NS_PER_MS),
    ("ns", 1),
];

/// Human elapsed format, e.g. `1h2m3s4ms5ns`. Every unit is optional.
static HUMAN_ELAPSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?(?:(\d+)ns)?$")
        .expect("Invalid human elapsed regex pattern")
});

/// Bare nanosecond count.
static NS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("Invalid nanosecond regex pattern"));

/// Real date-time, ISO-like, with up to nanosecond precision and an optional `Z`.
static REAL_DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?Z?$")
        .expect("Invalid real date-time regex pattern")
});

/// Integer division rounding half up (`14999 / 10000 == 1`, `15000 / 10000 == 2`).
pub fn divide_and_round(numerator: u64, denominator: u64) -> Result<u64, TimeError> {
    if denominator == 0 {
        return Err(TimeError::DivisionByZero);
    }
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    // remainder >= denominator / 2, written without losing the odd half
    if remainder >= denominator - remainder {
        Ok(quotient + 1)
    } else {
        Ok(quotient)
    }
}

/// Format elapsed nanoseconds as `1d2h3m4s5ms6ns`.
///
/// With `hide_ns` the value is rounded half up to whole milliseconds and the
/// `ns` unit is dropped.
pub fn format_elapsed_ns(ns: i64, hide_ns: bool) -> String {
    let sign = if ns < 0 { "-" } else { "" };
    let mut left = ns.unsigned_abs();
    if hide_ns {
        // NS_PER_MS is non-zero, so rounding cannot fail
        left = divide_and_round(left, NS_PER_MS as u64).unwrap_or(0) * NS_PER_MS as u64;
    }

    let mut out = String::from(sign);
    for (unit, unit_ns) in ELAPSED_UNITS {
        if hide_ns && unit == "ns" {
            continue;
        }
        let unit_ns = unit_ns as u64;
        let count = left / unit_ns;
        left %= unit_ns;
        if count > 0 {
            out.push_str(&format!("{count}{unit}"));
        }
    }

    if out.len() == sign.len() {
        return if hide_ns { "0ms".to_string() } else { "0ns".to_string() };
    }
    out
}

/// Format real (epoch) nanoseconds as a date-time, shifted by `utc_offset_ns`.
pub fn format_real_ns(ns: i64, utc_offset_ns: i64) -> String {
    let local_ns = ns.saturating_add(utc_offset_ns);
    Utc.timestamp_nanos(local_ns)
        .format("%Y-%m-%dT%H:%M:%S%.9f")
        .to_string()
}

pub fn is_human_elapsed_format(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && !NS_RE.is_match(text) && HUMAN_ELAPSED_RE.is_match(text)
}

pub fn is_ns_format(text: &str) -> bool {
    NS_RE.is_match(text.trim())
}

pub fn is_real_date_time_format(text: &str) -> bool {
    REAL_DATE_TIME_RE.is_match(text.trim())
}

/// Parse a human elapsed string like `2m30s` into nanoseconds.
pub fn parse_human_elapsed(text: &str) -> Result<i64, TimeError> {
    let invalid = || TimeError::InvalidHumanTimestamp(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let caps = HUMAN_ELAPSED_RE.captures(trimmed).ok_or_else(invalid)?;

    let mut total: i64 = 0;
    for (i, (_, unit_ns)) in ELAPSED_UNITS.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            let count: i64 = m.as_str().parse().map_err(|_| invalid())?;
            total = count
                .checked_mul(*unit_ns)
                .and_then(|v| v.checked_add(total))
                .ok_or(TimeError::Overflow)?;
        }
    }
    Ok(total)
}

/// Parse a real date-time string into nanoseconds since the epoch.
///
/// The string is read as-is (no timezone adjustment).
pub fn parse_real_date_time(text: &str) -> Result<i64, TimeError> {
    let invalid = || TimeError::InvalidHumanTimestamp(text.to_string());
    let caps = REAL_DATE_TIME_RE.captures(text.trim()).ok_or_else(invalid)?;

    let field = |i: usize| -> Result<u32, TimeError> {
        caps.get(i)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())
    };
    let year = field(1)? as i32;
    let nanos = match caps.get(7) {
        Some(frac) => format!("{:0<9}", frac.as_str())
            .parse::<u32>()
            .map_err(|_| invalid())?,
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?).ok_or_else(invalid)?;
    let time =
        NaiveTime::from_hms_nano_opt(field(4)?, field(5)?, field(6)?, nanos).ok_or_else(invalid)?;
    date.and_time(time)
        .and_utc()
        .timestamp_nanos_opt()
        .ok_or(TimeError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divide_and_round_half_up() {
        assert_eq!(divide_and_round(10_000 + 4_999, 10_000).unwrap(), 1);
        assert_eq!(divide_and_round(10_000 + 5_000, 10_000).unwrap(), 2);
        assert_eq!(divide_and_round(0, 7).unwrap(), 0);
        assert_eq!(divide_and_round(3, 2).unwrap(), 2);
        assert_eq!(divide_and_round(4, 3).unwrap(), 1);
    }

    #[test]
    fn test_divide_and_round_by_zero() {
        assert_eq!(divide_and_round(10, 0), Err(TimeError::DivisionByZero));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed_ns(0, false), "0ns");
        assert_eq!(format_elapsed_ns(0, true), "0ms");
        assert_eq!(format_elapsed_ns(5, false), "5ns");
        assert_eq!(format_elapsed_ns(NS_PER_DAY + 5 * NS_PER_MS, false), "1d5ms");
        assert_eq!(format_elapsed_ns(-2 * NS_PER_S, false), "-2s");
    }

    #[test]
    fn test_format_elapsed_hide_ns_rounds() {
        assert_eq!(format_elapsed_ns(NS_PER_S + 499_999, true), "1s");
        assert_eq!(format_elapsed_ns(NS_PER_S + 500_000, true), "1s1ms");
    }

    #[test]
    fn test_format_real_with_offset() {
        assert_eq!(format_real_ns(0, 0), "1970-01-01T00:00:00.000000000");
        assert_eq!(format_real_ns(0, NS_PER_HOUR), "1970-01-01T01:00:00.000000000");
    }

    #[test]
    fn test_parse_human_elapsed() {
        assert_eq!(parse_human_elapsed("5ms").unwrap(), 5 * NS_PER_MS);
        assert_eq!(parse_human_elapsed("2m").unwrap(), 2 * NS_PER_MIN);
        assert_eq!(
            parse_human_elapsed("1h2m3s4ms5ns").unwrap(),
            NS_PER_HOUR + 2 * NS_PER_MIN + 3 * NS_PER_S + 4 * NS_PER_MS + 5
        );
        assert!(parse_human_elapsed("").is_err());
        assert!(parse_human_elapsed("3x").is_err());
        assert!(parse_human_elapsed("1s2h").is_err());
    }

    #[test]
    fn test_format_checks() {
        assert!(is_human_elapsed_format("10s"));
        assert!(!is_human_elapsed_format("10"));
        assert!(is_ns_format(" 10 "));
        assert!(is_real_date_time_format("2022-11-10T22:04:54.186123212Z"));
        assert!(is_real_date_time_format("2022-11-10 22:04:54"));
        assert!(!is_real_date_time_format("22:04:54"));
    }

    #[test]
    fn test_parse_real_date_time() {
        assert_eq!(
            parse_real_date_time("2022-11-10T22:04:54.186123212").unwrap(),
            1_668_117_894_186_123_212
        );
        assert_eq!(
            parse_real_date_time("2022-11-10T22:04:54.186Z").unwrap(),
            1_668_117_894_186_000_000
        );
        assert!(parse_real_date_time("2022-13-10T22:04:54").is_err());
    }
}
