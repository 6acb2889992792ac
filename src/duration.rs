//! Duration parsing utilities for human-readable durations like "90s", "250ms".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "2h", "30m", "90s", "250ms".
///
/// Supported units:
/// - `h` - hours
/// - `m` - minutes
/// - `s` - seconds
/// - `ms` - milliseconds
///
/// The input is case-insensitive and whitespace is trimmed.
///
/// # Examples
///
/// ```
/// use portalsync::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(2 * 60 * 60));
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
/// assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    // "ms" must be checked before "m" and "s".
    let (num, unit) = if s.ends_with("ms") {
        (s.trim_end_matches("ms"), "ms")
    } else if s.ends_with('h') {
        (s.trim_end_matches('h'), "h")
    } else if s.ends_with('m') {
        (s.trim_end_matches('m'), "m")
    } else if s.ends_with('s') {
        (s.trim_end_matches('s'), "s")
    } else {
        anyhow::bail!("Duration must end with h, m, s, or ms");
    };

    let num: u64 = num.parse().with_context(|| "Invalid number in duration")?;

    let duration = match unit {
        "h" => Duration::from_secs(num.checked_mul(60 * 60).context("Duration is too large")?),
        "m" => Duration::from_secs(num.checked_mul(60).context("Duration is too large")?),
        "s" => Duration::from_secs(num),
        "ms" => Duration::from_millis(num),
        _ => unreachable!(),
    };

    Ok(duration)
}

/// Format a duration to a human-readable string.
///
/// Uses the largest unit that divides the duration evenly, falling back to
/// milliseconds for sub-second values.
///
/// # Examples
///
/// ```
/// use portalsync::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(2 * 60 * 60)), "2h");
/// assert_eq!(format_duration(Duration::from_secs(180)), "3m");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// ```
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();

    const MILLIS_PER_HOUR: u128 = 60 * 60 * 1000;
    const MILLIS_PER_MINUTE: u128 = 60 * 1000;
    const MILLIS_PER_SECOND: u128 = 1000;

    if millis >= MILLIS_PER_HOUR && millis % MILLIS_PER_HOUR == 0 {
        format!("{}h", millis / MILLIS_PER_HOUR)
    } else if millis >= MILLIS_PER_MINUTE && millis % MILLIS_PER_MINUTE == 0 {
        format!("{}m", millis / MILLIS_PER_MINUTE)
    } else if millis >= MILLIS_PER_SECOND && millis % MILLIS_PER_SECOND == 0 {
        format!("{}s", millis / MILLIS_PER_SECOND)
    } else {
        format!("{millis}ms")
    }
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("90000ms").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1M").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("250MS").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_whitespace_handling() {
        assert_eq!(parse_duration("  90s  ").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("\t30m\n").unwrap(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_invalid_unit() {
        assert!(parse_duration("1x").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("1").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn test_invalid_number() {
        assert!(parse_duration("abcs").is_err());
        assert!(parse_duration("-1m").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(180)), "3m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        // 90.5 seconds does not divide evenly, falls back to milliseconds
        assert_eq!(format_duration(Duration::from_millis(90_500)), "90500ms");
    }

    #[test]
    fn test_roundtrip() {
        let durations = [
            Duration::from_secs(3600),
            Duration::from_secs(180),
            Duration::from_secs(90),
            Duration::from_secs(45),
            Duration::from_millis(250),
        ];

        for d in durations {
            let formatted = format_duration(d);
            let parsed = parse_duration(&formatted).unwrap();
            assert_eq!(d, parsed, "Roundtrip failed for {d:?}");
        }
    }

    #[test]
    fn test_serde_deserialize() {
        #[derive(Deserialize)]
        struct TestConfig {
            #[serde(deserialize_with = "deserialize_duration")]
            timeout: Duration,
        }

        let config: TestConfig = toml::from_str(r#"timeout = "90s""#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(90));

        let config: TestConfig = toml::from_str(r#"timeout = "30000ms""#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
