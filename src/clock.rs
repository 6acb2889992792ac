use chrono::{DateTime, SecondsFormat, Utc};

/// Abstraction over "current time" so log timestamps are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// RFC 3339 timestamp with millisecond precision, as used in run logs.
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_timestamp_is_rfc3339_millis() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap());
        assert_eq!(clock.timestamp(), "2025-03-14T09:26:53.000Z");
    }
}
