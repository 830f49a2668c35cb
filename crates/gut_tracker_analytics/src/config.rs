use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::AnalyticsError;

pub const DEFAULT_TREND_THRESHOLD: f64 = 0.05;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// Zone used to cut timestamps into calendar days.
    pub utc_offset: FixedOffset,
    /// Minimum |slope| per day before a metric counts as moving.
    pub trend_threshold: f64,
    /// Look-back window for the operations that only take a user id.
    pub window_days: i64,
    pub fetch_timeout: Option<Duration>,
    /// Fail with `InsufficientData` instead of returning neutral results
    /// when the window holds no records.
    pub require_data: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            trend_threshold: DEFAULT_TREND_THRESHOLD,
            window_days: DEFAULT_WINDOW_DAYS,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            require_data: false,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AnalyticsError> {
    raw.trim()
        .parse()
        .map_err(|_| AnalyticsError::Config(format!("{key} has invalid value {raw:?}")))
}

impl AnalyticsConfig {
    pub fn from_env() -> Result<Self, AnalyticsError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, AnalyticsError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = get("GUT_ANALYTICS_UTC_OFFSET_MINUTES") {
            let minutes: i32 = parse("GUT_ANALYTICS_UTC_OFFSET_MINUTES", &raw)?;
            cfg.utc_offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| {
                    AnalyticsError::Config(format!("UTC offset of {minutes} minutes is out of range"))
                })?;
        }
        if let Some(raw) = get("GUT_ANALYTICS_TREND_THRESHOLD") {
            let threshold: f64 = parse("GUT_ANALYTICS_TREND_THRESHOLD", &raw)?;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(AnalyticsError::Config(
                    "GUT_ANALYTICS_TREND_THRESHOLD must be a non-negative number".into(),
                ));
            }
            cfg.trend_threshold = threshold;
        }
        if let Some(raw) = get("GUT_ANALYTICS_WINDOW_DAYS") {
            let days: i64 = parse("GUT_ANALYTICS_WINDOW_DAYS", &raw)?;
            if !(1..=3660).contains(&days) {
                return Err(AnalyticsError::Config(
                    "GUT_ANALYTICS_WINDOW_DAYS must be between 1 and 3660".into(),
                ));
            }
            cfg.window_days = days;
        }
        if let Some(raw) = get("GUT_ANALYTICS_FETCH_TIMEOUT_SECS") {
            let secs: u64 = parse("GUT_ANALYTICS_FETCH_TIMEOUT_SECS", &raw)?;
            // 0 disables the deadline
            cfg.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = get("GUT_ANALYTICS_REQUIRE_DATA") {
            cfg.require_data = parse("GUT_ANALYTICS_REQUIRE_DATA", &raw)?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = AnalyticsConfig::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.utc_offset.local_minus_utc(), 0);
        assert_eq!(cfg.window_days, DEFAULT_WINDOW_DAYS);
        assert_eq!(cfg.fetch_timeout, Some(DEFAULT_FETCH_TIMEOUT));
        assert!(!cfg.require_data);
    }

    #[test]
    fn reads_values() {
        let get = |k: &str| match k {
            "GUT_ANALYTICS_UTC_OFFSET_MINUTES" => Some("-300".into()),
            "GUT_ANALYTICS_TREND_THRESHOLD" => Some("0.2".into()),
            "GUT_ANALYTICS_WINDOW_DAYS" => Some("14".into()),
            "GUT_ANALYTICS_FETCH_TIMEOUT_SECS" => Some("0".into()),
            "GUT_ANALYTICS_REQUIRE_DATA" => Some("true".into()),
            _ => None,
        };
        let cfg = AnalyticsConfig::from_env_with(get).expect("cfg");
        assert_eq!(cfg.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(cfg.trend_threshold, 0.2);
        assert_eq!(cfg.window_days, 14);
        assert_eq!(cfg.fetch_timeout, None);
        assert!(cfg.require_data);
    }

    #[test]
    fn rejects_malformed_values() {
        let bad_offset = AnalyticsConfig::from_env_with(|k| {
            (k == "GUT_ANALYTICS_UTC_OFFSET_MINUTES").then(|| "abc".into())
        });
        assert!(matches!(bad_offset, Err(AnalyticsError::Config(_))));

        let bad_window =
            AnalyticsConfig::from_env_with(|k| (k == "GUT_ANALYTICS_WINDOW_DAYS").then(|| "0".into()));
        assert!(bad_window.is_err());

        let bad_threshold = AnalyticsConfig::from_env_with(|k| {
            (k == "GUT_ANALYTICS_TREND_THRESHOLD").then(|| "-1".into())
        });
        assert!(bad_threshold.is_err());
    }
}
