//! Pure numeric helpers shared by every analysis.
//!
//! None of these functions fail: empty or degenerate samples collapse to
//! zero so callers always get a finite value back.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use schemars::JsonSchema;
use serde::Serialize;

/// Regression denominators below this are treated as zero.
const SLOPE_EPSILON: f64 = 1e-10;
const OUTLIER_IQR_MULTIPLIER: f64 = 1.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

/// NaN and infinities become 0.0.
pub fn sanitize(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    sanitize((x * factor).round() / factor)
}

/// Clamp to `[min, max]`, mapping non-finite input to `min`.
pub fn clamp_score(x: f64, min: f64, max: f64) -> f64 {
    if x.is_finite() { x.clamp(min, max) } else { min }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sanitize(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                return sorted[lower];
            }
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}

/// Linear interpolation between the ranked values bracketing `p·(n-1)`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    sanitize(percentile_sorted(&sorted(values), p))
}

pub fn summary_statistics(values: &[f64]) -> StatisticalSummary {
    if values.is_empty() {
        return StatisticalSummary::default();
    }
    let s = sorted(values);
    let n = s.len();
    let mean = mean(&s);
    let median = if n % 2 == 0 {
        (s[n / 2 - 1] + s[n / 2]) / 2.0
    } else {
        s[n / 2]
    };
    let variance = s.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    StatisticalSummary {
        count: n,
        mean,
        median: sanitize(median),
        std_dev: sanitize(variance.sqrt()),
        min: sanitize(s[0]),
        max: sanitize(s[n - 1]),
        p25: sanitize(percentile_sorted(&s, 0.25)),
        p75: sanitize(percentile_sorted(&s, 0.75)),
    }
}

pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return 0.0;
    }
    let mean_x = mean(x);
    let mean_y = mean(y);
    let (mut cov, mut ss_x, mut ss_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        ss_x += dx * dx;
        ss_y += dy * dy;
    }
    if ss_x == 0.0 || ss_y == 0.0 {
        return 0.0;
    }
    sanitize(cov / (ss_x * ss_y).sqrt()).clamp(-1.0, 1.0)
}

pub fn correlation_strength_label(r: f64) -> &'static str {
    let r = sanitize(r).abs();
    if r >= 0.8 {
        "Very Strong"
    } else if r >= 0.6 {
        "Strong"
    } else if r >= 0.4 {
        "Moderate"
    } else if r >= 0.2 {
        "Weak"
    } else {
        "Very Weak"
    }
}

/// Least-squares slope with the point index as x.
pub fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator.abs() < SLOPE_EPSILON {
        return 0.0;
    }
    sanitize((n_f * sum_xy - sum_x * sum_y) / denominator)
}

pub fn trend_direction(slope: f64, threshold: f64) -> TrendDirection {
    let slope = sanitize(slope);
    if slope.abs() < threshold {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// `YYYY-MM-DD` in the timestamp's own zone.
pub fn day_key<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    ts.date_naive().format("%Y-%m-%d").to_string()
}

/// Bucket timestamps by calendar day, keeping arrival order within each day.
pub fn group_by_calendar_day<Tz: TimeZone>(
    timestamps: &[DateTime<Tz>],
) -> BTreeMap<String, Vec<DateTime<Tz>>> {
    let mut days: BTreeMap<String, Vec<DateTime<Tz>>> = BTreeMap::new();
    for ts in timestamps {
        days.entry(day_key(ts)).or_default().push(ts.clone());
    }
    days
}

pub fn confidence_from_sample_size(n: usize) -> f64 {
    match n {
        0 => 0.0,
        1..=9 => 0.3,
        10..=19 => 0.55,
        20..=29 => 0.65,
        30..=49 => 0.75,
        50..=99 => 0.85,
        _ => 0.95,
    }
}

/// Values outside `[p25 - 1.5·IQR, p75 + 1.5·IQR]`, in input order.
pub fn find_outliers(values: &[f64]) -> Vec<f64> {
    if values.len() < 4 {
        return Vec::new();
    }
    let summary = summary_statistics(values);
    let iqr = summary.p75 - summary.p25;
    let lower = summary.p25 - OUTLIER_IQR_MULTIPLIER * iqr;
    let upper = summary.p75 + OUTLIER_IQR_MULTIPLIER * iqr;
    values
        .iter()
        .copied()
        .filter(|v| *v < lower || *v > upper)
        .collect()
}

/// Most frequent key. Ties go to the smallest key.
pub fn most_common<K, I>(keys: I) -> Option<K>
where
    K: Ord,
    I: IntoIterator<Item = K>,
{
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}
