//! Sampling-cadence classification.
//!
//! A fixed set of frequency labels is treated as hour-resolution for
//! aggregation purposes; every other label (daily, "every Nth day", annual)
//! is non-hourly-like. The classification gates which aggregation path
//! applies and which output partition a record belongs to.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingCadence {
    HourlyLike,
    NonHourly,
}

/// Default set of hourly-like labels. "-pams" entries are multi-sample-per-
/// hour regulatory program cadences still treated as hour-resolution.
pub fn default_hourly_like() -> BTreeSet<String> {
    ["hourly", "daily: 24 - 1 hr samples -pams"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Lowercases and trims a raw frequency label. A record lacking a label
/// defaults to "hourly": each network has a single assumed cadence when no
/// other signal exists.
pub fn clean_label(raw: Option<&str>) -> String {
    match raw.map(|s| s.trim().to_lowercase()) {
        Some(s) if !s.is_empty() => s,
        _ => "hourly".to_string(),
    }
}

pub fn classify(hourly_like: &BTreeSet<String>, label: &str) -> SamplingCadence {
    if hourly_like.contains(label) {
        SamplingCadence::HourlyLike
    } else {
        SamplingCadence::NonHourly
    }
}
