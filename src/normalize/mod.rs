//! Source normalizers: one per monitoring network.
//!
//! Each normalizer converts a network's raw observation table into the
//! common [`Observation`] schema and reports the set of distinct sampling-
//! frequency labels it encountered. An empty input is a valid terminal
//! outcome per site and produces an empty batch, never an error.

pub mod aqs;
pub mod envista;

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::model::{Observation, standard_offset};

/// Knots → miles per hour.
const KNOTS_TO_MPH: f64 = 1.15078;

/// Output of one normalizer run for one site.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub observations: Vec<Observation>,
    /// Distinct cleaned frequency labels seen in the input.
    pub frequencies: BTreeSet<String>,
}

/// Normalizes units in place: ozone in parts-per-million becomes
/// parts-per-billion, wind speed in knots becomes miles-per-hour, everything
/// else passes through unchanged.
pub(crate) fn convert_units(
    pollutant_name: &str,
    value: Option<f64>,
    unit: &str,
) -> (Option<f64>, String) {
    let unit_lower = unit.trim().to_lowercase();
    let is_ozone = pollutant_name.to_lowercase().contains("ozone");

    if is_ozone && (unit_lower == "parts per million" || unit_lower == "ppm") {
        return (value.map(|v| v * 1000.0), "parts per billion".to_string());
    }
    if unit_lower == "knots" {
        return (value.map(|v| v * KNOTS_TO_MPH), "miles per hour".to_string());
    }

    (value, unit.trim().to_string())
}

/// Builds a fixed-offset timestamp from separate local date and time fields.
pub(crate) fn local_datetime(date: &str, time: &str) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .ok()?;
    standard_offset()
        .from_local_datetime(&date.and_time(time))
        .single()
}

/// Midnight of a local date in the fixed offset.
pub(crate) fn local_midnight(date: &str) -> Option<DateTime<FixedOffset>> {
    local_datetime(date, "00:00")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ozone_ppm_to_ppb() {
        let (v, u) = convert_units("Ozone", Some(0.041), "Parts per million");
        assert!((v.unwrap() - 41.0).abs() < 1e-9);
        assert_eq!(u, "parts per billion");
    }

    #[test]
    fn test_ppm_untouched_for_non_ozone() {
        let (v, u) = convert_units("Carbon monoxide", Some(0.4), "Parts per million");
        assert_eq!(v, Some(0.4));
        assert_eq!(u, "Parts per million");
    }

    #[test]
    fn test_knots_to_mph() {
        let (v, u) = convert_units("Wind Speed - Resultant", Some(10.0), "Knots");
        assert!((v.unwrap() - 11.5078).abs() < 1e-9);
        assert_eq!(u, "miles per hour");
    }

    #[test]
    fn test_missing_value_keeps_unit_conversion() {
        let (v, u) = convert_units("Ozone", None, "ppm");
        assert_eq!(v, None);
        assert_eq!(u, "parts per billion");
    }

    #[test]
    fn test_local_datetime_fixed_offset() {
        let ts = local_datetime("2024-07-01", "13:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -8 * 3600);
        assert_eq!(ts.to_rfc3339(), "2024-07-01T13:00:00-08:00");
    }
}
