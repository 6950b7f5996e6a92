//! EPA 8-hour ozone rolling maximum and daily-max selection.
//!
//! The per-hour 8-hour average is computed over an hour-indexed sequence
//! covering one site/year/method. A cycle counter 1..24 tracks the position
//! within each 24-value block; the first 7 positions of every block have
//! insufficient trailing history and are undefined. Zero-substituted
//! averages (more than 2 of 8 hours missing) are discarded when they fall
//! below the design limit, so substitution can never manufacture a
//! designable exceedance.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, TimeZone, Timelike};
use tracing::debug;

use crate::aggregate::rounding::{true_round, truncate_to};
use crate::model::{
    DailyAggregate, DataSource, MergedRecord, METHOD_SENTINEL, standard_offset,
};

/// Builds the hour-indexed value sequence for one calendar year. Index 0 is
/// midnight January 1 in the fixed UTC-8 zone; hours without a record stay
/// missing.
pub fn hourly_series(records: &[MergedRecord], year: i32) -> Vec<Option<f64>> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1 always exists");
    let hours = days_in_year(year) * 24;
    let mut series = vec![None; hours];

    for record in records {
        let date = record.timestamp.date_naive();
        if date.year() != year {
            debug!(site = %record.site, %date, "record outside target year, ignoring");
            continue;
        }
        let day = (date - jan1).num_days() as usize;
        let index = day * 24 + record.timestamp.hour() as usize;
        series[index] = Some(record.best_value);
    }

    series
}

/// Computes the trailing 8-hour average at every eligible hour.
///
/// Window rules, per trailing 8-value window ending at the current position:
/// - at most 2 missing: average the non-missing values, truncate at 3
///   decimals, then half-up round at 3 decimals;
/// - more than 2 missing: substitute 0 for every missing value, compute the
///   same truncate+round, and discard the result when it is below
///   `design_limit`;
/// - all 8 missing: undefined.
pub fn rolling_8hr(series: &[Option<f64>], design_limit: f64) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(series.len());

    for i in 0..series.len() {
        let cycle_position = i % 24 + 1;
        if cycle_position < 8 {
            out.push(None);
            continue;
        }

        let window = &series[i + 1 - 8..=i];
        let missing = window.iter().filter(|v| v.is_none()).count();
        let sum: f64 = window.iter().flatten().sum();

        let value = if missing == 8 {
            None
        } else if missing <= 2 {
            let avg = sum / (8 - missing) as f64;
            Some(true_round(truncate_to(avg, 3), 3))
        } else {
            // Missing hours count as zero in the denominator of 8.
            let avg = sum / 8.0;
            let rounded = true_round(truncate_to(avg, 3), 3);
            if rounded < design_limit { None } else { Some(rounded) }
        };

        out.push(value);
    }

    out
}

type GroupKey = (String, String, i32, Option<i32>);

/// Produces one daily aggregate per (site, date, method, POC): the maximum
/// non-missing 8-hour average of the day, with the contributing-observation
/// count retained for QC. Days where the group has no hourly data at all
/// produce no row; days with data but no computable window produce a
/// missing aggregate.
pub fn ozone_daily_max(
    records: &[MergedRecord],
    year: i32,
    design_limit: f64,
) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<GroupKey, Vec<&MergedRecord>> = BTreeMap::new();
    for record in records {
        let key = (
            record.site.clone(),
            record.pollutant_name.clone(),
            record.method_code.unwrap_or(METHOD_SENTINEL),
            record.parameter_occurrence_code,
        );
        groups.entry(key).or_default().push(record);
    }

    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1 always exists");
    let mut aggregates = Vec::new();

    for ((site, pollutant_name, method_code, poc), members) in groups {
        let owned: Vec<MergedRecord> = members.iter().map(|r| (*r).clone()).collect();
        let series = hourly_series(&owned, year);
        let rolling = rolling_8hr(&series, design_limit);

        for day in 0..days_in_year(year) {
            let date = jan1 + Days::new(day as u64);
            let day_hours = &series[day * 24..(day + 1) * 24];
            if day_hours.iter().all(Option::is_none) {
                continue;
            }

            let day_rolling = &rolling[day * 24..(day + 1) * 24];
            let max = day_rolling.iter().flatten().copied().fold(None, |acc, v| {
                Some(match acc {
                    None => v,
                    Some(m) => f64::max(m, v),
                })
            });
            let obs_count = day_rolling.iter().flatten().count();

            let day_members: Vec<&MergedRecord> = members
                .iter()
                .copied()
                .filter(|r| r.timestamp.date_naive() == date)
                .collect();
            let data_source = if day_members.iter().any(|r| r.best_source == DataSource::Aqs) {
                DataSource::Aqs
            } else {
                DataSource::Envista
            };

            aggregates.push(DailyAggregate {
                site: site.clone(),
                pollutant_name: pollutant_name.clone(),
                method_code,
                parameter_occurrence_code: poc,
                date,
                mean: None,
                min: None,
                max,
                obs_count,
                missing_obs: 24 - obs_count as i32,
                start_time: standard_offset()
                    .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"))
                    .single(),
                end_time: standard_offset()
                    .from_local_datetime(&date.and_hms_opt(23, 0, 0).expect("23:00 exists"))
                    .single(),
                data_source,
                sample_frequency: day_members.first().map(|r| r.sample_frequency.clone()),
                latitude: day_members.iter().find_map(|r| r.latitude),
                longitude: day_members.iter().find_map(|r| r.longitude),
                smoke_flag: None,
            });
        }
    }

    aggregates
}

fn days_in_year(year: i32) -> usize {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .expect("December 31 always exists")
        .ordinal() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seven_positions_undefined() {
        let series: Vec<Option<f64>> = vec![Some(50.0); 24];
        let rolling = rolling_8hr(&series, 70.0);
        assert!(rolling[..7].iter().all(Option::is_none));
        assert!(rolling[7..].iter().all(Option::is_some));
    }

    #[test]
    fn test_cycle_counter_resets_each_day() {
        let series: Vec<Option<f64>> = vec![Some(50.0); 48];
        let rolling = rolling_8hr(&series, 70.0);
        // Positions 1-7 of the second 24-hour block are also undefined.
        assert!(rolling[24..31].iter().all(Option::is_none));
        assert!(rolling[31].is_some());
    }

    #[test]
    fn test_complete_window_truncate_then_round() {
        let mut series: Vec<Option<f64>> = vec![None; 24];
        for slot in series.iter_mut().take(8) {
            *slot = Some(60.1236);
        }
        let rolling = rolling_8hr(&series, 70.0);
        // avg 60.1236 -> truncate 60.123 -> half-up round stays 60.123
        assert_eq!(rolling[7], Some(60.123));
    }

    #[test]
    fn test_two_missing_always_computed_even_below_limit() {
        let mut series: Vec<Option<f64>> = vec![None; 24];
        for slot in series.iter_mut().take(6) {
            *slot = Some(10.0);
        }
        let rolling = rolling_8hr(&series, 70.0);
        // 2 of 8 missing: average the 6 valid hours, no design-limit gate.
        assert_eq!(rolling[7], Some(10.0));
    }

    #[test]
    fn test_three_missing_below_limit_discarded() {
        let mut series: Vec<Option<f64>> = vec![None; 24];
        for slot in series.iter_mut().take(5) {
            *slot = Some(100.0);
        }
        let rolling = rolling_8hr(&series, 70.0);
        // 3 of 8 missing, zero-substituted: 500/8 = 62.5 < 70 -> discarded.
        assert_eq!(rolling[7], None);
    }

    #[test]
    fn test_three_missing_above_limit_reported() {
        let mut series: Vec<Option<f64>> = vec![None; 24];
        for slot in series.iter_mut().take(5) {
            *slot = Some(120.0);
        }
        let rolling = rolling_8hr(&series, 70.0);
        // 600/8 = 75 >= 70 -> kept.
        assert_eq!(rolling[7], Some(75.0));
    }

    #[test]
    fn test_all_missing_window_undefined() {
        let series: Vec<Option<f64>> = vec![None; 24];
        let rolling = rolling_8hr(&series, 70.0);
        assert!(rolling.iter().all(Option::is_none));
    }

    #[test]
    fn test_hourly_series_places_records_by_hour() {
        use chrono::TimeZone;
        let record = MergedRecord {
            timestamp: standard_offset().with_ymd_and_hms(2024, 1, 2, 5, 0, 0).unwrap(),
            site: "psp".to_string(),
            pollutant_name: "ozone".to_string(),
            aqs_value: Some(41.0),
            envista_value: None,
            best_value: 41.0,
            best_source: DataSource::Aqs,
            unit: "parts per billion".to_string(),
            qualifier: "ok".to_string(),
            method_code: Some(87),
            parameter_occurrence_code: Some(1),
            sample_frequency: "hourly".to_string(),
            latitude: None,
            longitude: None,
        };
        let series = hourly_series(&[record], 2024);
        assert_eq!(series.len(), 366 * 24);
        assert_eq!(series[24 + 5], Some(41.0));
        assert_eq!(series[0], None);
    }

    #[test]
    fn test_daily_max_selects_largest_window() {
        use chrono::TimeZone;
        // 24 full hours: ramp up then down, peak mid-day.
        let records: Vec<MergedRecord> = (0..24u32)
            .map(|h| {
                let value = if h < 12 { 40.0 + h as f64 } else { 63.0 - h as f64 };
                MergedRecord {
                    timestamp: standard_offset().with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap(),
                    site: "psp".to_string(),
                    pollutant_name: "ozone".to_string(),
                    aqs_value: Some(value),
                    envista_value: None,
                    best_value: value,
                    best_source: DataSource::Aqs,
                    unit: "parts per billion".to_string(),
                    qualifier: "ok".to_string(),
                    method_code: Some(87),
                    parameter_occurrence_code: Some(1),
                    sample_frequency: "hourly".to_string(),
                    latitude: Some(45.0),
                    longitude: Some(-123.0),
                }
            })
            .collect();

        let aggregates = ozone_daily_max(&records, 2024, 70.0);
        assert_eq!(aggregates.len(), 1);
        let agg = &aggregates[0];
        // 17 computable windows (positions 8..=24).
        assert_eq!(agg.obs_count, 17);
        // Peak window: hours 8..=15 -> (48+49+50+51+51+50+49+48)/8 = 49.5
        assert_eq!(agg.max, Some(49.5));
        assert_eq!(agg.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
