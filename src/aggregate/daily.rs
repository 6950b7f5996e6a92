//! Midnight-to-midnight daily aggregation in the fixed UTC-8 zone.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aggregate::rounding::truncate_to;
use crate::model::{DailyAggregate, DataSource, MergedRecord, METHOD_SENTINEL};

/// Statistics for one day's worth of hourly slots.
#[derive(Debug, PartialEq)]
pub struct DayStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub valid: usize,
    pub missing_obs: i32,
}

/// Computes mean/min/max over a day's hourly values, each truncated toward
/// zero at one decimal. A day with zero valid hours yields missing
/// statistics, never zero. `missing_obs` is 24 minus the valid count.
///
/// A minimum-valid-hours rule (>= 18 unless the missing-weighted value still
/// exceeds 35) exists upstream but is disabled; `missing_obs` is reported so
/// consumers can filter without recomputation.
pub fn day_stats(values: &[Option<f64>]) -> DayStats {
    let valid: Vec<f64> = values.iter().flatten().copied().collect();
    let missing_obs = 24 - valid.len() as i32;

    if valid.is_empty() {
        return DayStats {
            mean: None,
            min: None,
            max: None,
            valid: 0,
            missing_obs,
        };
    }

    let sum: f64 = valid.iter().sum();
    let mean = sum / valid.len() as f64;
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    DayStats {
        mean: Some(truncate_to(mean, 1)),
        min: Some(truncate_to(min, 1)),
        max: Some(truncate_to(max, 1)),
        valid: valid.len(),
        missing_obs,
    }
}

type GroupKey = (String, String, i32, Option<i32>, NaiveDate);

/// Groups hourly-like merged records by (site, pollutant, method, calendar
/// day) and computes the daily average aggregate for each group.
pub fn daily_averages(records: &[MergedRecord]) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<GroupKey, Vec<&MergedRecord>> = BTreeMap::new();

    for record in records {
        let key = (
            record.site.clone(),
            record.pollutant_name.clone(),
            record.method_code.unwrap_or(METHOD_SENTINEL),
            record.parameter_occurrence_code,
            record.timestamp.date_naive(),
        );
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|((site, pollutant_name, method_code, poc, date), members)| {
            let values: Vec<Option<f64>> = members.iter().map(|r| Some(r.best_value)).collect();
            let stats = day_stats(&values);
            build_aggregate(site, pollutant_name, method_code, poc, date, stats, &members)
        })
        .collect()
}

/// Partitions non-hourly merged records straight into the daily table: one
/// sample is one day's value, passed through unchanged. Duplicate samples
/// for the same day are averaged without truncation.
pub fn daily_from_samples(records: &[MergedRecord]) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<GroupKey, Vec<&MergedRecord>> = BTreeMap::new();

    for record in records {
        let key = (
            record.site.clone(),
            record.pollutant_name.clone(),
            record.method_code.unwrap_or(METHOD_SENTINEL),
            record.parameter_occurrence_code,
            record.timestamp.date_naive(),
        );
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|((site, pollutant_name, method_code, poc, date), members)| {
            let sum: f64 = members.iter().map(|r| r.best_value).sum();
            let value = sum / members.len() as f64;
            let min = members.iter().map(|r| r.best_value).fold(f64::INFINITY, f64::min);
            let max = members
                .iter()
                .map(|r| r.best_value)
                .fold(f64::NEG_INFINITY, f64::max);
            let stats = DayStats {
                mean: Some(value),
                min: Some(min),
                max: Some(max),
                valid: members.len(),
                missing_obs: 0,
            };
            build_aggregate(site, pollutant_name, method_code, poc, date, stats, &members)
        })
        .collect()
}

fn build_aggregate(
    site: String,
    pollutant_name: String,
    method_code: i32,
    poc: Option<i32>,
    date: NaiveDate,
    stats: DayStats,
    members: &[&MergedRecord],
) -> DailyAggregate {
    let start_time = members.iter().map(|r| r.timestamp).min();
    let end_time = members.iter().map(|r| r.timestamp).max();
    // Hour-level precedence already favors AQS; the day-level tag follows it.
    let data_source = if members.iter().any(|r| r.best_source == DataSource::Aqs) {
        DataSource::Aqs
    } else {
        DataSource::Envista
    };

    DailyAggregate {
        site,
        pollutant_name,
        method_code,
        parameter_occurrence_code: poc,
        date,
        mean: stats.mean,
        min: stats.min,
        max: stats.max,
        obs_count: stats.valid,
        missing_obs: stats.missing_obs,
        start_time,
        end_time,
        data_source,
        sample_frequency: members.first().map(|r| r.sample_frequency.clone()),
        latitude: members.iter().find_map(|r| r.latitude),
        longitude: members.iter().find_map(|r| r.longitude),
        smoke_flag: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::standard_offset;
    use chrono::TimeZone;

    fn record(day: u32, hour: u32, value: f64, source: DataSource) -> MergedRecord {
        MergedRecord {
            timestamp: standard_offset()
                .with_ymd_and_hms(2024, 3, day, hour, 0, 0)
                .unwrap(),
            site: "psp".to_string(),
            pollutant_name: "pm2.5 - local conditions".to_string(),
            aqs_value: (source == DataSource::Aqs).then_some(value),
            envista_value: (source == DataSource::Envista).then_some(value),
            best_value: value,
            best_source: source,
            unit: "micrograms/cubic meter (lc)".to_string(),
            qualifier: "ok".to_string(),
            method_code: Some(170),
            parameter_occurrence_code: Some(1),
            sample_frequency: "hourly".to_string(),
            latitude: Some(45.0),
            longitude: Some(-123.0),
        }
    }

    #[test]
    fn test_day_stats_truncate_toward_zero() {
        let values: Vec<Option<f64>> = vec![Some(15.26), Some(15.26)];
        let stats = day_stats(&values);
        // Mean 15.26 truncates to 15.2, never rounds to 15.3.
        assert_eq!(stats.mean, Some(15.2));
        assert_eq!(stats.missing_obs, 22);
    }

    #[test]
    fn test_day_stats_zero_valid_hours_is_missing() {
        let values: Vec<Option<f64>> = vec![None; 24];
        let stats = day_stats(&values);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.missing_obs, 24);
    }

    #[test]
    fn test_daily_averages_missing_obs_counts_gap_hours() {
        let records: Vec<MergedRecord> =
            (0..20).map(|h| record(5, h, 10.0, DataSource::Aqs)).collect();
        let aggregates = daily_averages(&records);

        assert_eq!(aggregates.len(), 1);
        let agg = &aggregates[0];
        assert_eq!(agg.obs_count, 20);
        assert_eq!(agg.missing_obs, 4);
        assert_eq!(agg.mean, Some(10.0));
        assert_eq!(agg.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_days_split_at_local_midnight() {
        let records = vec![
            record(5, 23, 10.0, DataSource::Aqs),
            record(6, 0, 20.0, DataSource::Aqs),
        ];
        let aggregates = daily_averages(&records);
        assert_eq!(aggregates.len(), 2);
    }

    #[test]
    fn test_mixed_source_day_attributed_to_aqs() {
        let records = vec![
            record(5, 1, 10.0, DataSource::Envista),
            record(5, 2, 12.0, DataSource::Aqs),
        ];
        let aggregates = daily_averages(&records);
        assert_eq!(aggregates[0].data_source, DataSource::Aqs);
    }

    #[test]
    fn test_daily_from_samples_passes_value_through() {
        let mut sample = record(5, 0, 35.25, DataSource::Aqs);
        sample.sample_frequency = "every 3rd day".to_string();
        let aggregates = daily_from_samples(&[sample]);

        assert_eq!(aggregates.len(), 1);
        // Direct daily samples are not truncated.
        assert_eq!(aggregates[0].mean, Some(35.25));
        assert_eq!(aggregates[0].missing_obs, 0);
        assert_eq!(aggregates[0].obs_count, 1);
    }
}
