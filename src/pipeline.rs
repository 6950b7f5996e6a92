//! Per-site, per-pollutant orchestration.
//!
//! Each site is processed by a pure function whose results are folded by
//! plain concatenation, so there is no hidden ordering dependency and no
//! shared mutable state across sites. The hierarchy resolver and the flag
//! propagator run only after every site's aggregation is complete: they
//! need all methods and pollutants for a date before they can resolve
//! across them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::info;

use crate::aggregate::{daily, ozone};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frequency::{self, SamplingCadence};
use crate::merge::{self, MergeMode};
use crate::model::{
    DailyAggregate, HierarchyResult, MergedRecord, SiteMetadata, SmokeLabel, WildfireFlag,
};
use crate::normalize::{aqs, envista};
use crate::wildfire;

/// Raw tables for one site, as loaded from the collaborator hand-off.
#[derive(Debug, Default)]
pub struct SiteInput {
    pub site: String,
    pub aqs: Vec<aqs::RawAqsRow>,
    pub envista: Vec<envista::RawEnvistaRow>,
}

/// One pollutant-variant run.
#[derive(Debug, Clone)]
pub struct PollutantRun {
    pub pollutant: String,
    pub year: i32,
    pub mode: MergeMode,
}

/// Merged hourly output for a run, with the distinct frequency labels the
/// normalizers encountered.
#[derive(Debug, Default)]
pub struct HourlyResult {
    pub records: Vec<MergedRecord>,
    pub frequencies: BTreeSet<String>,
}

/// Normalizes and merges one site's raw tables. Pure: no IO, no logging
/// beyond the normalizers' own warnings.
pub fn process_site(
    cfg: &PipelineConfig,
    mode: MergeMode,
    requested_method: Option<i32>,
    input: &SiteInput,
) -> HourlyResult {
    let aqs_batch = aqs::normalize(cfg, &input.site, requested_method, &input.aqs);
    let envista_batch = envista::normalize(cfg, &input.site, &input.envista);

    let records = merge::merge(mode, &aqs_batch.observations, &envista_batch.observations);

    let mut frequencies = aqs_batch.frequencies;
    frequencies.extend(envista_batch.frequencies);

    HourlyResult {
        records,
        frequencies,
    }
}

/// Runs the normalize-and-merge stage for every site of a pollutant
/// variant.
///
/// A site without a monitor-table row aborts the whole variant: no query
/// could have been constructed for it. Anything less is handled per site.
pub fn run_hourly(
    cfg: &PipelineConfig,
    run: &PollutantRun,
    metadata: &[SiteMetadata],
    inputs: &[SiteInput],
) -> Result<HourlyResult, PipelineError> {
    let meta_by_site: BTreeMap<&str, &SiteMetadata> =
        metadata.iter().map(|m| (m.site.as_str(), m)).collect();

    let mut result = HourlyResult::default();

    for input in inputs {
        let meta = meta_by_site.get(input.site.as_str()).ok_or_else(|| {
            PipelineError::MetadataMissing {
                site: input.site.clone(),
            }
        })?;

        let site_result = process_site(cfg, run.mode, meta.method_code, input);
        info!(
            site = %input.site,
            pollutant = %run.pollutant,
            year = run.year,
            records = site_result.records.len(),
            "site merged"
        );

        result.records.extend(site_result.records);
        result.frequencies.extend(site_result.frequencies);
    }

    info!(
        pollutant = %run.pollutant,
        year = run.year,
        frequencies = ?result.frequencies,
        "distinct sample-frequency labels"
    );

    Ok(result)
}

/// Runs the aggregation stage: hourly-like records take the averaging path
/// (or the ozone 8-hour path), non-hourly-like records partition straight
/// into the daily table. Smoke labels are attached afterwards.
pub fn run_daily(
    cfg: &PipelineConfig,
    run: &PollutantRun,
    merged: &[MergedRecord],
    smoke: &[SmokeLabel],
) -> Vec<DailyAggregate> {
    let (hourly, non_hourly): (Vec<MergedRecord>, Vec<MergedRecord>) =
        merged.iter().cloned().partition(|r| {
            frequency::classify(&cfg.hourly_like, &r.sample_frequency)
                == SamplingCadence::HourlyLike
        });

    let mut aggregates = if is_ozone(&run.pollutant) {
        ozone::ozone_daily_max(&hourly, run.year, cfg.design_limit)
    } else {
        daily::daily_averages(&hourly)
    };
    aggregates.extend(daily::daily_from_samples(&non_hourly));

    attach_smoke_labels(&mut aggregates, smoke);

    info!(
        pollutant = %run.pollutant,
        year = run.year,
        rows = aggregates.len(),
        "daily aggregation complete"
    );

    aggregates
}

/// Propagates wildfire flags from resolved PM2.5 hierarchy rows to a
/// target pollutant's daily series. Must run after both pollutants'
/// aggregation has completed.
pub fn run_wildfire(
    target_daily: &[DailyAggregate],
    hierarchy: &[HierarchyResult],
) -> Vec<WildfireFlag> {
    let targets = wildfire::targets_from_daily(target_daily);
    let donors = wildfire::donors_from_hierarchy(hierarchy);
    let flagged = wildfire::propagate(targets, &donors);

    let borrowed = flagged.iter().filter(|f| f.surrogate_site.is_some()).count();
    info!(targets = flagged.len(), borrowed, "wildfire flag propagation complete");

    flagged
}

pub fn is_ozone(pollutant: &str) -> bool {
    let p = pollutant.to_lowercase();
    p.contains("ozone") || p == "44201"
}

fn attach_smoke_labels(aggregates: &mut [DailyAggregate], smoke: &[SmokeLabel]) {
    if smoke.is_empty() {
        return;
    }
    let by_key: BTreeMap<(&str, NaiveDate), &str> = smoke
        .iter()
        .map(|s| ((s.site.as_str(), s.date), s.label.as_str()))
        .collect();

    for aggregate in aggregates {
        if aggregate.smoke_flag.is_none() {
            if let Some(label) = by_key.get(&(aggregate.site.as_str(), aggregate.date)) {
                aggregate.smoke_flag = Some(label.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataSource;

    fn metadata(site: &str) -> SiteMetadata {
        SiteMetadata {
            site: site.to_string(),
            station_id: "410332011".to_string(),
            site_name: None,
            address: None,
            region: None,
            latitude: Some(45.0),
            longitude: Some(-123.0),
            method_code: Some(170),
        }
    }

    fn aqs_row(hour: u32, value: Option<f64>) -> aqs::RawAqsRow {
        aqs::RawAqsRow {
            date_local: "2024-03-05".to_string(),
            time_local: Some(format!("{hour:02}:00")),
            sample_measurement: value,
            units_of_measure: Some("Micrograms/cubic meter (LC)".to_string()),
            qualifier: None,
            method_code: Some(170),
            poc: Some(1),
            sample_frequency: Some("hourly".to_string()),
            parameter_name: Some("PM2.5 - Local Conditions".to_string()),
            latitude: Some(45.0),
            longitude: Some(-123.0),
        }
    }

    fn envista_row(hour_end: u32, value: Option<f64>) -> envista::RawEnvistaRow {
        envista::RawEnvistaRow {
            datetime: format!("2024-03-05 {hour_end:02}:00"),
            value,
            units: Some("Micrograms/cubic meter (LC)".to_string()),
            status: Some("OK".to_string()),
            resolution: Some("hourly".to_string()),
            method_code: Some(170),
            channel: Some(1),
            sample_frequency: Some("hourly".to_string()),
            parameter: Some("PM2.5 - Local Conditions".to_string()),
            latitude: Some(45.0),
            longitude: Some(-123.0),
        }
    }

    fn run() -> PollutantRun {
        PollutantRun {
            pollutant: "pm25".to_string(),
            year: 2024,
            mode: MergeMode::Both,
        }
    }

    #[test]
    fn test_missing_metadata_aborts_variant() {
        let cfg = PipelineConfig::default();
        let inputs = vec![SiteInput {
            site: "psp".to_string(),
            aqs: vec![aqs_row(1, Some(8.0))],
            envista: vec![],
        }];

        let err = run_hourly(&cfg, &run(), &[], &inputs).unwrap_err();
        assert!(matches!(err, PipelineError::MetadataMissing { .. }));
    }

    #[test]
    fn test_hourly_merges_with_envista_fallback() {
        let cfg = PipelineConfig::default();
        let inputs = vec![SiteInput {
            site: "psp".to_string(),
            // AQS hour 1 present, hour 2 missing.
            aqs: vec![aqs_row(1, Some(8.0)), aqs_row(2, None)],
            // Envista interval-end 03:00 covers hour 2.
            envista: vec![envista_row(3, Some(9.5))],
        }];

        let result = run_hourly(&cfg, &run(), &[metadata("psp")], &inputs).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].best_source, DataSource::Aqs);
        assert_eq!(result.records[1].best_source, DataSource::Envista);
        assert_eq!(result.records[1].best_value, 9.5);
        assert!(result.frequencies.contains("hourly"));
    }

    #[test]
    fn test_daily_stage_attaches_smoke_labels() {
        let cfg = PipelineConfig::default();
        let inputs = vec![SiteInput {
            site: "psp".to_string(),
            aqs: (0..24).map(|h| aqs_row(h, Some(10.0))).collect(),
            envista: vec![],
        }];
        let hourly = run_hourly(&cfg, &run(), &[metadata("psp")], &inputs).unwrap();

        let smoke = vec![SmokeLabel {
            site: "psp".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            label: "heavy".to_string(),
        }];
        let aggregates = run_daily(&cfg, &run(), &hourly.records, &smoke);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].mean, Some(10.0));
        assert_eq!(aggregates[0].smoke_flag.as_deref(), Some("heavy"));
    }

    #[test]
    fn test_ozone_run_takes_eight_hour_path() {
        let cfg = PipelineConfig::default();
        let ozone_run = PollutantRun {
            pollutant: "ozone".to_string(),
            year: 2024,
            mode: MergeMode::AqsOnly,
        };
        let mut rows: Vec<aqs::RawAqsRow> = (0..24).map(|h| aqs_row(h, Some(40.0))).collect();
        for row in &mut rows {
            row.parameter_name = Some("Ozone".to_string());
            row.units_of_measure = Some("Parts per billion".to_string());
            row.method_code = Some(87);
        }
        let inputs = vec![SiteInput {
            site: "psp".to_string(),
            aqs: rows,
            envista: vec![],
        }];
        let hourly = run_hourly(&cfg, &ozone_run, &[metadata("psp")], &inputs).unwrap();
        let aggregates = run_daily(&cfg, &ozone_run, &hourly.records, &[]);

        assert_eq!(aggregates.len(), 1);
        // Flat 40 ppb day: every trailing window at cycle positions 8..=24
        // is fully populated and averages 40, giving 17 computable values.
        assert_eq!(aggregates[0].max, Some(40.0));
        assert_eq!(aggregates[0].obs_count, 17);
        assert_eq!(aggregates[0].mean, None);
    }

    #[test]
    fn test_non_hourly_records_partition_to_daily_table() {
        let cfg = PipelineConfig::default();
        let mut sample = aqs_row(0, Some(35.25));
        sample.sample_frequency = Some("every 3rd day".to_string());
        let inputs = vec![SiteInput {
            site: "psp".to_string(),
            aqs: vec![sample],
            envista: vec![],
        }];
        let hourly = run_hourly(&cfg, &run(), &[metadata("psp")], &inputs).unwrap();
        let aggregates = run_daily(&cfg, &run(), &hourly.records, &[]);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].mean, Some(35.25));
        assert_eq!(aggregates[0].missing_obs, 0);
        assert_eq!(aggregates[0].method_code, crate::model::METHOD_SENTINEL);
    }
}
