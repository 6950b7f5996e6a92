//! Normalizer for the Envista network (fallback source).
//!
//! Envista timestamps mark the *end* of the sampling interval. They are
//! shifted backward by the interval length (5 minutes, 1 hour, or 1 day,
//! selected by the record's own resolution tag) so that they become
//! interval-start markers matching the AQS convention.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::model::{DataSource, Observation, standard_offset};
use crate::normalize::{NormalizedBatch, convert_units};

/// One raw row as returned by the Envista client collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvistaRow {
    /// Interval-end timestamp, `YYYY-MM-DD HH:MM` or ISO `T` form.
    pub datetime: String,
    pub value: Option<f64>,
    pub units: Option<String>,
    pub status: Option<String>,
    /// Resolution tag: "5min", "hourly", or "daily".
    pub resolution: Option<String>,
    pub method_code: Option<i32>,
    pub channel: Option<i32>,
    pub sample_frequency: Option<String>,
    pub parameter: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Normalizes one site's Envista rows into the common schema.
pub fn normalize(cfg: &PipelineConfig, site: &str, rows: &[RawEnvistaRow]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    if rows.is_empty() {
        warn!(site, source = "envista", "no raw rows for site");
        return batch;
    }

    for row in rows {
        let Some(interval_end) = parse_datetime(&row.datetime) else {
            warn!(site, datetime = %row.datetime, "unparseable Envista timestamp, skipping row");
            continue;
        };
        let timestamp = interval_end - interval_length(site, row.resolution.as_deref());

        let sample_frequency = frequency_label(row);
        let pollutant_name = row.parameter.clone().unwrap_or_default().to_lowercase();
        let unit = row.units.clone().unwrap_or_default();
        let (value, unit) = convert_units(&pollutant_name, row.value, &unit);

        batch.frequencies.insert(sample_frequency.clone());
        batch.observations.push(Observation {
            timestamp,
            site: site.to_lowercase(),
            value,
            unit,
            qualifier_simple: cfg
                .qualifiers
                .simplify(DataSource::Envista, row.status.as_deref()),
            qualifier_raw: row.status.clone(),
            data_source: DataSource::Envista,
            sample_frequency,
            method_code: row.method_code,
            parameter_occurrence_code: row.channel,
            pollutant_name,
            latitude: row.latitude,
            longitude: row.longitude,
        });
    }

    batch
}

fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    standard_offset().from_local_datetime(&naive).single()
}

/// Interval length selected by the record's own resolution tag. An
/// unrecognized tag falls back to hourly, the network's assumed cadence.
fn interval_length(site: &str, resolution: Option<&str>) -> Duration {
    match resolution.map(|r| r.trim().to_lowercase()).as_deref() {
        Some("5min") | Some("5 min") | Some("5 minutes") => Duration::minutes(5),
        Some("daily") | Some("day") => Duration::days(1),
        Some("hourly") | Some("hour") | Some("60min") | None => Duration::hours(1),
        Some(other) => {
            warn!(site, resolution = other, "unrecognized resolution tag, assuming hourly");
            Duration::hours(1)
        }
    }
}

/// Cleaned frequency label; rows without one inherit it from the resolution
/// tag so daily samples do not masquerade as hourly.
fn frequency_label(row: &RawEnvistaRow) -> String {
    match row.sample_frequency.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => match row.resolution.as_deref().map(|r| r.trim().to_lowercase()).as_deref() {
            Some("daily") | Some("day") => "daily".to_string(),
            _ => "hourly".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(datetime: &str, resolution: Option<&str>, value: Option<f64>) -> RawEnvistaRow {
        RawEnvistaRow {
            datetime: datetime.to_string(),
            value,
            units: Some("ppm".to_string()),
            status: Some("OK".to_string()),
            resolution: resolution.map(str::to_string),
            method_code: Some(771),
            channel: Some(3),
            sample_frequency: None,
            parameter: Some("Ozone".to_string()),
            latitude: Some(45.0),
            longitude: Some(-123.0),
        }
    }

    #[test]
    fn test_hourly_interval_end_shifts_back_one_hour() {
        let cfg = PipelineConfig::default();
        let batch = normalize(&cfg, "psp", &[row("2024-03-05 14:00", Some("hourly"), Some(0.04))]);
        let obs = &batch.observations[0];
        assert_eq!(obs.timestamp.to_rfc3339(), "2024-03-05T13:00:00-08:00");
    }

    #[test]
    fn test_five_minute_and_daily_shifts() {
        let cfg = PipelineConfig::default();
        let batch = normalize(
            &cfg,
            "psp",
            &[
                row("2024-03-05 14:05", Some("5min"), Some(0.04)),
                row("2024-03-06 00:00", Some("daily"), Some(0.03)),
            ],
        );
        assert_eq!(
            batch.observations[0].timestamp.to_rfc3339(),
            "2024-03-05T14:00:00-08:00"
        );
        assert_eq!(
            batch.observations[1].timestamp.to_rfc3339(),
            "2024-03-05T00:00:00-08:00"
        );
    }

    #[test]
    fn test_unrecognized_resolution_assumed_hourly() {
        let cfg = PipelineConfig::default();
        let batch = normalize(&cfg, "psp", &[row("2024-03-05 14:00", Some("weekly?"), Some(0.04))]);
        assert_eq!(
            batch.observations[0].timestamp.to_rfc3339(),
            "2024-03-05T13:00:00-08:00"
        );
    }

    #[test]
    fn test_ozone_ppm_converted_to_ppb() {
        let cfg = PipelineConfig::default();
        let batch = normalize(&cfg, "psp", &[row("2024-03-05 14:00", None, Some(0.04))]);
        let obs = &batch.observations[0];
        assert!((obs.value.unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(obs.unit, "parts per billion");
    }

    #[test]
    fn test_daily_resolution_labels_daily() {
        let cfg = PipelineConfig::default();
        let batch = normalize(&cfg, "psp", &[row("2024-03-06 00:00", Some("daily"), Some(0.03))]);
        assert_eq!(batch.observations[0].sample_frequency, "daily");
        assert!(batch.frequencies.contains("daily"));
    }

    #[test]
    fn test_empty_input_is_empty_batch() {
        let cfg = PipelineConfig::default();
        let batch = normalize(&cfg, "psp", &[]);
        assert!(batch.observations.is_empty());
    }
}
