//! Normalizer for the AQS network (primary source).
//!
//! AQS reports separate local date and time columns. The timestamp is the
//! combination of the two only for hourly-like records; non-hourly records
//! (daily filter samples, "every Nth day" schedules) are pinned to midnight
//! of the reported date, bypass method filtering, and carry the method
//! sentinel.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::frequency::{self, SamplingCadence};
use crate::model::{DataSource, METHOD_SENTINEL, Observation};
use crate::normalize::{NormalizedBatch, convert_units, local_datetime, local_midnight};

/// One raw row as returned by the AQS client collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAqsRow {
    pub date_local: String,
    pub time_local: Option<String>,
    pub sample_measurement: Option<f64>,
    pub units_of_measure: Option<String>,
    pub qualifier: Option<String>,
    pub method_code: Option<i32>,
    pub poc: Option<i32>,
    pub sample_frequency: Option<String>,
    pub parameter_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Normalizes one site's AQS rows into the common schema.
///
/// `requested_method` is the site's last-known regulatory method code from
/// the monitor table. When that code occurs among the hourly-like rows, only
/// rows whose method equals it (or is missing) are kept; otherwise all rows
/// are kept and the skip is logged.
pub fn normalize(
    cfg: &PipelineConfig,
    site: &str,
    requested_method: Option<i32>,
    rows: &[RawAqsRow],
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    if rows.is_empty() {
        warn!(site, source = "aqs", "no raw rows for site");
        return batch;
    }

    for row in rows {
        let sample_frequency = frequency::clean_label(row.sample_frequency.as_deref());
        let cadence = frequency::classify(&cfg.hourly_like, &sample_frequency);

        let timestamp = match cadence {
            SamplingCadence::HourlyLike => {
                local_datetime(&row.date_local, row.time_local.as_deref().unwrap_or("00:00"))
            }
            SamplingCadence::NonHourly => local_midnight(&row.date_local),
        };
        let Some(timestamp) = timestamp else {
            warn!(
                site,
                date = %row.date_local,
                time = row.time_local.as_deref().unwrap_or(""),
                "unparseable AQS timestamp, skipping row"
            );
            continue;
        };

        let pollutant_name = row
            .parameter_name
            .clone()
            .unwrap_or_default()
            .to_lowercase();
        let unit = row.units_of_measure.clone().unwrap_or_default();
        let (value, unit) = convert_units(&pollutant_name, row.sample_measurement, &unit);

        let method_code = match cadence {
            SamplingCadence::HourlyLike => row.method_code,
            SamplingCadence::NonHourly => Some(METHOD_SENTINEL),
        };

        batch.frequencies.insert(sample_frequency.clone());
        batch.observations.push(Observation {
            timestamp,
            site: site.to_lowercase(),
            value,
            unit,
            qualifier_simple: cfg
                .qualifiers
                .simplify(DataSource::Aqs, row.qualifier.as_deref()),
            qualifier_raw: row.qualifier.clone(),
            data_source: DataSource::Aqs,
            sample_frequency,
            method_code,
            parameter_occurrence_code: row.poc,
            pollutant_name,
            latitude: row.latitude,
            longitude: row.longitude,
        });
    }

    apply_method_filter(cfg, site, requested_method, &mut batch.observations);

    batch
}

/// Keeps only hourly-like observations matching the requested method code
/// when that code actually occurs in the data. Non-hourly observations are
/// never filtered.
fn apply_method_filter(
    cfg: &PipelineConfig,
    site: &str,
    requested_method: Option<i32>,
    observations: &mut Vec<Observation>,
) {
    let Some(requested) = requested_method else {
        return;
    };

    let requested_present = observations.iter().any(|o| {
        frequency::classify(&cfg.hourly_like, &o.sample_frequency) == SamplingCadence::HourlyLike
            && o.method_code == Some(requested)
    });

    if !requested_present {
        debug!(
            site,
            requested_method = requested,
            "requested method code not present in returned rows, keeping all"
        );
        return;
    }

    observations.retain(|o| {
        frequency::classify(&cfg.hourly_like, &o.sample_frequency) == SamplingCadence::NonHourly
            || o.method_code.is_none()
            || o.method_code == Some(requested)
    });
}
