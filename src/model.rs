//! Data types flowing through the reconciliation pipeline.
//!
//! Missing measurements are `Option<f64>` everywhere: absence is `None`,
//! zero is a legitimate value (the 8-hour ozone rule substitutes zeros),
//! and the two are never conflated.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// All timestamps live in a fixed UTC-8 offset. No daylight-saving shifts.
pub fn standard_offset() -> FixedOffset {
    // 8 hours west of UTC is always a valid offset
    FixedOffset::west_opt(8 * 3600).unwrap()
}

/// Method code assigned to non-hourly records, which bypass method filtering.
pub const METHOD_SENTINEL: i32 = -9999;

/// Which monitoring network a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// EPA AQS network, the primary source.
    Aqs,
    /// Envista network, the fallback source.
    Envista,
}

/// Instrument tier for PM2.5 hierarchy resolution, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodTier {
    /// Regulatory-grade beta-attenuation monitor or equivalent.
    Bam,
    /// Nephelometer.
    Neph,
    /// Low-cost sensor.
    Sensor,
}

impl MethodTier {
    /// Fixed resolution order: regulatory grade first, sensors last.
    pub const PRIORITY: [MethodTier; 3] = [MethodTier::Bam, MethodTier::Neph, MethodTier::Sensor];

    pub fn label(self) -> &'static str {
        match self {
            MethodTier::Bam => "bam",
            MethodTier::Neph => "neph",
            MethodTier::Sensor => "sensor",
        }
    }
}

/// One instrument reading in the common schema produced by the normalizers.
///
/// Invariant: one `Observation` per (site, pollutant, data_source, timestamp).
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub timestamp: DateTime<FixedOffset>,
    /// Normalized site identifier (lowercase short code).
    pub site: String,
    pub value: Option<f64>,
    pub unit: String,
    pub qualifier_raw: Option<String>,
    pub qualifier_simple: String,
    pub data_source: DataSource,
    /// Cleaned free-text cadence label, e.g. "hourly", "every 3rd day".
    pub sample_frequency: String,
    pub method_code: Option<i32>,
    pub parameter_occurrence_code: Option<i32>,
    pub pollutant_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One resolved value per (site, pollutant, timestamp) after source
/// precedence. Both raw source values are retained for audit. Rows where
/// both sources were missing are dropped by the merger, so `best_value`
/// is always present.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub site: String,
    pub pollutant_name: String,
    pub aqs_value: Option<f64>,
    pub envista_value: Option<f64>,
    pub best_value: f64,
    pub best_source: DataSource,
    pub unit: String,
    pub qualifier: String,
    pub method_code: Option<i32>,
    pub parameter_occurrence_code: Option<i32>,
    pub sample_frequency: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One row per (site, pollutant, method, calendar day).
///
/// Created by the aggregation engine and consumed, never mutated, by the
/// hierarchy resolver and the flag propagator. Statistic fields are `None`
/// when the day had no valid contributing hours.
#[derive(Debug, Clone, Serialize)]
pub struct DailyAggregate {
    pub site: String,
    pub pollutant_name: String,
    pub method_code: i32,
    pub parameter_occurrence_code: Option<i32>,
    pub date: NaiveDate,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Count of contributing non-missing observations.
    pub obs_count: usize,
    /// `24 - obs_count` for hourly aggregates, 0 for direct daily samples.
    pub missing_obs: i32,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub data_source: DataSource,
    pub sample_frequency: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Satellite smoke-intensity label attached by the pipeline, if any.
    pub smoke_flag: Option<String>,
}

/// One row per (site, date) with the authoritative PM2.5 value, the
/// instrument tier that produced it, and per-tier detail columns kept
/// for audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchyResult {
    pub site: String,
    pub date: NaiveDate,
    pub best_value: Option<f64>,
    /// Label of the winning tier: "bam", "neph", or "sensor".
    pub best_method: Option<String>,

    pub bam_value: Option<f64>,
    pub bam_aqi: Option<i32>,
    pub bam_aqi_legacy: Option<i32>,
    pub bam_category: Option<String>,
    pub bam_category_legacy: Option<String>,
    pub bam_poc: Option<i32>,

    pub neph_value: Option<f64>,
    pub neph_aqi: Option<i32>,
    pub neph_aqi_legacy: Option<i32>,
    pub neph_category: Option<String>,
    pub neph_category_legacy: Option<String>,
    pub neph_poc: Option<i32>,

    pub sensor_value: Option<f64>,
    pub sensor_aqi: Option<i32>,
    pub sensor_aqi_legacy: Option<i32>,
    pub sensor_category: Option<String>,
    pub sensor_category_legacy: Option<String>,
    pub sensor_poc: Option<i32>,

    // Date-invariant site metadata, re-attached after the pivot.
    pub site_name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub smoke_flag: Option<String>,
    pub sample_frequency: Option<String>,
}

/// Smoke-impact flag per (site, date). When the flag was borrowed from the
/// nearest same-day site of another pollutant, the `surrogate_*` fields
/// record where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct WildfireFlag {
    pub site: String,
    pub date: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub smoke_flag: Option<String>,
    pub best_value: Option<f64>,
    pub best_method: Option<String>,
    pub surrogate_site: Option<String>,
    pub surrogate_value: Option<f64>,
    pub surrogate_method: Option<String>,
}

/// Per-site monitor metadata supplied by the external metadata-merge
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub site: String,
    pub station_id: String,
    pub site_name: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Last-known regulatory method code, used for AQS method filtering.
    pub method_code: Option<i32>,
}

/// Satellite smoke-intensity label for one site and day, handed to the
/// pipeline by the (external) smoke-polygon lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeLabel {
    pub site: String,
    pub date: NaiveDate,
    /// Intensity label, e.g. "light", "medium", "heavy".
    pub label: String,
}
