//! PM2.5 instrument-hierarchy resolution.
//!
//! Daily values produced by multiple instrument types at one site are
//! pivoted into per-tier columns and resolved to a single authoritative
//! value by fixed priority: regulatory-grade BAM first, nephelometer
//! second, low-cost sensor last. The first non-missing value in that order
//! wins, regardless of recency or count.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::aqi::{self, BreakpointVersion};
use crate::config::PipelineConfig;
use crate::model::{DailyAggregate, HierarchyResult, MethodTier, SiteMetadata};

/// Per-tier detail retained for audit.
#[derive(Debug, Clone, Default)]
struct TierColumns {
    value: Option<f64>,
    aqi: Option<i32>,
    aqi_legacy: Option<i32>,
    category: Option<String>,
    category_legacy: Option<String>,
    poc: Option<i32>,
    smoke_flag: Option<String>,
    sample_frequency: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Resolves one authoritative PM2.5 value per (site, date) from the daily
/// aggregates of all instrument methods at that site.
pub fn resolve_pm25(
    cfg: &PipelineConfig,
    daily: &[DailyAggregate],
    metadata: &[SiteMetadata],
) -> Vec<HierarchyResult> {
    let meta_by_site: BTreeMap<&str, &SiteMetadata> =
        metadata.iter().map(|m| (m.site.as_str(), m)).collect();

    let mut pivoted: BTreeMap<(String, NaiveDate), BTreeMap<MethodTier, TierColumns>> =
        BTreeMap::new();

    for row in daily {
        let Some(&tier) = cfg.method_tiers.get(&row.method_code) else {
            warn!(
                site = %row.site,
                method_code = row.method_code,
                "method code has no hierarchy tier, excluded from resolution"
            );
            continue;
        };

        let tiers = pivoted.entry((row.site.clone(), row.date)).or_default();
        let columns = tiers.entry(tier).or_default();

        // First non-missing value per tier wins; later duplicates are audit
        // noise, not a second chance.
        if columns.value.is_some() && row.mean.is_some() {
            warn!(site = %row.site, date = %row.date, tier = tier.label(),
                "duplicate daily value for tier, keeping first");
            continue;
        }
        if columns.value.is_none() {
            columns.value = row.mean;
            columns.aqi = row.mean.and_then(|v| aqi::pm25_aqi(v, BreakpointVersion::Current));
            columns.aqi_legacy =
                row.mean.and_then(|v| aqi::pm25_aqi(v, BreakpointVersion::Legacy));
            columns.category = columns.aqi.map(|a| aqi::category(a).to_string());
            columns.category_legacy = columns.aqi_legacy.map(|a| aqi::category(a).to_string());
            columns.poc = row.parameter_occurrence_code;
        }
        if columns.smoke_flag.is_none() {
            columns.smoke_flag = row.smoke_flag.clone();
        }
        if columns.sample_frequency.is_none() {
            columns.sample_frequency = row.sample_frequency.clone();
        }
        if columns.latitude.is_none() {
            columns.latitude = row.latitude;
            columns.longitude = row.longitude;
        }
    }

    pivoted
        .into_iter()
        .map(|((site, date), tiers)| build_result(site, date, tiers, &meta_by_site))
        .collect()
}

fn build_result(
    site: String,
    date: NaiveDate,
    tiers: BTreeMap<MethodTier, TierColumns>,
    meta_by_site: &BTreeMap<&str, &SiteMetadata>,
) -> HierarchyResult {
    let mut result = HierarchyResult {
        site: site.clone(),
        date,
        ..HierarchyResult::default()
    };

    // First non-missing value in fixed priority order wins.
    for tier in MethodTier::PRIORITY {
        if let Some(columns) = tiers.get(&tier) {
            if result.best_value.is_none() && columns.value.is_some() {
                result.best_value = columns.value;
                result.best_method = Some(tier.label().to_string());
            }
            // Date-level metadata also falls back through the priority order,
            // so the highest-priority instrument's fields win conflicts.
            if result.smoke_flag.is_none() {
                result.smoke_flag = columns.smoke_flag.clone();
            }
            if result.sample_frequency.is_none() {
                result.sample_frequency = columns.sample_frequency.clone();
            }
            if result.latitude.is_none() {
                result.latitude = columns.latitude;
                result.longitude = columns.longitude;
            }
        }
    }

    for (tier, columns) in &tiers {
        match tier {
            MethodTier::Bam => {
                result.bam_value = columns.value;
                result.bam_aqi = columns.aqi;
                result.bam_aqi_legacy = columns.aqi_legacy;
                result.bam_category = columns.category.clone();
                result.bam_category_legacy = columns.category_legacy.clone();
                result.bam_poc = columns.poc;
            }
            MethodTier::Neph => {
                result.neph_value = columns.value;
                result.neph_aqi = columns.aqi;
                result.neph_aqi_legacy = columns.aqi_legacy;
                result.neph_category = columns.category.clone();
                result.neph_category_legacy = columns.category_legacy.clone();
                result.neph_poc = columns.poc;
            }
            MethodTier::Sensor => {
                result.sensor_value = columns.value;
                result.sensor_aqi = columns.aqi;
                result.sensor_aqi_legacy = columns.aqi_legacy;
                result.sensor_category = columns.category.clone();
                result.sensor_category_legacy = columns.category_legacy.clone();
                result.sensor_poc = columns.poc;
            }
        }
    }

    if let Some(meta) = meta_by_site.get(site.as_str()) {
        result.site_name = meta.site_name.clone();
        result.address = meta.address.clone();
        if result.latitude.is_none() {
            result.latitude = meta.latitude;
            result.longitude = meta.longitude;
        }
    }

    result
}
