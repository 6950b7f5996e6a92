//! Wildfire-smoke flag propagation.
//!
//! Fills missing smoke-impact flags at one pollutant's sites using the
//! nearest same-day flagged site of a donor pollutant (typically PM2.5's
//! hierarchy result). Distance is planar Euclidean in latitude/longitude
//! degrees, no great-circle correction. Rows that already carry a flag are
//! never overwritten.

use crate::model::{DailyAggregate, HierarchyResult, WildfireFlag};

/// Builds the donor side from resolved PM2.5 hierarchy rows.
pub fn donors_from_hierarchy(results: &[HierarchyResult]) -> Vec<WildfireFlag> {
    results
        .iter()
        .map(|r| WildfireFlag {
            site: r.site.clone(),
            date: r.date,
            latitude: r.latitude,
            longitude: r.longitude,
            smoke_flag: r.smoke_flag.clone(),
            best_value: r.best_value,
            best_method: r.best_method.clone(),
            surrogate_site: None,
            surrogate_value: None,
            surrogate_method: None,
        })
        .collect()
}

/// Builds the target side from a pollutant's daily aggregates, one row per
/// (site, date). Duplicate method rows for the same site and day collapse
/// to the first.
pub fn targets_from_daily(daily: &[DailyAggregate]) -> Vec<WildfireFlag> {
    let mut targets: Vec<WildfireFlag> = Vec::new();

    for row in daily {
        if targets.iter().any(|t| t.site == row.site && t.date == row.date) {
            continue;
        }
        targets.push(WildfireFlag {
            site: row.site.clone(),
            date: row.date,
            latitude: row.latitude,
            longitude: row.longitude,
            smoke_flag: row.smoke_flag.clone(),
            best_value: row.mean.or(row.max),
            best_method: None,
            surrogate_site: None,
            surrogate_value: None,
            surrogate_method: None,
        });
    }

    targets
}

/// Propagates flags from donors to targets that lack one.
///
/// For each unflagged target, donors sharing the same date are scanned in
/// lexical site-id order with a strict-less distance comparison, so exact
/// ties resolve to the lexically smallest donor site deterministically.
/// The nearest donor's flag, best value, and resolving method are copied
/// into the target's surrogate fields.
pub fn propagate(mut targets: Vec<WildfireFlag>, donors: &[WildfireFlag]) -> Vec<WildfireFlag> {
    let mut sorted: Vec<&WildfireFlag> = donors
        .iter()
        .filter(|d| d.smoke_flag.is_some() && d.latitude.is_some() && d.longitude.is_some())
        .collect();
    sorted.sort_by(|a, b| a.site.cmp(&b.site));

    for target in &mut targets {
        if target.smoke_flag.is_some() {
            continue;
        }
        let (Some(lat), Some(lon)) = (target.latitude, target.longitude) else {
            continue;
        };

        let mut nearest: Option<(f64, &WildfireFlag)> = None;
        for donor in sorted.iter().filter(|d| d.date == target.date) {
            let d_lat = donor.latitude.unwrap_or_default() - lat;
            let d_lon = donor.longitude.unwrap_or_default() - lon;
            let distance = (d_lat * d_lat + d_lon * d_lon).sqrt();
            if nearest.is_none_or(|(best, _)| distance < best) {
                nearest = Some((distance, donor));
            }
        }

        if let Some((_, donor)) = nearest {
            target.smoke_flag = donor.smoke_flag.clone();
            target.surrogate_site = Some(donor.site.clone());
            target.surrogate_value = donor.best_value;
            target.surrogate_method = donor.best_method.clone();
        }
    }

    targets
}
