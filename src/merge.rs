//! Stream merger: reconciles the two normalized streams into one
//! authoritative record per (site, pollutant, timestamp).
//!
//! This is an asymmetric precedence join on exact timestamp equality, not
//! an average: where AQS has a non-missing value its whole row wins; else
//! Envista's; else the timestamp is dropped. Exactly one source's fields
//! are selected per timestamp, never blended.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use crate::model::{DataSource, MergedRecord, Observation};

/// Which datastreams participate in the merge. Single-source modes are a
/// straight pass-through with the same output schema, so downstream
/// components never special-case single-source input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Both,
    AqsOnly,
    EnvistaOnly,
}

impl MergeMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "both" => Some(MergeMode::Both),
            "aqs" => Some(MergeMode::AqsOnly),
            "envista" => Some(MergeMode::EnvistaOnly),
            _ => None,
        }
    }
}

/// Merges the AQS (primary) and Envista (fallback) streams under `mode`.
pub fn merge(mode: MergeMode, aqs: &[Observation], envista: &[Observation]) -> Vec<MergedRecord> {
    match mode {
        MergeMode::Both => merge_streams(aqs, envista),
        MergeMode::AqsOnly => merge_streams(aqs, &[]),
        MergeMode::EnvistaOnly => merge_streams(&[], envista),
    }
}

/// Full outer join on (site, timestamp) with AQS precedence.
pub fn merge_streams(aqs: &[Observation], envista: &[Observation]) -> Vec<MergedRecord> {
    type Key = (String, DateTime<FixedOffset>);

    let mut joined: BTreeMap<Key, (Option<&Observation>, Option<&Observation>)> = BTreeMap::new();

    for obs in aqs {
        let entry = joined
            .entry((obs.site.clone(), obs.timestamp))
            .or_insert((None, None));
        entry.0 = Some(obs);
    }
    for obs in envista {
        let entry = joined
            .entry((obs.site.clone(), obs.timestamp))
            .or_insert((None, None));
        entry.1 = Some(obs);
    }

    let mut records = Vec::with_capacity(joined.len());

    for ((_, _), (a, b)) in joined {
        let aqs_value = a.and_then(|o| o.value);
        let envista_value = b.and_then(|o| o.value);

        // Precedence: AQS non-missing wins outright; both missing drops the row.
        let (best, best_value, best_source) = if let (Some(obs), Some(v)) = (a, aqs_value) {
            (obs, v, DataSource::Aqs)
        } else if let (Some(obs), Some(v)) = (b, envista_value) {
            (obs, v, DataSource::Envista)
        } else {
            continue;
        };

        records.push(MergedRecord {
            timestamp: best.timestamp,
            site: best.site.clone(),
            pollutant_name: best.pollutant_name.clone(),
            aqs_value,
            envista_value,
            best_value,
            best_source,
            unit: best.unit.clone(),
            qualifier: best.qualifier_simple.clone(),
            method_code: best.method_code,
            parameter_occurrence_code: best.parameter_occurrence_code,
            sample_frequency: best.sample_frequency.clone(),
            latitude: best.latitude,
            longitude: best.longitude,
        });
    }

    records
}
