//! Immutable pipeline configuration.
//!
//! Lookup tables (qualifier maps, the hourly-like label set, method tiers)
//! are plain data passed explicitly through the pipeline rather than
//! process-wide state, so unit tests run deterministically without any
//! environment setup. A JSON loader is provided for deployments that
//! override the compiled defaults.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::frequency;
use crate::model::MethodTier;
use crate::qualifiers::QualifierMap;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub qualifiers: QualifierMap,
    /// Frequency labels treated as hour-resolution.
    pub hourly_like: BTreeSet<String>,
    /// Regulatory threshold (ppb) below which a zero-substituted 8-hour
    /// ozone average is discarded rather than reported.
    pub design_limit: f64,
    /// PM2.5 method code → instrument tier.
    pub method_tiers: BTreeMap<i32, MethodTier>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            qualifiers: QualifierMap::default(),
            hourly_like: frequency::default_hourly_like(),
            design_limit: 70.0,
            method_tiers: [
                (170, MethodTier::Bam),
                (183, MethodTier::Bam),
                (209, MethodTier::Bam),
                (771, MethodTier::Neph),
                (772, MethodTier::Neph),
                (791, MethodTier::Sensor),
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// On-disk representation. Every section is optional; omitted sections keep
/// their compiled defaults.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    aqs_qualifiers: Option<HashMap<String, String>>,
    envista_qualifiers: Option<HashMap<String, String>>,
    hourly_like: Option<Vec<String>>,
    design_limit: Option<f64>,
    /// Keys are method codes; JSON object keys are strings.
    method_tiers: Option<BTreeMap<String, MethodTier>>,
}

impl PipelineConfig {
    /// Loads overrides from a JSON file at `path` on top of the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let file: ConfigFile =
            serde_json::from_str(&content).with_context(|| format!("parsing config file {path}"))?;

        let mut cfg = Self::default();

        if file.aqs_qualifiers.is_some() || file.envista_qualifiers.is_some() {
            cfg.qualifiers = QualifierMap::new(
                file.aqs_qualifiers.unwrap_or_default(),
                file.envista_qualifiers.unwrap_or_default(),
            );
        }
        if let Some(labels) = file.hourly_like {
            cfg.hourly_like = labels.into_iter().map(|l| l.trim().to_lowercase()).collect();
        }
        if let Some(limit) = file.design_limit {
            cfg.design_limit = limit;
        }
        if let Some(tiers) = file.method_tiers {
            let mut parsed = BTreeMap::new();
            for (code, tier) in tiers {
                let code: i32 = code
                    .parse()
                    .with_context(|| format!("method code `{code}` is not an integer"))?;
                parsed.insert(code, tier);
            }
            cfg.method_tiers = parsed;
        }

        Ok(cfg)
    }
}
