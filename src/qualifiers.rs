//! Translates each network's raw quality-flag vocabulary into one
//! simplified taxonomy.
//!
//! The raw qualifier string's first whitespace-delimited token is extracted
//! as a short code and looked up per network. Records with no qualifier at
//! all simplify to `"ok"`; an unmapped code passes through as the extracted
//! token so nothing is silently collapsed.

use std::collections::HashMap;

use crate::model::DataSource;

/// Immutable two-column lookup: raw qualifier code per network → simplified
/// qualifier. Built once and passed explicitly so unit tests need no
/// environment setup.
#[derive(Debug, Clone)]
pub struct QualifierMap {
    aqs: HashMap<String, String>,
    envista: HashMap<String, String>,
}

impl QualifierMap {
    pub fn new(
        aqs: impl IntoIterator<Item = (String, String)>,
        envista: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            aqs: aqs.into_iter().collect(),
            envista: envista.into_iter().collect(),
        }
    }

    /// Simplifies a raw qualifier string from one network.
    pub fn simplify(&self, source: DataSource, raw: Option<&str>) -> String {
        let Some(raw) = raw else {
            return "ok".to_string();
        };

        let Some(token) = raw.split_whitespace().next() else {
            return "ok".to_string();
        };
        let token = token.to_lowercase();

        let table = match source {
            DataSource::Aqs => &self.aqs,
            DataSource::Envista => &self.envista,
        };

        table.get(&token).cloned().unwrap_or(token)
    }
}

impl Default for QualifierMap {
    fn default() -> Self {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
        Self {
            aqs: [
                pair("w", "wildfire"),
                pair("e", "exceptional"),
                pair("if", "suspect"),
                pair("ad", "adjusted"),
                pair("x", "invalid"),
            ]
            .into_iter()
            .collect(),
            envista: [
                pair("ok", "ok"),
                pair("cal", "calibration"),
                pair("down", "invalid"),
                pair("nodata", "invalid"),
                pair("maint", "suspect"),
            ]
            .into_iter()
            .collect(),
        }
    }
}
