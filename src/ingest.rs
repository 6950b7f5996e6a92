//! Readers for the tables handed over by the external collaborators.
//!
//! Raw network tables arrive one CSV per site under
//! `<input>/<pollutant>/site=<id>/{aqs,envista}.csv`. An absent or empty
//! file is a valid terminal outcome for that site (warn, empty result); a
//! present file missing a required column is a schema mismatch, fatal for
//! that site's processing unit.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::PipelineError;
use crate::model::{SiteMetadata, SmokeLabel};
use crate::normalize::aqs::RawAqsRow;
use crate::normalize::envista::RawEnvistaRow;
use crate::qualifiers::QualifierMap;

/// Reads one site's raw AQS table. Missing file → empty table.
pub fn read_aqs_rows(path: &Path, site: &str) -> Result<Vec<RawAqsRow>, PipelineError> {
    read_site_table(path, site, &["date_local", "sample_measurement"])
}

/// Reads one site's raw Envista table. Missing file → empty table.
pub fn read_envista_rows(path: &Path, site: &str) -> Result<Vec<RawEnvistaRow>, PipelineError> {
    read_site_table(path, site, &["datetime", "value"])
}

fn read_site_table<T: DeserializeOwned>(
    path: &Path,
    site: &str,
    required: &[&str],
) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        warn!(site, path = %path.display(), "raw table absent, treating as empty");
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(PipelineError::SchemaMismatch {
                site: site.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }

    if rows.is_empty() {
        warn!(site, path = %path.display(), "raw table has no rows");
    }

    Ok(rows)
}

/// Reads the per-site monitor table produced by the metadata-merge
/// collaborator. This table is load-bearing: without it no site query can
/// be constructed, so a read failure is fatal for the pollutant variant.
pub fn read_site_metadata(path: &Path) -> Result<Vec<SiteMetadata>, PipelineError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows: Vec<SiteMetadata> = Vec::new();
    for result in reader.deserialize() {
        let mut row: SiteMetadata = result?;
        row.site = row.site.trim().to_lowercase();
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct QualifierRow {
    network: String,
    code: String,
    simple: String,
}

/// Reads the two-column qualifier lookup (raw code per network →
/// simplified qualifier). Missing file → compiled defaults.
pub fn read_qualifier_map(path: &Path) -> Result<QualifierMap, PipelineError> {
    if !path.exists() {
        warn!(path = %path.display(), "qualifier lookup absent, using defaults");
        return Ok(QualifierMap::default());
    }

    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut aqs = Vec::new();
    let mut envista = Vec::new();
    for result in reader.deserialize() {
        let row: QualifierRow = result?;
        let entry = (row.code.to_lowercase(), row.simple.to_lowercase());
        match row.network.to_lowercase().as_str() {
            "aqs" => aqs.push(entry),
            "envista" => envista.push(entry),
            other => warn!(network = other, "unknown network in qualifier lookup, ignoring"),
        }
    }

    Ok(QualifierMap::new(aqs, envista))
}

/// Reads the satellite smoke-intensity labels, one per (site, date).
/// Missing file → no labels; flags will rely on donor propagation.
pub fn read_smoke_labels(path: &Path) -> Result<Vec<SmokeLabel>, PipelineError> {
    if !path.exists() {
        warn!(path = %path.display(), "smoke label table absent");
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows: Vec<SmokeLabel> = Vec::new();
    for result in reader.deserialize() {
        let mut row: SmokeLabel = result?;
        row.site = row.site.trim().to_lowercase();
        rows.push(row);
    }
    Ok(rows)
}

/// Lists site ids found as `site=<id>` directories under a pollutant's
/// input directory.
pub fn discover_sites(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut sites = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(site) = name.strip_prefix("site=") {
                    sites.push(site.to_lowercase());
                }
            }
        }
    }

    sites.sort();
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_file_is_empty_not_error() {
        let rows = read_aqs_rows(Path::new("/nonexistent/aqs.csv"), "psp").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_schema_mismatch_named_column() {
        let dir = temp_dir("aq_reconciler_test_schema");
        let path = dir.join("aqs.csv");
        fs::write(&path, "site,value\npsp,1.0\n").unwrap();

        let err = read_aqs_rows(&path, "psp").unwrap_err();
        match err {
            PipelineError::SchemaMismatch { site, column } => {
                assert_eq!(site, "psp");
                assert_eq!(column, "date_local");
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_read_aqs_rows_with_missing_values() {
        let dir = temp_dir("aq_reconciler_test_aqs_rows");
        let path = dir.join("aqs.csv");
        fs::write(
            &path,
            "date_local,time_local,sample_measurement,units_of_measure,qualifier,method_code,poc,sample_frequency,parameter_name,latitude,longitude\n\
             2024-03-05,01:00,8.1,Micrograms/cubic meter (LC),,170,1,HOURLY,PM2.5 - Local Conditions,45.0,-123.0\n\
             2024-03-05,02:00,,Micrograms/cubic meter (LC),,170,1,HOURLY,PM2.5 - Local Conditions,45.0,-123.0\n",
        )
        .unwrap();

        let rows = read_aqs_rows(&path, "psp").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sample_measurement, Some(8.1));
        assert_eq!(rows[1].sample_measurement, None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_qualifier_map_round_trip() {
        let dir = temp_dir("aq_reconciler_test_qualifiers");
        let path = dir.join("qualifiers.csv");
        fs::write(&path, "network,code,simple\naqs,W,wildfire\nenvista,CAL,calibration\n").unwrap();

        let map = read_qualifier_map(&path).unwrap();
        assert_eq!(
            map.simplify(crate::model::DataSource::Aqs, Some("W region")),
            "wildfire"
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_discover_sites() {
        let dir = temp_dir("aq_reconciler_test_sites");
        fs::create_dir_all(dir.join("site=PSP")).unwrap();
        fs::create_dir_all(dir.join("site=rvo")).unwrap();
        fs::create_dir_all(dir.join("other")).unwrap();

        let sites = discover_sites(&dir).unwrap();
        assert_eq!(sites, vec!["psp".to_string(), "rvo".to_string()]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
