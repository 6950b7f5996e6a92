//! CSV export of the three output shapes: hourly merged tables, daily
//! aggregate tables, and hierarchy/wildfire tables.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

/// Appends rows to a CSV file, creating it with headers if it does not
/// already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes rows to a CSV file, replacing any existing content.
pub fn write_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    debug!(path, rows = rows.len(), "writing CSV file");

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
