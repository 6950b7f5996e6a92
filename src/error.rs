//! Error taxonomy for the pipeline.
//!
//! Only genuinely fatal conditions are errors. An empty or absent network
//! response is a valid terminal outcome (empty result, logged as a warning),
//! and an aggregate that cannot be computed from the available hours is a
//! missing value in the output, never an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from a raw table. Fatal for that site's
    /// processing unit only.
    #[error("schema mismatch for site {site}: required column `{column}` not present")]
    SchemaMismatch { site: String, column: String },

    /// No monitor-table row exists for a requested site, so no query can be
    /// constructed. Fatal for the whole pollutant-variant run.
    #[error("no monitor metadata row for site {site}")]
    MetadataMissing { site: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
