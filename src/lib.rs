pub mod aggregate;
pub mod aqi;
pub mod config;
pub mod error;
pub mod frequency;
pub mod hierarchy;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod qualifiers;
pub mod wildfire;
