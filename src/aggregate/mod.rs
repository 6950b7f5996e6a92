//! Regulatory aggregation engine.
//!
//! Three algorithms: midnight-to-midnight averaging, the EPA 8-hour ozone
//! rolling maximum, and daily-max selection over the per-hour 8-hour
//! averages. Numeric rules are exact and auditable: averages truncate
//! toward zero, only the ozone 8-hour value applies half-up rounding.

pub mod daily;
pub mod ozone;
pub mod rounding;
