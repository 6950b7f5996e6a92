//! PM2.5 AQI conversion under the current and the legacy breakpoint tables.
//!
//! The 2024 AirNow revision tightened the upper PM2.5 bands; hierarchy
//! output reports both formulas side by side for audit. Concentrations
//! outside the table range yield `None`, never a sentinel.

/// (conc_low, conc_high, aqi_low, aqi_high)
type Breakpoint = (f64, f64, i32, i32);

/// Breakpoints in force since the 2024 revision.
const CURRENT_PM25: &[Breakpoint] = &[
    (0.0, 12.0, 0, 50),
    (12.1, 35.4, 51, 100),
    (35.5, 55.4, 101, 150),
    (55.5, 125.4, 151, 200),
    (125.5, 225.4, 201, 300),
    (225.5, 325.4, 301, 400),
    (325.5, 425.4, 401, 500),
];

/// Pre-2024 breakpoints, retained for year-over-year comparability.
const LEGACY_PM25: &[Breakpoint] = &[
    (0.0, 12.0, 0, 50),
    (12.1, 35.4, 51, 100),
    (35.5, 55.4, 101, 150),
    (55.5, 150.4, 151, 200),
    (150.5, 250.4, 201, 300),
    (250.5, 350.4, 301, 400),
    (350.5, 500.4, 401, 500),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointVersion {
    Current,
    Legacy,
}

/// Converts a PM2.5 concentration (µg/m³) to an AQI value by piecewise
/// linear interpolation.
pub fn pm25_aqi(conc: f64, version: BreakpointVersion) -> Option<i32> {
    let table = match version {
        BreakpointVersion::Current => CURRENT_PM25,
        BreakpointVersion::Legacy => LEGACY_PM25,
    };

    for &(c_low, c_high, i_low, i_high) in table {
        if c_low <= conc && conc <= c_high {
            let aqi = (i_high - i_low) as f64 / (c_high - c_low) * (conc - c_low) + i_low as f64;
            return Some(aqi.round() as i32);
        }
    }
    None
}

/// Standard six-band health category name for an AQI value.
pub fn category(aqi: i32) -> &'static str {
    match aqi {
        ..=50 => "Good",
        51..=100 => "Moderate",
        101..=150 => "Unhealthy for Sensitive Groups",
        151..=200 => "Unhealthy",
        201..=300 => "Very Unhealthy",
        _ => "Hazardous",
    }
}
