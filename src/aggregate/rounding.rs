//! Numeric rules for regulatory aggregates.
//!
//! Two distinct operations that are NOT interchangeable: truncation toward
//! zero (used for all daily averaging) and half-up rounding (used only in
//! the 8-hour ozone calculation). For 15.26 at one decimal, truncation
//! gives 15.2 while half-up rounding gives 15.3, and compliance outcomes
//! can hinge on the difference.

/// Truncates toward zero at `digits` decimal places, sign-preserving.
pub fn truncate_to(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).trunc() / factor
}

/// Half-up rounding at `digits` decimal places: scale, add 0.5 plus machine
/// epsilon (so values sitting exactly on .5 round up despite floating-point
/// representation), truncate, rescale, restore sign.
pub fn true_round(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    let rounded = (x.abs() * factor + 0.5 + f64::EPSILON).trunc() / factor;
    if x < 0.0 { -rounded } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_and_round_differ() {
        // The regulatory distinction: these must not be interchangeable.
        assert_eq!(truncate_to(15.26, 1), 15.2);
        assert_eq!(true_round(15.26, 1), 15.3);
    }

    #[test]
    fn test_truncate_toward_zero_preserves_sign() {
        assert_eq!(truncate_to(12.38, 1), 12.3);
        assert_eq!(truncate_to(-12.38, 1), -12.3);
        assert_eq!(truncate_to(0.0799, 3), 0.079);
    }

    #[test]
    fn test_true_round_half_goes_up() {
        assert_eq!(true_round(0.5, 0), 1.0);
        assert_eq!(true_round(2.5, 0), 3.0);
        assert_eq!(true_round(-2.5, 0), -3.0);
    }

    #[test]
    fn test_true_round_three_decimals() {
        assert_eq!(true_round(70.1234, 3), 70.123);
        assert_eq!(true_round(70.1236, 3), 70.124);
    }
}
