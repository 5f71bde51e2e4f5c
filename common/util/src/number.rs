//! Tolerance-aware comparison and formatting for measured quantities.
//!
//! Volumes and concentrations are measured values; equality is never exact.
//! All comparisons between them go through these helpers.

/// Default comparison tolerance for measured quantities (volumes, concentrations).
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

pub fn is_equal(left: f64, right: f64) -> bool {
    (left - right).abs() <= DEFAULT_TOLERANCE
}

/// `left` is smaller than `right` by more than the tolerance.
pub fn is_smaller(left: f64, right: f64) -> bool {
    left < right - DEFAULT_TOLERANCE
}

/// `left` is larger than `right` by more than the tolerance.
pub fn is_larger(left: f64, right: f64) -> bool {
    left > right + DEFAULT_TOLERANCE
}

/// Formats a quantity for worklist and summary output.
///
/// Values are printed to one decimal place, with a trailing `.0` suppressed,
/// e.g. `5.0` -> "5", `5.25` -> "5.3".
pub fn format_quantity(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{}", rounded.trunc() as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

#[cfg(test)]
mod comparison_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1.0, 1.0, true)]
    #[case(1.0, 1.0005, true)]
    #[case(1.0, 1.002, false)]
    #[case(0.0, 0.0, true)]
    fn equality(#[case] left: f64, #[case] right: f64, #[case] expected_result: bool) {
        assert_eq!(is_equal(left, right), expected_result);
    }

    #[rstest]
    #[case(1.0, 2.0, true)]
    #[case(2.0, 1.0, false)]
    // within tolerance of the boundary, not smaller
    #[case(1.9995, 2.0, false)]
    #[case(1.998, 2.0, true)]
    fn smaller(#[case] left: f64, #[case] right: f64, #[case] expected_result: bool) {
        assert_eq!(is_smaller(left, right), expected_result);
    }

    #[rstest]
    #[case(2.0, 1.0, true)]
    #[case(1.0, 2.0, false)]
    #[case(2.0005, 2.0, false)]
    fn larger(#[case] left: f64, #[case] right: f64, #[case] expected_result: bool) {
        assert_eq!(is_larger(left, right), expected_result);
    }
}

#[cfg(test)]
mod formatting_tests {
    use rstest::rstest;

    use super::format_quantity;

    #[rstest]
    #[case(5.0, "5")]
    #[case(5.25, "5.3")]
    #[case(5.5, "5.5")]
    #[case(0.5, "0.5")]
    #[case(10.0, "10")]
    #[case(120.04, "120")]
    fn format(#[case] value: f64, #[case] expected_result: &str) {
        assert_eq!(format_quantity(value), expected_result);
    }
}
