//! Unit conventions and conversion.
//!
//! The planning API works in microlitres and nanomolar throughout. Persisted
//! sample records use the SI scale (litres, molar x 10^-6); the conversion
//! factor below bridges the two.

/// Litres <-> microlitres.
pub const VOLUME_CONVERSION_FACTOR: f64 = 1.0e6;

/// Stored concentration scale <-> nanomolar.
pub const CONCENTRATION_CONVERSION_FACTOR: f64 = 1.0e6;

/// Dead volume of a stock tube in ul. Liquid below this level cannot be
/// aspirated reliably.
pub const STOCK_DEAD_VOLUME: f64 = 5.0;

/// Minimum volume in ul that can be taken from a stock tube in one transfer.
pub const MINIMUM_STOCK_TRANSFER_VOLUME: f64 = 1.0;

pub fn volume_to_si(volume_in_ul: f64) -> f64 {
    volume_in_ul / VOLUME_CONVERSION_FACTOR
}

pub fn volume_from_si(volume: f64) -> f64 {
    volume * VOLUME_CONVERSION_FACTOR
}

pub fn concentration_to_si(concentration_in_nm: f64) -> f64 {
    concentration_in_nm / CONCENTRATION_CONVERSION_FACTOR
}

pub fn concentration_from_si(concentration: f64) -> f64 {
    concentration * CONCENTRATION_CONVERSION_FACTOR
}

#[cfg(test)]
mod unit_conversion_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(5.0)]
    #[case(0.0)]
    #[case(45_000.0)]
    fn volume_round_trip(#[case] volume_in_ul: f64) {
        assert!(util::number::is_equal(volume_from_si(volume_to_si(volume_in_ul)), volume_in_ul));
    }

    #[rstest]
    #[case(50_000.0)]
    #[case(10.0)]
    fn concentration_round_trip(#[case] concentration_in_nm: f64) {
        assert!(util::number::is_equal(
            concentration_from_si(concentration_to_si(concentration_in_nm)),
            concentration_in_nm
        ));
    }
}
