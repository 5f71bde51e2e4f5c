use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lab::barcode::RackMarker;
use lab::geometry::RackPosition;
use thiserror::Error;
use util::number::format_quantity;

/// The destination of one planned liquid transfer: target position, volume in
/// ul and, when the target lives on another rack, its rack marker.
///
/// The tag form is `label:volume[:rack_marker]`; lists are joined with `-`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferTarget {
    pub position: RackPosition,
    pub volume: f64,
    pub rack_marker: Option<RackMarker>,
}

impl TransferTarget {
    pub fn new(position: RackPosition, volume: f64) -> Self {
        Self {
            position,
            volume,
            rack_marker: None,
        }
    }

    pub fn on_rack(position: RackPosition, volume: f64, rack_marker: RackMarker) -> Self {
        Self {
            position,
            volume,
            rack_marker: Some(rack_marker),
        }
    }

    /// Identity of the target for duplicate detection: position label plus
    /// rack marker, ignoring the volume.
    pub fn hash_value(&self) -> String {
        match &self.rack_marker {
            Some(marker) => format!("{}{}", self.position, marker),
            None => self.position.to_string(),
        }
    }
}

impl Display for TransferTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.position, format_quantity(self.volume))?;
        if let Some(marker) = &self.rack_marker {
            write!(f, ":{}", marker)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TransferTargetError {
    #[error("Invalid transfer target. Required format is 'label:volume[:rack_marker]'. Input: '{0}'")]
    Invalid(String),

    #[error("Invalid transfer target volume: '{0}'")]
    InvalidVolume(String),
}

impl FromStr for TransferTarget {
    type Err = TransferTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chunks: Vec<&str> = s.split(':').collect();
        if chunks.len() < 2 || chunks.len() > 3 {
            return Err(TransferTargetError::Invalid(s.to_string()));
        }

        let position: RackPosition = chunks[0]
            .parse()
            .map_err(|_| TransferTargetError::Invalid(s.to_string()))?;
        let volume: f64 = chunks[1]
            .parse()
            .map_err(|_| TransferTargetError::InvalidVolume(chunks[1].to_string()))?;
        if volume <= 0.0 {
            return Err(TransferTargetError::InvalidVolume(chunks[1].to_string()));
        }
        let rack_marker = match chunks.get(2) {
            Some(chunk) => Some(
                chunk
                    .parse()
                    .map_err(|_| TransferTargetError::Invalid(s.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            position,
            volume,
            rack_marker,
        })
    }
}

/// Separator between targets in a tag value.
pub const TARGET_SEPARATOR: char = '-';

pub fn parse_targets(value: &str) -> Result<Vec<TransferTarget>, TransferTargetError> {
    value
        .split(TARGET_SEPARATOR)
        .map(|chunk| chunk.trim().parse())
        .collect()
}

pub fn format_targets(targets: &[TransferTarget]) -> String {
    targets
        .iter()
        .map(TransferTarget::to_string)
        .collect::<Vec<_>>()
        .join(&TARGET_SEPARATOR.to_string())
}

#[cfg(test)]
mod transfer_target_tests {
    use lab::barcode::{RackRole, RackMarker};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("A1:5", "A1", 5.0, None)]
    #[case("b2:7.5", "B2", 7.5, None)]
    #[case("C3:10:s#1", "C3", 10.0, Some(RackMarker::new(RackRole::Stock, 1)))]
    fn parse(
        #[case] value: &str,
        #[case] expected_label: &str,
        #[case] expected_volume: f64,
        #[case] expected_marker: Option<RackMarker>,
    ) {
        let target: TransferTarget = value.parse().unwrap();
        assert_eq!(target.position.to_string(), expected_label);
        assert!(util::number::is_equal(target.volume, expected_volume));
        assert_eq!(target.rack_marker, expected_marker);
    }

    #[rstest]
    #[case("A1")]
    #[case("A1:")]
    #[case("A1:0")]
    #[case("A1:-5")]
    #[case("A1:5:s#1:extra")]
    #[case(":5")]
    fn parse_invalid(#[case] value: &str) {
        assert!(value.parse::<TransferTarget>().is_err());
    }

    #[rstest]
    #[case("A1:5")]
    #[case("C3:10:s#1")]
    #[case("P24:7.5")]
    fn parse_format_round_trip(#[case] value: &str) {
        let target: TransferTarget = value.parse().unwrap();
        assert_eq!(target.to_string(), value);
    }

    #[test]
    fn target_lists() {
        let targets = parse_targets("A1:5-B1:5-C1:2.5:p#1").unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(format_targets(&targets), "A1:5-B1:5-C1:2.5:p#1");
    }

    #[test]
    fn hash_value_ignores_volume() {
        let one: TransferTarget = "A1:5".parse().unwrap();
        let other: TransferTarget = "A1:10".parse().unwrap();
        assert_eq!(one.hash_value(), other.hash_value());

        let marked: TransferTarget = "A1:5:s#1".parse().unwrap();
        assert_ne!(one.hash_value(), marked.hash_value());
    }
}
