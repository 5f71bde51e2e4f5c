use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// The grid of a plate or tube rack, e.g. 8x12 (96-well) or 16x24 (384-well).
#[derive(
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash
)]
pub struct RackShape {
    pub rows: usize,
    pub columns: usize,
}

impl RackShape {
    pub const SHAPE_96: RackShape = RackShape {
        rows: 8,
        columns: 12,
    };
    pub const SHAPE_384: RackShape = RackShape {
        rows: 16,
        columns: 24,
    };

    pub fn contains_position(&self, position: RackPosition) -> bool {
        position.row() < self.rows && position.column() < self.columns
    }

    pub fn size(&self) -> usize {
        self.rows * self.columns
    }

    /// All positions of the shape, row-major.
    pub fn positions(&self) -> impl Iterator<Item = RackPosition> + '_ {
        let columns = self.columns;
        (0..self.rows).flat_map(move |row| (0..columns).map(move |column| RackPosition::new(row, column)))
    }
}

impl Display for RackShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

/// A (row, column) coordinate on a rack, labelled "A1".."P24".
///
/// Rows and columns are zero-based internally; labels are case-insensitive on
/// input and upper-case on output. Two positions with the same coordinates
/// compare and hash equal.
#[derive(Debug, SerializeDisplay, DeserializeFromStr, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RackPosition {
    row: usize,
    column: usize,
}

impl RackPosition {
    pub fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Display for RackPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut letters = String::new();
        let mut remainder = self.row;
        loop {
            letters.insert(0, (b'A' + (remainder % 26) as u8) as char);
            if remainder < 26 {
                break;
            }
            remainder = remainder / 26 - 1;
        }
        write!(f, "{}{}", letters, self.column + 1)
    }
}

impl FromStr for RackPosition {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let letter_count = label
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        if letter_count == 0 {
            return Err(PositionError::InvalidLabel(s.to_string()));
        }
        let (letters, digits) = label.split_at(letter_count);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PositionError::InvalidLabel(s.to_string()));
        }

        let mut row: usize = 0;
        for c in letters.chars() {
            row = row * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
        }
        let row = row - 1;

        let column: usize = digits
            .parse()
            .map_err(|_| PositionError::InvalidLabel(s.to_string()))?;
        if column == 0 {
            return Err(PositionError::InvalidLabel(s.to_string()));
        }

        Ok(Self::new(row, column - 1))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PositionError {
    #[error("Invalid position label: '{0}'")]
    InvalidLabel(String),

    #[error("Position '{position}' is not within the {shape} rack shape")]
    OutOfShape { position: RackPosition, shape: RackShape },
}

impl RackPosition {
    /// Parses a label and checks it against a shape in one step.
    pub fn parse_for_shape(label: &str, shape: RackShape) -> Result<Self, PositionError> {
        let position = Self::from_str(label)?;
        if !shape.contains_position(position) {
            return Err(PositionError::OutOfShape {
                position,
                shape,
            });
        }
        Ok(position)
    }
}

#[cfg(test)]
mod rack_position_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("A1", 0, 0)]
    #[case("a1", 0, 0)]
    #[case("C3", 2, 2)]
    #[case("H12", 7, 11)]
    #[case("P24", 15, 23)]
    #[case("  B2 ", 1, 1)]
    fn parse(#[case] label: &str, #[case] expected_row: usize, #[case] expected_column: usize) {
        let position: RackPosition = label.parse().unwrap();
        assert_eq!(position.row(), expected_row);
        assert_eq!(position.column(), expected_column);
    }

    #[rstest]
    #[case("")]
    #[case("1A")]
    #[case("A")]
    #[case("A0")]
    #[case("A1B")]
    fn parse_invalid(#[case] label: &str) {
        assert!(label.parse::<RackPosition>().is_err());
    }

    #[rstest]
    #[case(0, 0, "A1")]
    #[case(7, 11, "H12")]
    #[case(15, 23, "P24")]
    fn format(#[case] row: usize, #[case] column: usize, #[case] expected_label: &str) {
        assert_eq!(RackPosition::new(row, column).to_string(), expected_label);
    }

    #[test]
    fn label_round_trip() {
        for position in RackShape::SHAPE_384.positions() {
            let parsed: RackPosition = position.label().parse().unwrap();
            assert_eq!(parsed, position);
        }
    }

    #[test]
    fn shape_containment() {
        let shape = RackShape::SHAPE_96;
        assert!(shape.contains_position(RackPosition::new(0, 0)));
        assert!(shape.contains_position(RackPosition::new(7, 11)));
        assert!(!shape.contains_position(RackPosition::new(8, 0)));
        assert!(!shape.contains_position(RackPosition::new(0, 12)));
    }

    #[test]
    fn positions_are_row_major() {
        let positions: Vec<_> = RackShape {
            rows: 2,
            columns: 2,
        }
        .positions()
        .map(|p| p.label())
        .collect();
        assert_eq!(positions, vec!["A1", "A2", "B1", "B2"]);
    }
}
