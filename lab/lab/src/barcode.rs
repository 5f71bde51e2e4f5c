use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

fn rack_barcode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{8}$").unwrap())
}

/// The 8-digit barcode of a physical plate or tube rack.
#[derive(Debug, SerializeDisplay, DeserializeFromStr, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RackBarcode(String);

impl FromStr for RackBarcode {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if rack_barcode_pattern().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(BarcodeError::InvalidRackBarcode(s.to_string()))
        }
    }
}

impl Display for RackBarcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// The barcode engraved on a stock tube.
///
/// Tube barcodes have no fixed scheme across suppliers, so only emptiness and
/// whitespace are rejected.
#[derive(Debug, SerializeDisplay, DeserializeFromStr, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TubeBarcode(String);

impl FromStr for TubeBarcode {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Err(BarcodeError::InvalidTubeBarcode(s.to_string()))
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl Display for TubeBarcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum BarcodeError {
    #[error("Invalid rack barcode. Rack barcodes are 8 digits, found: '{0}'")]
    InvalidRackBarcode(String),

    #[error("Invalid tube barcode: '{0}'")]
    InvalidTubeBarcode(String),

    #[error("Invalid rack marker. Required format is '<role>#<number>', e.g. 's#1'. Input: '{0}'")]
    InvalidRackMarker(String),
}

/// Identifies a rack within a plan independently of its eventual barcode,
/// e.g. "s#1" for the first stock rack.
#[derive(Debug, SerializeDisplay, DeserializeFromStr, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RackMarker {
    pub role: RackRole,
    pub number: usize,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString
)]
pub enum RackRole {
    #[strum(serialize = "s")]
    Stock,
    #[strum(serialize = "p")]
    Preparation,
    #[strum(serialize = "f")]
    Final,
}

impl RackMarker {
    pub fn new(role: RackRole, number: usize) -> Self {
        Self {
            role,
            number,
        }
    }
}

impl Display for RackMarker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.role, self.number)
    }
}

impl FromStr for RackMarker {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, number) = s
            .split_once('#')
            .ok_or_else(|| BarcodeError::InvalidRackMarker(s.to_string()))?;
        let role = role
            .parse()
            .map_err(|_| BarcodeError::InvalidRackMarker(s.to_string()))?;
        let number = number
            .parse()
            .map_err(|_| BarcodeError::InvalidRackMarker(s.to_string()))?;
        Ok(Self {
            role,
            number,
        })
    }
}
