use std::collections::BTreeSet;

use thiserror::Error;
use util::number;

use crate::barcode::TubeBarcode;
use crate::pool::{DesignId, MoleculeType, PoolId};

/// One molecule design dissolved in a sample, with its concentration in nM.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SampleMolecule {
    pub molecule_design: DesignId,
    pub concentration: f64,
}

/// Marks a sample as a registered stock sample.
///
/// Stock samples are the source of truth for a pool at a known concentration;
/// they are created once and never diluted in place.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct StockInfo {
    pub pool: PoolId,
    pub supplier: String,
    pub molecule_type: MoleculeType,
    /// Concentration per design in nM.
    pub concentration: f64,
}

/// Liquid held by one container: a volume in ul plus molecule entries.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Default)]
pub struct Sample {
    /// Total volume in ul.
    pub volume: f64,
    molecules: Vec<SampleMolecule>,
    stock: Option<StockInfo>,
}

#[derive(Error, Debug, PartialEq)]
pub enum SampleError {
    #[error("Taking {requested} ul from a sample of {available} ul would leave a negative volume")]
    NegativeVolume { requested: f64, available: f64 },

    #[error("Transfer volumes must be positive, found: {0}")]
    NonPositiveVolume(f64),

    #[error("Sample is already registered as a stock sample")]
    AlreadyStock,
}

impl Sample {
    pub fn new(volume: f64) -> Self {
        Self {
            volume,
            molecules: vec![],
            stock: None,
        }
    }

    pub fn with_molecule(mut self, molecule_design: DesignId, concentration: f64) -> Self {
        self.molecules.push(SampleMolecule {
            molecule_design,
            concentration,
        });
        self
    }

    pub fn molecules(&self) -> &[SampleMolecule] {
        &self.molecules
    }

    pub fn design_ids(&self) -> BTreeSet<DesignId> {
        self.molecules
            .iter()
            .map(|m| m.molecule_design)
            .collect()
    }

    pub fn stock_info(&self) -> Option<&StockInfo> {
        self.stock.as_ref()
    }

    /// Removes `volume` ul. Concentrations are unaffected by taking liquid out.
    pub fn take(&mut self, volume: f64) -> Result<(), SampleError> {
        if volume <= 0.0 {
            return Err(SampleError::NonPositiveVolume(volume));
        }
        if number::is_smaller(self.volume, volume) {
            return Err(SampleError::NegativeVolume {
                requested: volume,
                available: self.volume,
            });
        }
        self.volume = (self.volume - volume).max(0.0);
        Ok(())
    }

    /// Adds `volume` ul of molecule-free diluent; concentrations scale down.
    pub fn add_diluent(&mut self, volume: f64) -> Result<(), SampleError> {
        if volume <= 0.0 {
            return Err(SampleError::NonPositiveVolume(volume));
        }
        let new_volume = self.volume + volume;
        for molecule in self.molecules.iter_mut() {
            molecule.concentration = molecule.concentration * self.volume / new_volume;
        }
        self.volume = new_volume;
        Ok(())
    }

    /// Adds `volume` ul taken from `source`, merging molecule entries and
    /// recomputing concentrations from both contributions.
    pub fn add_from(&mut self, source: &Sample, volume: f64) -> Result<(), SampleError> {
        if volume <= 0.0 {
            return Err(SampleError::NonPositiveVolume(volume));
        }
        let new_volume = self.volume + volume;

        for molecule in self.molecules.iter_mut() {
            let source_concentration = source
                .molecules
                .iter()
                .find(|m| m.molecule_design == molecule.molecule_design)
                .map(|m| m.concentration)
                .unwrap_or(0.0);
            molecule.concentration =
                (molecule.concentration * self.volume + source_concentration * volume) / new_volume;
        }
        for source_molecule in source.molecules.iter() {
            if self
                .molecules
                .iter()
                .any(|m| m.molecule_design == source_molecule.molecule_design)
            {
                continue;
            }
            self.molecules.push(SampleMolecule {
                molecule_design: source_molecule.molecule_design,
                concentration: source_molecule.concentration * volume / new_volume,
            });
        }

        self.volume = new_volume;
        Ok(())
    }

    /// Registers this sample as a stock sample. The molecule composition is
    /// frozen by the caller's checks before conversion.
    pub fn convert_to_stock(&mut self, stock: StockInfo) -> Result<(), SampleError> {
        if self.stock.is_some() {
            return Err(SampleError::AlreadyStock);
        }
        self.stock = Some(stock);
        Ok(())
    }
}

/// A well or a tube. A tube carries its own barcode and may change racks; a
/// well is part of the plate it belongs to.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub enum ContainerKind {
    Well,
    Tube(TubeBarcode),
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct Container {
    pub kind: ContainerKind,
    pub sample: Option<Sample>,
}

impl Container {
    pub fn well() -> Self {
        Self {
            kind: ContainerKind::Well,
            sample: None,
        }
    }

    pub fn tube(barcode: TubeBarcode) -> Self {
        Self {
            kind: ContainerKind::Tube(barcode),
            sample: None,
        }
    }

    pub fn tube_barcode(&self) -> Option<&TubeBarcode> {
        match &self.kind {
            ContainerKind::Tube(barcode) => Some(barcode),
            ContainerKind::Well => None,
        }
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }
}

#[cfg(test)]
mod sample_tests {
    use util::number::is_equal;

    use super::*;

    #[test]
    fn take_decrements_volume_without_touching_concentrations() {
        let mut sample = Sample::new(100.0).with_molecule(11, 50_000.0);

        sample.take(40.0).unwrap();

        assert!(is_equal(sample.volume, 60.0));
        assert!(is_equal(sample.molecules()[0].concentration, 50_000.0));
    }

    #[test]
    fn take_rejects_negative_result() {
        let mut sample = Sample::new(10.0);

        let result = sample.take(10.5);

        assert_eq!(
            result,
            Err(SampleError::NegativeVolume {
                requested: 10.5,
                available: 10.0
            })
        );
        // no partial effect
        assert!(is_equal(sample.volume, 10.0));
    }

    #[test]
    fn take_accepts_exactly_the_remaining_volume() {
        let mut sample = Sample::new(10.0);

        sample.take(10.0).unwrap();

        assert!(is_equal(sample.volume, 0.0));
    }

    #[test]
    fn diluent_scales_concentrations() {
        let mut sample = Sample::new(50.0).with_molecule(11, 20_000.0);

        sample.add_diluent(50.0).unwrap();

        assert!(is_equal(sample.volume, 100.0));
        assert!(is_equal(sample.molecules()[0].concentration, 10_000.0));
    }

    #[test]
    fn add_from_merges_molecules() {
        let source = Sample::new(100.0).with_molecule(11, 50_000.0);
        let mut target = Sample::new(30.0);

        target.add_from(&source, 10.0).unwrap();

        assert!(is_equal(target.volume, 40.0));
        assert_eq!(target.design_ids(), [11].into_iter().collect());
        // 50_000 nM diluted 10 ul into 40 ul
        assert!(is_equal(target.molecules()[0].concentration, 12_500.0));
    }

    #[test]
    fn stock_conversion_is_once_only() {
        let mut sample = Sample::new(45.0).with_molecule(11, 10_000.0);
        let info = StockInfo {
            pool: 1056000,
            supplier: "Ambion".to_string(),
            molecule_type: MoleculeType::SiRna,
            concentration: 10_000.0,
        };

        sample.convert_to_stock(info.clone()).unwrap();

        assert_eq!(sample.convert_to_stock(info), Err(SampleError::AlreadyStock));
    }
}
