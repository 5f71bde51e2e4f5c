use std::collections::BTreeMap;

use lab::geometry::RackPosition;
use thiserror::Error;

use crate::pipetting::PipettingSpecs;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::Display
)]
pub enum TransferType {
    #[strum(serialize = "sample dilution")]
    SampleDilution,
    #[strum(serialize = "sample transfer")]
    SampleTransfer,
    #[strum(serialize = "rack sample transfer")]
    RackSampleTransfer,
}

/// Adds diluent from a named reservoir to one target position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSampleDilution {
    pub volume: f64,
    pub target_position: RackPosition,
    pub diluent: String,
}

/// Moves liquid between two positions, individually pipetted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSampleTransfer {
    pub volume: f64,
    pub source_position: RackPosition,
    pub target_position: RackPosition,
}

/// Moves a full rack sector in one multi-channel step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRackSampleTransfer {
    pub volume: f64,
    pub number_sectors: usize,
    pub source_sector: usize,
    pub target_sector: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedTransfer {
    Dilution(PlannedSampleDilution),
    Sample(PlannedSampleTransfer),
    Rack(PlannedRackSampleTransfer),
}

#[derive(Error, Debug, PartialEq)]
pub enum PlannedTransferError {
    #[error("Transfer volumes must be positive, found: {0}")]
    NonPositiveVolume(f64),

    #[error("Sector index {sector} is out of range for {number_sectors} sectors")]
    SectorOutOfRange { sector: usize, number_sectors: usize },

    #[error("Worklist '{label}' holds '{expected}' transfers, attempted to add a '{actual}' transfer")]
    MixedTransferTypes {
        label: String,
        expected: TransferType,
        actual: TransferType,
    },

    #[error("Worklist series already holds a worklist with index {0}")]
    DuplicateIndex(usize),
}

impl PlannedSampleDilution {
    pub fn new(
        volume: f64,
        target_position: RackPosition,
        diluent: impl Into<String>,
    ) -> Result<Self, PlannedTransferError> {
        if volume <= 0.0 {
            return Err(PlannedTransferError::NonPositiveVolume(volume));
        }
        Ok(Self {
            volume,
            target_position,
            diluent: diluent.into(),
        })
    }
}

impl PlannedSampleTransfer {
    pub fn new(
        volume: f64,
        source_position: RackPosition,
        target_position: RackPosition,
    ) -> Result<Self, PlannedTransferError> {
        if volume <= 0.0 {
            return Err(PlannedTransferError::NonPositiveVolume(volume));
        }
        Ok(Self {
            volume,
            source_position,
            target_position,
        })
    }
}

impl PlannedRackSampleTransfer {
    pub fn new(
        volume: f64,
        number_sectors: usize,
        source_sector: usize,
        target_sector: usize,
    ) -> Result<Self, PlannedTransferError> {
        if volume <= 0.0 {
            return Err(PlannedTransferError::NonPositiveVolume(volume));
        }
        for sector in [source_sector, target_sector] {
            if sector >= number_sectors {
                return Err(PlannedTransferError::SectorOutOfRange {
                    sector,
                    number_sectors,
                });
            }
        }
        Ok(Self {
            volume,
            number_sectors,
            source_sector,
            target_sector,
        })
    }
}

impl PlannedTransfer {
    pub fn transfer_type(&self) -> TransferType {
        match self {
            PlannedTransfer::Dilution(_) => TransferType::SampleDilution,
            PlannedTransfer::Sample(_) => TransferType::SampleTransfer,
            PlannedTransfer::Rack(_) => TransferType::RackSampleTransfer,
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            PlannedTransfer::Dilution(transfer) => transfer.volume,
            PlannedTransfer::Sample(transfer) => transfer.volume,
            PlannedTransfer::Rack(transfer) => transfer.volume,
        }
    }

    /// Sort key: source position, then target position, row-major each.
    fn ordering_key(&self) -> (usize, usize, usize, usize) {
        match self {
            PlannedTransfer::Dilution(transfer) => (
                0,
                0,
                transfer.target_position.row(),
                transfer.target_position.column(),
            ),
            PlannedTransfer::Sample(transfer) => (
                transfer.source_position.row(),
                transfer.source_position.column(),
                transfer.target_position.row(),
                transfer.target_position.column(),
            ),
            PlannedTransfer::Rack(transfer) => (transfer.source_sector, 0, transfer.target_sector, 0),
        }
    }
}

/// An ordered, labelled set of planned transfers of one type, bound to the
/// pipetting method they were planned for.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWorklist {
    pub index: usize,
    pub label: String,
    pub pipetting_specs: PipettingSpecs,
    pub transfer_type: TransferType,
    transfers: Vec<PlannedTransfer>,
}

impl PlannedWorklist {
    pub fn new(
        index: usize,
        label: impl Into<String>,
        pipetting_specs: PipettingSpecs,
        transfer_type: TransferType,
    ) -> Self {
        Self {
            index,
            label: label.into(),
            pipetting_specs,
            transfer_type,
            transfers: vec![],
        }
    }

    pub fn add_transfer(&mut self, transfer: PlannedTransfer) -> Result<(), PlannedTransferError> {
        if transfer.transfer_type() != self.transfer_type {
            return Err(PlannedTransferError::MixedTransferTypes {
                label: self.label.clone(),
                expected: self.transfer_type,
                actual: transfer.transfer_type(),
            });
        }
        self.transfers.push(transfer);
        Ok(())
    }

    pub fn transfers(&self) -> &[PlannedTransfer] {
        &self.transfers
    }

    /// Transfers in execution order: (source row, source column, target row,
    /// target column).
    pub fn sorted_transfers(&self) -> Vec<&PlannedTransfer> {
        let mut sorted: Vec<&PlannedTransfer> = self.transfers.iter().collect();
        sorted.sort_by_key(|transfer| transfer.ordering_key());
        sorted
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }
}

/// Worklists executed in index order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorklistSeries {
    worklists: BTreeMap<usize, PlannedWorklist>,
}

impl WorklistSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_worklist(&mut self, worklist: PlannedWorklist) -> Result<(), PlannedTransferError> {
        if self.worklists.contains_key(&worklist.index) {
            return Err(PlannedTransferError::DuplicateIndex(worklist.index));
        }
        self.worklists.insert(worklist.index, worklist);
        Ok(())
    }

    /// Worklists in index order.
    pub fn iter(&self) -> impl Iterator<Item = &PlannedWorklist> {
        self.worklists.values()
    }

    pub fn get(&self, index: usize) -> Option<&PlannedWorklist> {
        self.worklists.get(&index)
    }

    pub fn len(&self) -> usize {
        self.worklists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worklists.is_empty()
    }
}
