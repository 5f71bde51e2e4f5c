use std::collections::BTreeMap;
use std::sync::Arc;

use lab::barcode::TubeBarcode;
use lab::pool::MoleculeDesignPool;
use lab::units::STOCK_DEAD_VOLUME;
use layout::position::PositionKind;
use layout::transfer_target::TransferTarget;

use crate::source::StockTubeCandidate;

/// Collects everything known about the stock tube needed for one pool: the
/// downstream transfers it must serve, the barcode the user asked for and,
/// once picked, the chosen candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct StockTubeContainer {
    pub pool: Arc<MoleculeDesignPool>,
    /// Fixed pools are controls; missing tubes for them are fatal. Floating
    /// pools are merely dropped.
    pub kind: PositionKind,
    /// Stock concentration in nM the tube must hold.
    pub stock_concentration: f64,
    /// Transfer targets per target plate label.
    targets: BTreeMap<String, Vec<TransferTarget>>,
    pub requested_tube: Option<TubeBarcode>,
    pub tube: Option<StockTubeCandidate>,
}

impl StockTubeContainer {
    pub fn new(pool: Arc<MoleculeDesignPool>, kind: PositionKind, stock_concentration: f64) -> Self {
        Self {
            pool,
            kind,
            stock_concentration,
            targets: BTreeMap::new(),
            requested_tube: None,
            tube: None,
        }
    }

    pub fn add_target(&mut self, plate_label: impl Into<String>, target: TransferTarget) {
        self.targets
            .entry(plate_label.into())
            .or_default()
            .push(target);
    }

    pub fn targets(&self) -> impl Iterator<Item = (&String, &Vec<TransferTarget>)> {
        self.targets.iter()
    }

    pub fn all_targets(&self) -> impl Iterator<Item = &TransferTarget> {
        self.targets.values().flatten()
    }

    /// Volume in ul drawn from the tube across all planned transfers.
    pub fn total_transfer_volume(&self) -> f64 {
        self.all_targets().map(|target| target.volume).sum()
    }

    /// Transfer volume plus the stock dead volume: what the candidate tube
    /// must still hold.
    pub fn required_volume(&self) -> f64 {
        self.total_transfer_volume() + STOCK_DEAD_VOLUME
    }
}
