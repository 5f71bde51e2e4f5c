use std::path::Path;

use anyhow::Context;
use lab::barcode::{RackBarcode, TubeBarcode};
use lab::geometry::RackPosition;
use lab::pool::PoolId;
use tracing::{info, Level};
use util::number;

/// One stock tube the picker may choose.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct StockTubeCandidate {
    pub tube_barcode: TubeBarcode,
    pub rack_barcode: RackBarcode,
    pub position: RackPosition,
    pub pool: PoolId,
    /// Total pool concentration in nM.
    pub concentration: f64,
    /// Remaining sample volume in ul.
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub location: Option<String>,
}

/// The stock database seam: answers candidate-tube queries for the picker.
pub trait StockSource {
    /// Tubes holding `pool` at `concentration` with at least `minimum_volume`
    /// ul remaining.
    fn find_tubes(&self, pool: PoolId, concentration: f64, minimum_volume: f64) -> Vec<StockTubeCandidate>;
}

/// In-memory stock inventory, loadable from a JSON file.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Default)]
pub struct StockInventory {
    tubes: Vec<StockTubeCandidate>,
}

impl StockInventory {
    pub fn new(tubes: Vec<StockTubeCandidate>) -> Self {
        Self {
            tubes,
        }
    }

    #[tracing::instrument(level = Level::DEBUG)]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Error reading stock inventory. file: {}", path.display()))?;
        let inventory: StockInventory = serde_json::from_reader(file)
            .with_context(|| format!("Deserializing stock inventory. file: {}", path.display()))?;
        info!("Loaded stock inventory. tubes: {}", inventory.tubes.len());
        Ok(inventory)
    }

    pub fn tubes(&self) -> &[StockTubeCandidate] {
        &self.tubes
    }
}

impl StockSource for StockInventory {
    fn find_tubes(&self, pool: PoolId, concentration: f64, minimum_volume: f64) -> Vec<StockTubeCandidate> {
        self.tubes
            .iter()
            .filter(|tube| {
                tube.pool == pool
                    && number::is_equal(tube.concentration, concentration)
                    && !number::is_smaller(tube.volume, minimum_volume)
            })
            .cloned()
            .collect()
    }
}
