use std::path::Path;

use anyhow::Context;
use lab::barcode::{RackBarcode, TubeBarcode};
use lab::pool::{MoleculeDesignPool, PoolId, PoolRegistry};
use lab::rack_layout::RackLayout;
use transfer::iso::Iso;

use crate::opts::StrategyArg;

/// The file-based form of an assembly order: everything the stock-rack
/// assembler needs that would otherwise come from the database.
#[derive(serde::Deserialize, Debug)]
pub struct PickRequest {
    pub label: String,
    pub pools: Vec<MoleculeDesignPool>,
    /// Queue for floating placeholders, in priority order.
    #[serde(default)]
    pub pool_set: Vec<PoolId>,
    pub rack_layout: RackLayout,
    pub destination_racks: Vec<RackBarcode>,
    #[serde(default)]
    pub excluded_racks: Vec<RackBarcode>,
    #[serde(default)]
    pub requested_tubes: Vec<TubeBarcode>,
    pub strategy: StrategyArg,
    #[serde(default)]
    pub include_dummy_output: bool,
}

impl PickRequest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Error reading assembly request. file: {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Deserializing assembly request. file: {}", path.display()))
    }

    pub fn build_registry(&self) -> anyhow::Result<PoolRegistry> {
        let mut registry = PoolRegistry::new();
        for pool in self.pools.iter() {
            registry
                .add(pool.clone())
                .with_context(|| format!("Registering pool {}", pool.id))?;
        }
        Ok(registry)
    }

    pub fn build_iso(&self) -> Iso {
        let mut iso = Iso::new(self.label.clone(), self.rack_layout.clone(), self.destination_racks.len());
        iso.pool_set = self.pool_set.iter().copied().collect();
        iso
    }
}
