use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;

pub type DesignId = u32;
pub type PoolId = u32;

#[derive(
    Debug,
    serde::Serialize,
    serde::Deserialize,
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
pub enum MoleculeType {
    #[strum(serialize = "siRNA")]
    #[serde(rename = "siRNA")]
    SiRna,
    #[strum(serialize = "compound")]
    #[serde(rename = "compound")]
    Compound,
    #[strum(serialize = "miRNA mimic")]
    #[serde(rename = "miRNA mimic")]
    MiRnaMimic,
    #[strum(serialize = "miRNA inhibitor")]
    #[serde(rename = "miRNA inhibitor")]
    MiRnaInhibitor,
    #[strum(serialize = "esiRNA")]
    #[serde(rename = "esiRNA")]
    EsiRna,
    #[strum(serialize = "long dsRNA")]
    #[serde(rename = "long dsRNA")]
    LongDsRna,
}

impl MoleculeType {
    /// Stock concentration in nM of a freshly registered single-design stock
    /// tube of this molecule type.
    pub fn default_stock_concentration(&self) -> f64 {
        match self {
            MoleculeType::SiRna => 50_000.0,
            MoleculeType::Compound => 5_000_000.0,
            MoleculeType::MiRnaMimic => 10_000.0,
            MoleculeType::MiRnaInhibitor => 10_000.0,
            MoleculeType::EsiRna => 3_800.0,
            MoleculeType::LongDsRna => 50_000.0,
        }
    }
}

/// An immutable chemical structure, identified by an integer id.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoleculeDesign {
    pub id: DesignId,
    pub molecule_type: MoleculeType,
}

/// A set of one or more molecule designs of the same molecule type, treated
/// as a unit. The pool id uniquely identifies the design set.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct MoleculeDesignPool {
    pub id: PoolId,
    pub molecule_type: MoleculeType,
    pub designs: BTreeSet<DesignId>,
    /// Total stock concentration in nM across all designs of the pool.
    pub default_stock_concentration: f64,
}

impl MoleculeDesignPool {
    pub fn number_designs(&self) -> usize {
        self.designs.len()
    }

    /// Stock concentration per design in nM; designs in a pool always share
    /// one concentration.
    pub fn stock_concentration_per_design(&self) -> f64 {
        self.default_stock_concentration / self.number_designs() as f64
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
    #[error("Unknown molecule design pool: {0}")]
    UnknownPool(PoolId),

    #[error("Molecule design pool {0} has no designs")]
    EmptyPool(PoolId),
}

/// Shared immutable lookup of molecule design pools.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: BTreeMap<PoolId, Arc<MoleculeDesignPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pool: MoleculeDesignPool) -> Result<Arc<MoleculeDesignPool>, PoolError> {
        if pool.designs.is_empty() {
            return Err(PoolError::EmptyPool(pool.id));
        }
        let pool = Arc::new(pool);
        self.pools.insert(pool.id, pool.clone());
        Ok(pool)
    }

    pub fn find(&self, id: PoolId) -> Option<Arc<MoleculeDesignPool>> {
        self.pools.get(&id).cloned()
    }

    pub fn get(&self, id: PoolId) -> Result<Arc<MoleculeDesignPool>, PoolError> {
        self.find(id).ok_or(PoolError::UnknownPool(id))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MoleculeDesignPool>> {
        self.pools.values()
    }
}

#[cfg(test)]
mod pool_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MoleculeType::SiRna, 50_000.0)]
    #[case(MoleculeType::Compound, 5_000_000.0)]
    #[case(MoleculeType::MiRnaMimic, 10_000.0)]
    fn single_design_stock_concentrations(#[case] molecule_type: MoleculeType, #[case] expected_result: f64) {
        assert!(util::number::is_equal(
            molecule_type.default_stock_concentration(),
            expected_result
        ));
    }

    fn pool_with_designs(designs: &[DesignId]) -> MoleculeDesignPool {
        MoleculeDesignPool {
            id: 1056000,
            molecule_type: MoleculeType::SiRna,
            designs: designs.iter().copied().collect(),
            default_stock_concentration: 10_000.0,
        }
    }

    #[test]
    fn per_design_concentration() {
        let pool = pool_with_designs(&[11, 12, 13]);
        assert_eq!(pool.number_designs(), 3);
        assert!(util::number::is_equal(pool.stock_concentration_per_design(), 10_000.0 / 3.0));
    }

    #[test]
    fn registry_rejects_empty_pools() {
        let mut registry = PoolRegistry::new();
        assert_eq!(registry.add(pool_with_designs(&[])), Err(PoolError::EmptyPool(1056000)));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = PoolRegistry::new();
        registry
            .add(pool_with_designs(&[11, 12, 13]))
            .unwrap();

        assert!(registry.find(1056000).is_some());
        assert!(registry.find(205200).is_none());
        assert_eq!(registry.get(205200), Err(PoolError::UnknownPool(205200)));
    }
}
