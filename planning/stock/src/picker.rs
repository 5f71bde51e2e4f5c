use std::collections::{BTreeMap, BTreeSet};

use lab::barcode::{RackBarcode, TubeBarcode};
use lab::pool::PoolId;
use tracing::{debug, info};

use crate::container::StockTubeContainer;
use crate::source::{StockSource, StockTubeCandidate};

/// Picks one stock tube per pool.
///
/// Pools without a usable candidate are reported back, not raised; the caller
/// decides whether that is fatal (fixed controls) or a warning (floating
/// samples).
pub struct TubePicker<'a> {
    source: &'a dyn StockSource,
    excluded_racks: BTreeSet<RackBarcode>,
    requested_tubes: BTreeSet<TubeBarcode>,
}

impl<'a> TubePicker<'a> {
    pub fn new(source: &'a dyn StockSource) -> Self {
        Self {
            source,
            excluded_racks: BTreeSet::new(),
            requested_tubes: BTreeSet::new(),
        }
    }

    pub fn excluding_racks(mut self, excluded_racks: impl IntoIterator<Item = RackBarcode>) -> Self {
        self.excluded_racks.extend(excluded_racks);
        self
    }

    pub fn requesting_tubes(mut self, requested_tubes: impl IntoIterator<Item = TubeBarcode>) -> Self {
        self.requested_tubes.extend(requested_tubes);
        self
    }

    pub fn excluded_racks(&self) -> impl Iterator<Item = &RackBarcode> {
        self.excluded_racks.iter()
    }

    pub fn requested_tubes(&self) -> impl Iterator<Item = &TubeBarcode> {
        self.requested_tubes.iter()
    }

    /// Picks tubes for every container; returns the pools that could not be
    /// served.
    pub fn pick(&self, containers: &mut BTreeMap<PoolId, StockTubeContainer>) -> Vec<PoolId> {
        let mut missing_pools = vec![];

        for (pool_id, container) in containers.iter_mut() {
            let required_volume = container.required_volume();
            let candidates: Vec<StockTubeCandidate> = self
                .source
                .find_tubes(*pool_id, container.stock_concentration, required_volume)
                .into_iter()
                .filter(|candidate| !self.excluded_racks.contains(&candidate.rack_barcode))
                .collect();
            debug!(
                "Stock tube candidates. pool: {}, required_volume: {}, candidates: {}",
                pool_id,
                required_volume,
                candidates.len()
            );

            let chosen = self.choose(candidates, container.requested_tube.as_ref());
            match chosen {
                Some(candidate) => {
                    info!(
                        "Picked stock tube. pool: {}, tube: '{}', rack: '{}'",
                        pool_id, candidate.tube_barcode, candidate.rack_barcode
                    );
                    container.tube = Some(candidate);
                }
                None => missing_pools.push(*pool_id),
            }
        }

        missing_pools
    }

    /// A requested tube wins outright; otherwise the candidate with the most
    /// remaining volume, ties broken by rack barcode then position.
    fn choose(
        &self,
        mut candidates: Vec<StockTubeCandidate>,
        requested_tube: Option<&TubeBarcode>,
    ) -> Option<StockTubeCandidate> {
        if candidates.is_empty() {
            return None;
        }

        if let Some(requested) = requested_tube {
            if let Some(index) = candidates
                .iter()
                .position(|candidate| candidate.tube_barcode == *requested)
            {
                return Some(candidates.swap_remove(index));
            }
        }
        if let Some(index) = candidates
            .iter()
            .position(|candidate| self.requested_tubes.contains(&candidate.tube_barcode))
        {
            return Some(candidates.swap_remove(index));
        }

        candidates.sort_by(|left, right| {
            right
                .volume
                .partial_cmp(&left.volume)
                .unwrap()
                .then_with(|| left.rack_barcode.cmp(&right.rack_barcode))
                .then_with(|| left.position.cmp(&right.position))
        });
        Some(candidates.remove(0))
    }
}
