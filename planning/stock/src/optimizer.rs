use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use lab::geometry::{RackPosition, RackShape};
use lab::pool::PoolId;
use thiserror::Error;
use tracing::debug;

use crate::container::StockTubeContainer;

#[derive(Error, Debug, PartialEq)]
pub enum OptimizerError {
    #[error("{count} tubes do not fit into one stock rack of {capacity} positions")]
    CapacityExceeded { count: usize, capacity: usize },
}

/// Assigns stock-rack positions to the picked tubes so that source and target
/// columns line up wherever possible, minimising Biomek head moves.
///
/// Containers whose targets all share one column are placed into the aligned
/// stock-rack column first (splitting overfull columns); everything else is
/// scored over the free positions, ties resolved by the smallest pool id.
pub fn optimize_stock_rack_layout(
    containers: &BTreeMap<PoolId, &StockTubeContainer>,
) -> Result<BTreeMap<PoolId, RackPosition>, OptimizerError> {
    let shape = RackShape::SHAPE_96;
    if containers.len() > shape.size() {
        return Err(OptimizerError::CapacityExceeded {
            count: containers.len(),
            capacity: shape.size(),
        });
    }

    let mut free: BTreeSet<RackPosition> = shape.positions().collect();
    let mut placements: BTreeMap<PoolId, RackPosition> = BTreeMap::new();
    let mut overflow: Vec<PoolId> = vec![];

    // column-aligned pass: group containers by their dominant target column
    let mut by_column: BTreeMap<usize, Vec<PoolId>> = BTreeMap::new();
    for (pool_id, container) in containers.iter() {
        match dominant_column(container, shape) {
            Some(column) => by_column.entry(column).or_default().push(*pool_id),
            None => overflow.push(*pool_id),
        }
    }

    for (column, pool_ids) in by_column.iter() {
        for pool_id in pool_ids
            .iter()
            .sorted_by_key(|pool_id| (first_target_row(containers[*pool_id]), **pool_id))
        {
            let container = containers[pool_id];
            let preferred = container
                .all_targets()
                .map(|target| target.position)
                .filter(|position| position.column() == *column && shape.contains_position(*position))
                .find(|position| free.contains(position));
            let candidate = preferred.or_else(|| {
                free.iter()
                    .find(|position| position.column() == *column)
                    .copied()
            });
            match candidate {
                Some(position) => {
                    free.remove(&position);
                    placements.insert(*pool_id, position);
                }
                // column full: handled by the scoring pass
                None => overflow.push(*pool_id),
            }
        }
    }

    // scoring pass over the remaining tubes
    overflow.sort();
    for pool_id in overflow {
        let container = containers[&pool_id];
        let position = free
            .iter()
            .max_by_key(|position| {
                (
                    alignment_score(container, **position),
                    std::cmp::Reverse((position.row(), position.column())),
                )
            })
            .copied()
            .expect("capacity was checked; a free position remains");
        debug!(
            "Scored stock rack position. pool: {}, position: '{}'",
            pool_id, position
        );
        free.remove(&position);
        placements.insert(pool_id, position);
    }

    Ok(placements)
}

/// The single column all in-shape targets share, if any.
fn dominant_column(container: &StockTubeContainer, shape: RackShape) -> Option<usize> {
    let columns: BTreeSet<usize> = container
        .all_targets()
        .map(|target| target.position.column())
        .collect();
    match columns.len() {
        1 => {
            let column = *columns.iter().next().unwrap();
            (column < shape.columns).then_some(column)
        }
        _ => None,
    }
}

fn first_target_row(container: &StockTubeContainer) -> usize {
    container
        .all_targets()
        .map(|target| target.position.row())
        .min()
        .unwrap_or(usize::MAX)
}

/// Two points for sitting on a target position, one per column-aligned
/// target.
fn alignment_score(container: &StockTubeContainer, position: RackPosition) -> usize {
    container
        .all_targets()
        .map(|target| {
            if target.position == position {
                2
            } else if target.position.column() == position.column() {
                1
            } else {
                0
            }
        })
        .sum()
}

#[cfg(test)]
mod optimizer_tests {
    use std::sync::Arc;

    use lab::pool::{MoleculeDesignPool, MoleculeType};
    use layout::position::PositionKind;

    use super::*;

    fn pool(id: PoolId) -> Arc<MoleculeDesignPool> {
        Arc::new(MoleculeDesignPool {
            id,
            molecule_type: MoleculeType::SiRna,
            designs: [id * 10].into_iter().collect(),
            default_stock_concentration: 50_000.0,
        })
    }

    fn container_with_targets(id: PoolId, targets: &[&str]) -> StockTubeContainer {
        let mut container = StockTubeContainer::new(pool(id), PositionKind::Fixed, 50_000.0);
        for target in targets {
            container.add_target("plate_1", format!("{}:5", target).parse().unwrap());
        }
        container
    }

    fn optimize(containers: &[StockTubeContainer]) -> BTreeMap<PoolId, RackPosition> {
        let by_pool: BTreeMap<PoolId, &StockTubeContainer> = containers
            .iter()
            .map(|container| (container.pool.id, container))
            .collect();
        optimize_stock_rack_layout(&by_pool).unwrap()
    }

    #[test]
    fn one_to_one_targets_keep_their_positions() {
        let containers = vec![
            container_with_targets(205200, &["A1"]),
            container_with_targets(205201, &["B1"]),
            container_with_targets(205202, &["C2"]),
        ];

        let placements = optimize(&containers);

        assert_eq!(placements[&205200], "A1".parse().unwrap());
        assert_eq!(placements[&205201], "B1".parse().unwrap());
        assert_eq!(placements[&205202], "C2".parse().unwrap());
    }

    #[test]
    fn placements_are_unique_and_in_shape() {
        let containers: Vec<StockTubeContainer> = (0..40)
            .map(|i| {
                let label = format!(
                    "{}{}",
                    char::from(b'A' + (i % 8) as u8),
                    i / 8 + 1
                );
                container_with_targets(205200 + i as u32, &[label.as_str()])
            })
            .collect();

        let placements = optimize(&containers);

        assert_eq!(placements.len(), 40);
        let unique: BTreeSet<&RackPosition> = placements.values().collect();
        assert_eq!(unique.len(), 40);
        for position in placements.values() {
            assert!(RackShape::SHAPE_96.contains_position(*position));
        }
    }

    #[test]
    fn multi_column_targets_fall_back_to_scoring() {
        let containers = vec![
            // spans two columns: scored placement lands on one of its targets
            container_with_targets(205200, &["A1", "A2"]),
        ];

        let placements = optimize(&containers);
        let position = placements[&205200];
        assert!(position == "A1".parse().unwrap() || position == "A2".parse().unwrap());
    }

    #[test]
    fn overfull_columns_are_split() {
        // nine tubes all targeting column 1 of an 8-row rack
        let containers: Vec<StockTubeContainer> = (0..9)
            .map(|i| {
                let label = format!("{}1", char::from(b'A' + (i % 8) as u8));
                container_with_targets(205200 + i as u32, &[label.as_str()])
            })
            .collect();

        let placements = optimize(&containers);

        assert_eq!(placements.len(), 9);
        let unique: BTreeSet<&RackPosition> = placements.values().collect();
        assert_eq!(unique.len(), 9);
        let in_column_1 = placements
            .values()
            .filter(|position| position.column() == 0)
            .count();
        assert_eq!(in_column_1, 8);
    }

    #[test]
    fn capacity_is_bounded_by_the_stock_rack() {
        let containers: Vec<StockTubeContainer> =
            (0..97).map(|i| container_with_targets(205200 + i as u32, &[])).collect();
        let by_pool: BTreeMap<PoolId, &StockTubeContainer> = containers
            .iter()
            .map(|container| (container.pool.id, container))
            .collect();

        assert_eq!(
            optimize_stock_rack_layout(&by_pool),
            Err(OptimizerError::CapacityExceeded {
                count: 97,
                capacity: 96
            })
        );
    }
}
