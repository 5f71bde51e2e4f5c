use std::collections::BTreeMap;

use layout::position::{PoolPosition, PositionKind};
use layout::working::{WorkingLayout, WorkingPosition};
use util::issue::{IssueKind, IssueLog};
use util::number;

use crate::determiner::{concentration_determiner, volume_determiner};
use crate::sector::{sector_index, SectorError};

/// The sector structure of a layout: which sectors repeat the same pool
/// pattern, at which concentration, and which sector can seed which by
/// dilution.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationData {
    pub number_sectors: usize,
    /// Equivalence classes of sector indices, each sorted ascending, classes
    /// ordered by their smallest member.
    pub associated_sectors: Vec<Vec<usize>>,
    pub sector_concentrations: Vec<Option<f64>>,
    /// `child -> parent`: the sector whose content seeds this one by
    /// dilution, if any. The inverse relation is derived on demand.
    pub parent_sectors: Vec<Option<usize>>,
    pub sector_volumes: Vec<Option<f64>>,
}

impl AssociationData {
    /// Associates the sectors of `layout`, regarding or ignoring fixed
    /// control positions.
    pub fn new(
        layout: &WorkingLayout<PoolPosition>,
        number_sectors: usize,
        regard_controls: bool,
        issues: &mut IssueLog,
    ) -> Option<Self> {
        let concentrations = {
            let determiner = concentration_determiner(number_sectors);
            let determiner = if regard_controls {
                determiner
            } else {
                determiner.ignoring_controls()
            };
            determiner.determine(layout, issues)?
        };
        let volumes = {
            let determiner = volume_determiner(number_sectors);
            let determiner = if regard_controls {
                determiner
            } else {
                determiner.ignoring_controls()
            };
            determiner.determine(layout, issues)?
        };

        let blocks = match collect_pool_blocks(layout, number_sectors, regard_controls) {
            Ok(blocks) => blocks,
            Err(error) => {
                issues.error(IssueKind::Geometry, error.to_string());
                return None;
            }
        };

        let associated_sectors = associate(number_sectors, &blocks);

        if blocks.values().any(|entries| entries.len() >= 2)
            && !check_concentration_multisets(&associated_sectors, &concentrations)
        {
            issues.error(
                IssueKind::Geometry,
                "The sector groups do not share the same set of concentrations; \
                 rack transfers apply one volume per sector pair"
                    .to_string(),
            );
            return None;
        }

        let parent_sectors = derive_parents(&associated_sectors, &concentrations, number_sectors);

        Some(Self {
            number_sectors,
            associated_sectors,
            sector_concentrations: concentrations,
            parent_sectors,
            sector_volumes: volumes,
        })
    }

    /// Tries with control positions regarded, then ignored. `None` means no
    /// association is possible and each well must be handled individually.
    pub fn find(layout: &WorkingLayout<PoolPosition>, number_sectors: usize) -> Option<Self> {
        let mut issues = IssueLog::new();
        if let Some(data) = Self::new(layout, number_sectors, true, &mut issues) {
            return Some(data);
        }
        let mut issues = IssueLog::new();
        Self::new(layout, number_sectors, false, &mut issues)
    }

    /// `parent -> children`, derived from the child->parent map.
    pub fn child_sectors(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (child, parent) in self.parent_sectors.iter().enumerate() {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(child);
            }
        }
        children
    }
}

type PoolBlocks = BTreeMap<(usize, usize), Vec<(usize, String)>>;

/// Pools per quadrant block: block coordinates -> (sector, pool key).
fn collect_pool_blocks(
    layout: &WorkingLayout<PoolPosition>,
    number_sectors: usize,
    regard_controls: bool,
) -> Result<PoolBlocks, SectorError> {
    let side = (number_sectors as f64).sqrt().round() as usize;
    let mut blocks: PoolBlocks = BTreeMap::new();

    for position in layout.positions() {
        if !position.kind.has_pool() {
            continue;
        }
        if !regard_controls && position.kind == PositionKind::Fixed {
            continue;
        }
        let rack_position = position.rack_position();
        let sector = sector_index(rack_position, number_sectors)?;
        let block = (rack_position.row() / side, rack_position.column() / side);
        blocks
            .entry(block)
            .or_default()
            .push((sector, position.pool_tag_value()));
    }

    Ok(blocks)
}

/// Two sectors are equivalent iff every block assigns them the same pool
/// (including "no pool here" on both sides).
fn associate(number_sectors: usize, blocks: &PoolBlocks) -> Vec<Vec<usize>> {
    fn pool_at(block: &Vec<(usize, String)>, sector: usize) -> Option<&String> {
        block
            .iter()
            .find(|(s, _)| *s == sector)
            .map(|(_, pool)| pool)
    }

    let equivalent = |left: usize, right: usize| -> bool {
        blocks
            .values()
            .all(|block| pool_at(block, left) == pool_at(block, right))
    };

    let mut assigned = vec![false; number_sectors];
    let mut classes: Vec<Vec<usize>> = vec![];
    for sector in 0..number_sectors {
        if assigned[sector] {
            continue;
        }
        let mut class = vec![sector];
        assigned[sector] = true;
        for candidate in (sector + 1)..number_sectors {
            if !assigned[candidate] && equivalent(sector, candidate) {
                class.push(candidate);
                assigned[candidate] = true;
            }
        }
        classes.push(class);
    }
    classes
}

/// Every class must exhibit the same multiset of concentrations.
fn check_concentration_multisets(classes: &[Vec<usize>], concentrations: &[Option<f64>]) -> bool {
    let mut reference: Option<Vec<f64>> = None;
    for class in classes {
        let mut values: Vec<f64> = class
            .iter()
            .filter_map(|sector| concentrations[*sector])
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        match &reference {
            None => reference = Some(values),
            Some(expected) => {
                if expected.len() != values.len()
                    || !expected
                        .iter()
                        .zip(values.iter())
                        .all(|(a, b)| number::is_equal(*a, *b))
                {
                    return false;
                }
            }
        }
    }
    true
}

/// Within each class, a sector's parent is the one with the smallest
/// concentration still strictly above its own.
fn derive_parents(classes: &[Vec<usize>], concentrations: &[Option<f64>], number_sectors: usize) -> Vec<Option<usize>> {
    let mut parents: Vec<Option<usize>> = vec![None; number_sectors];
    for class in classes {
        for child in class.iter() {
            let Some(child_concentration) = concentrations[*child] else {
                continue;
            };
            let parent = class
                .iter()
                .filter(|sector| {
                    concentrations[**sector]
                        .map(|concentration| number::is_larger(concentration, child_concentration))
                        .unwrap_or(false)
                })
                .min_by(|a, b| {
                    concentrations[**a]
                        .unwrap()
                        .partial_cmp(&concentrations[**b].unwrap())
                        .unwrap()
                });
            parents[*child] = parent.copied();
        }
    }
    parents
}

#[cfg(test)]
mod associator_tests {
    use lab::geometry::{RackPosition, RackShape};
    use layout::parameter::ISO_PARAMETERS;
    use layout::position::PoolPosition;

    use super::*;

    fn position(row: usize, column: usize) -> RackPosition {
        RackPosition::new(row, column)
    }

    /// 384-well layout of 2x2 blocks: sectors 0 and 2 share one floating pool
    /// per block at 10 and 20 nM, sectors 1 and 3 share another.
    fn paired_dilution_layout() -> WorkingLayout<PoolPosition> {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_384);
        let mut placeholder = 0;
        for block_row in 0..2 {
            for block_column in 0..2 {
                placeholder += 1;
                let left = format!("md_{}", placeholder);
                placeholder += 1;
                let right = format!("md_{}", placeholder);

                let row = block_row * 2;
                let column = block_column * 2;
                for (position, pool, concentration) in [
                    (position(row, column), &left, 10.0),
                    (position(row, column + 1), &right, 10.0),
                    (position(row + 1, column), &left, 20.0),
                    (position(row + 1, column + 1), &right, 20.0),
                ] {
                    layout
                        .add_position(
                            PoolPosition::floating(position, pool.clone(), &ISO_PARAMETERS)
                                .with_volume(10.0)
                                .with_concentration(concentration),
                        )
                        .unwrap();
                }
            }
        }
        layout
    }

    #[test]
    fn paired_dilution_blocks_associate() {
        let layout = paired_dilution_layout();
        let mut issues = IssueLog::new();

        let data = AssociationData::new(&layout, 4, true, &mut issues).unwrap();

        assert_eq!(data.associated_sectors, vec![vec![0, 2], vec![1, 3]]);
        assert_eq!(
            data.sector_concentrations,
            vec![Some(10.0), Some(10.0), Some(20.0), Some(20.0)]
        );
        assert_eq!(data.parent_sectors, vec![Some(2), Some(3), None, None]);
        assert_eq!(data.sector_volumes, vec![Some(10.0); 4]);
    }

    #[test]
    fn child_sectors_is_the_inverse_relation() {
        let layout = paired_dilution_layout();
        let data = AssociationData::find(&layout, 4).unwrap();

        let children = data.child_sectors();
        assert_eq!(children.get(&2), Some(&vec![0]));
        assert_eq!(children.get(&3), Some(&vec![1]));
        assert_eq!(children.get(&0), None);
    }

    #[test]
    fn mismatched_concentration_multisets_fail() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_384);
        // one block: sectors {0,2} run 10 -> 20, sectors {1,3} run 10 -> 40
        for (row, column, pool, concentration) in [
            (0, 0, "md_1", 10.0),
            (0, 1, "md_2", 10.0),
            (1, 0, "md_1", 20.0),
            (1, 1, "md_2", 40.0),
        ] {
            layout
                .add_position(
                    PoolPosition::floating(position(row, column), pool, &ISO_PARAMETERS)
                        .with_volume(10.0)
                        .with_concentration(concentration),
                )
                .unwrap();
        }

        let mut issues = IssueLog::new();
        let result = AssociationData::new(&layout, 4, true, &mut issues);

        assert!(result.is_none());
        assert!(issues
            .errors()
            .next()
            .unwrap()
            .message
            .contains("same set of concentrations"));
    }

    #[test]
    fn find_retries_without_controls() {
        let mut layout = paired_dilution_layout();
        // a fixed control at a concentration its sector cannot absorb
        let control = std::sync::Arc::new(lab::pool::MoleculeDesignPool {
            id: 205200,
            molecule_type: lab::pool::MoleculeType::SiRna,
            designs: [2052001].into_iter().collect(),
            default_stock_concentration: 50_000.0,
        });
        layout
            .add_position(
                PoolPosition::fixed(position(8, 0), control, &ISO_PARAMETERS)
                    .with_volume(10.0)
                    .with_concentration(70.0),
            )
            .unwrap();

        let mut issues = IssueLog::new();
        assert!(AssociationData::new(&layout, 4, true, &mut issues).is_none());

        let data = AssociationData::find(&layout, 4).unwrap();
        assert_eq!(data.associated_sectors, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn all_empty_sectors_form_one_class() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_384);
        layout
            .add_position(
                PoolPosition::floating(position(0, 0), "md_1", &ISO_PARAMETERS)
                    .with_volume(10.0)
                    .with_concentration(10.0),
            )
            .unwrap();

        let data = AssociationData::find(&layout, 4).unwrap();

        assert_eq!(data.associated_sectors, vec![vec![0], vec![1, 2, 3]]);
        assert_eq!(data.parent_sectors, vec![None; 4]);
    }
}
