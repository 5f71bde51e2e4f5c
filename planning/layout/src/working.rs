use std::collections::{BTreeMap, BTreeSet};

use lab::geometry::{RackPosition, RackShape};
use lab::rack_layout::RackLayout;
use lab::tag::Tag;
use thiserror::Error;

/// A typed annotation of one rack position.
///
/// Implementations carry the parameter values of their layout family and emit
/// one tag per non-empty parameter.
pub trait WorkingPosition: Clone + PartialEq + std::fmt::Debug {
    fn rack_position(&self) -> RackPosition;

    fn tag_set(&self) -> BTreeSet<Tag>;

    /// Empty positions are dropped when the layout is closed.
    fn is_empty(&self) -> bool;

    /// Documentation positions (untreated/untransfected) survive closing
    /// despite carrying no liquid.
    fn is_documentation(&self) -> bool {
        false
    }
}

/// A mapping from rack positions to working positions over one shape.
///
/// Layouts are built up during planning, then closed: closing drops empty
/// positions and freezes the mapping.
#[derive(Debug, Clone)]
pub struct WorkingLayout<P: WorkingPosition> {
    shape: RackShape,
    positions: BTreeMap<RackPosition, P>,
    closed: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum WorkingLayoutError {
    #[error("Position '{position}' is outside the {shape} layout shape")]
    PositionOutOfShape { position: RackPosition, shape: RackShape },

    #[error("Position '{0}' is already present in the layout")]
    DuplicatePosition(RackPosition),

    #[error("The layout is closed")]
    LayoutClosed,

    #[error("The working position is placed at '{actual}' but was added for '{expected}'")]
    PositionMismatch { expected: RackPosition, actual: RackPosition },
}

impl<P: WorkingPosition> WorkingLayout<P> {
    pub fn new(shape: RackShape) -> Self {
        Self {
            shape,
            positions: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn shape(&self) -> RackShape {
        self.shape
    }

    pub fn add_position(&mut self, position: P) -> Result<(), WorkingLayoutError> {
        if self.closed {
            return Err(WorkingLayoutError::LayoutClosed);
        }
        let rack_position = position.rack_position();
        if !self.shape.contains_position(rack_position) {
            return Err(WorkingLayoutError::PositionOutOfShape {
                position: rack_position,
                shape: self.shape,
            });
        }
        if self.positions.contains_key(&rack_position) {
            return Err(WorkingLayoutError::DuplicatePosition(rack_position));
        }
        self.positions.insert(rack_position, position);
        Ok(())
    }

    pub fn del_position(&mut self, rack_position: RackPosition) -> Option<P> {
        if self.closed {
            return None;
        }
        self.positions.remove(&rack_position)
    }

    pub fn position(&self, rack_position: RackPosition) -> Option<&P> {
        self.positions.get(&rack_position)
    }

    pub fn position_mut(&mut self, rack_position: RackPosition) -> Option<&mut P> {
        self.positions.get_mut(&rack_position)
    }

    /// Working positions in row-major rack position order.
    pub fn positions(&self) -> impl Iterator<Item = &P> {
        self.positions.values()
    }

    pub fn rack_positions(&self) -> impl Iterator<Item = RackPosition> + '_ {
        self.positions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn tags(&self) -> BTreeSet<Tag> {
        self.positions
            .values()
            .flat_map(|position| position.tag_set())
            .collect()
    }

    pub fn tags_for_position(&self, rack_position: RackPosition) -> BTreeSet<Tag> {
        self.positions
            .get(&rack_position)
            .map(|position| position.tag_set())
            .unwrap_or_default()
    }

    pub fn positions_for_tag(&self, tag: &Tag) -> BTreeSet<RackPosition> {
        self.positions
            .iter()
            .filter(|(_, position)| position.tag_set().contains(tag))
            .map(|(rack_position, _)| *rack_position)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops empty positions (documentation positions stay) and freezes the
    /// layout. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.positions
            .retain(|_, position| !position.is_empty() || position.is_documentation());
        self.closed = true;
    }

    /// Closes the layout and builds its persistence form: positions grouped
    /// by distinct tag set.
    pub fn create_rack_layout(&mut self) -> RackLayout {
        self.close();

        let mut groups: BTreeMap<BTreeSet<Tag>, BTreeSet<RackPosition>> = BTreeMap::new();
        for (rack_position, position) in self.positions.iter() {
            groups
                .entry(position.tag_set())
                .or_default()
                .insert(*rack_position);
        }

        let mut rack_layout = RackLayout::new(self.shape);
        for (tags, positions) in groups {
            // positions came from this layout, so they are within the shape
            rack_layout
                .add_tagged_position_set(tags, positions)
                .expect("layout positions are within the layout shape");
        }
        rack_layout
    }
}

impl<P: WorkingPosition> PartialEq for WorkingLayout<P> {
    /// Same shape, same mapping; the closed flag does not participate.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.positions == other.positions
    }
}

#[cfg(test)]
mod working_layout_tests {
    use std::sync::Arc;

    use lab::pool::{MoleculeDesignPool, MoleculeType};

    use super::*;
    use crate::parameter::POOL_PARAMETERS;
    use crate::position::{PoolPosition, PositionKind};

    fn pool(id: u32) -> Arc<MoleculeDesignPool> {
        Arc::new(MoleculeDesignPool {
            id,
            molecule_type: MoleculeType::SiRna,
            designs: [id * 10].into_iter().collect(),
            default_stock_concentration: 50_000.0,
        })
    }

    fn position(label: &str) -> RackPosition {
        label.parse().unwrap()
    }

    #[test]
    fn add_rejects_duplicates_and_out_of_shape() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_96);
        layout
            .add_position(PoolPosition::fixed(position("A1"), pool(205200), &POOL_PARAMETERS))
            .unwrap();

        assert_eq!(
            layout.add_position(PoolPosition::fixed(position("A1"), pool(205201), &POOL_PARAMETERS)),
            Err(WorkingLayoutError::DuplicatePosition(position("A1")))
        );
        assert_eq!(
            layout.add_position(PoolPosition::fixed(RackPosition::new(11, 0), pool(205201), &POOL_PARAMETERS)),
            Err(WorkingLayoutError::PositionOutOfShape {
                position: RackPosition::new(11, 0),
                shape: RackShape::SHAPE_96,
            })
        );
    }

    #[test]
    fn deleting_positions_reopens_nothing_once_closed() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_96);
        layout
            .add_position(PoolPosition::fixed(position("A1"), pool(205200), &POOL_PARAMETERS))
            .unwrap();
        layout
            .add_position(PoolPosition::fixed(position("B1"), pool(205201), &POOL_PARAMETERS))
            .unwrap();

        assert!(layout.del_position(position("B1")).is_some());
        assert_eq!(layout.len(), 1);

        layout.close();
        assert!(layout.del_position(position("A1")).is_none());
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn closing_drops_empty_positions_but_keeps_documentation() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_96);
        layout
            .add_position(PoolPosition::fixed(position("A1"), pool(205200), &POOL_PARAMETERS))
            .unwrap();
        layout
            .add_position(PoolPosition::of_kind(position("B1"), PositionKind::Empty, &POOL_PARAMETERS))
            .unwrap();
        layout
            .add_position(PoolPosition::of_kind(
                position("C1"),
                PositionKind::Untreated,
                &POOL_PARAMETERS,
            ))
            .unwrap();

        layout.close();

        assert_eq!(layout.len(), 2);
        assert!(layout.position(position("B1")).is_none());
        assert!(layout.position(position("C1")).is_some());
        assert_eq!(
            layout.add_position(PoolPosition::fixed(position("D1"), pool(205201), &POOL_PARAMETERS)),
            Err(WorkingLayoutError::LayoutClosed)
        );
    }

    #[test]
    fn rack_layout_groups_by_tag_set() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_96);
        let shared = pool(205200);
        layout
            .add_position(PoolPosition::fixed(position("A1"), shared.clone(), &POOL_PARAMETERS))
            .unwrap();
        layout
            .add_position(PoolPosition::fixed(position("B1"), shared, &POOL_PARAMETERS))
            .unwrap();
        layout
            .add_position(PoolPosition::fixed(position("C1"), pool(205201), &POOL_PARAMETERS))
            .unwrap();

        let rack_layout = layout.create_rack_layout();

        // two distinct tag sets: one per pool
        assert_eq!(rack_layout.tagged_position_sets().len(), 2);
        let positions_205200 = rack_layout.positions_for_tag(&Tag::new("iso", "molecule_design_pool_id", "205200"));
        assert_eq!(positions_205200, [position("A1"), position("B1")].into_iter().collect());
    }

    #[test]
    fn create_rack_layout_is_idempotent_once_closed() {
        let mut layout = WorkingLayout::new(RackShape::SHAPE_96);
        layout
            .add_position(PoolPosition::fixed(position("A1"), pool(205200), &POOL_PARAMETERS))
            .unwrap();

        let first = layout.create_rack_layout();
        let second = layout.create_rack_layout();

        assert_eq!(first, second);
    }
}
