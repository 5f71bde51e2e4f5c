use std::collections::BTreeSet;

use thiserror::Error;

use crate::geometry::{RackPosition, RackShape};
use crate::tag::Tag;

/// One distinct tag set and the positions it applies to.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct TaggedRackPositionSet {
    pub tags: BTreeSet<Tag>,
    pub positions: BTreeSet<RackPosition>,
}

/// The persistence form of a layout: a shape plus tagged position sets.
///
/// A rack layout carries no semantics of its own; converters turn it into a
/// typed working layout and back.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct RackLayout {
    pub shape: RackShape,
    tagged_position_sets: Vec<TaggedRackPositionSet>,
}

#[derive(Error, Debug, PartialEq)]
pub enum RackLayoutError {
    #[error("Position '{position}' is outside the {shape} rack layout shape")]
    PositionOutOfShape { position: RackPosition, shape: RackShape },
}

impl RackLayout {
    pub fn new(shape: RackShape) -> Self {
        Self {
            shape,
            tagged_position_sets: vec![],
        }
    }

    pub fn add_tagged_position_set(
        &mut self,
        tags: BTreeSet<Tag>,
        positions: BTreeSet<RackPosition>,
    ) -> Result<(), RackLayoutError> {
        for position in positions.iter() {
            if !self.shape.contains_position(*position) {
                return Err(RackLayoutError::PositionOutOfShape {
                    position: *position,
                    shape: self.shape,
                });
            }
        }
        self.tagged_position_sets.push(TaggedRackPositionSet {
            tags,
            positions,
        });
        Ok(())
    }

    pub fn tagged_position_sets(&self) -> &[TaggedRackPositionSet] {
        &self.tagged_position_sets
    }

    /// Union of the tags of every set containing `position`.
    pub fn tags_for_position(&self, position: RackPosition) -> BTreeSet<Tag> {
        self.tagged_position_sets
            .iter()
            .filter(|set| set.positions.contains(&position))
            .flat_map(|set| set.tags.iter().cloned())
            .collect()
    }

    pub fn positions_for_tag(&self, tag: &Tag) -> BTreeSet<RackPosition> {
        self.tagged_position_sets
            .iter()
            .filter(|set| set.tags.contains(tag))
            .flat_map(|set| set.positions.iter().copied())
            .collect()
    }

    pub fn all_tags(&self) -> BTreeSet<Tag> {
        self.tagged_position_sets
            .iter()
            .flat_map(|set| set.tags.iter().cloned())
            .collect()
    }

    /// Positions carrying at least one tag.
    pub fn tagged_positions(&self) -> BTreeSet<RackPosition> {
        self.tagged_position_sets
            .iter()
            .flat_map(|set| set.positions.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tagged_position_sets.is_empty()
    }
}
