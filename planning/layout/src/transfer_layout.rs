use std::collections::BTreeSet;

use lab::geometry::RackPosition;
use lab::pool::PoolRegistry;
use lab::rack_layout::RackLayout;
use lab::tag::Tag;
use util::issue::{IssueKind, IssueLog};

use crate::converter::{convert_layout, ParameterMap, PositionBuilder};
use crate::parameter::{Parameter, ParameterSet, TRANSFER_PARAMETERS};
use crate::pool_layout::{effective_value, PoolLayoutConverter};
use crate::position::PoolPosition;
use crate::transfer_target::{format_targets, parse_targets, TransferTarget};
use crate::working::{WorkingLayout, WorkingPosition};

/// A pool position that additionally knows where its liquid goes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPosition {
    pub pool_position: PoolPosition,
    pub transfer_targets: Vec<TransferTarget>,
}

impl TransferPosition {
    pub fn new(pool_position: PoolPosition) -> Self {
        Self {
            pool_position,
            transfer_targets: vec![],
        }
    }

    pub fn with_targets(mut self, transfer_targets: Vec<TransferTarget>) -> Self {
        self.transfer_targets = transfer_targets;
        self
    }

    /// Total volume in ul leaving this position.
    pub fn transfer_volume(&self) -> f64 {
        self.transfer_targets
            .iter()
            .map(|target| target.volume)
            .sum()
    }
}

impl WorkingPosition for TransferPosition {
    fn rack_position(&self) -> RackPosition {
        self.pool_position.rack_position()
    }

    fn tag_set(&self) -> BTreeSet<Tag> {
        let mut tags = self.pool_position.tag_set();
        if !self.transfer_targets.is_empty() {
            tags.insert(Tag::new(
                "iso",
                Parameter::TransferTargets.predicate(),
                format_targets(&self.transfer_targets),
            ));
        }
        tags
    }

    fn is_empty(&self) -> bool {
        self.pool_position.is_empty() && self.transfer_targets.is_empty()
    }

    fn is_documentation(&self) -> bool {
        self.pool_position.is_documentation()
    }
}

pub type TransferLayout = WorkingLayout<TransferPosition>;

/// Converts rack layouts into transfer layouts, parsing `label:volume[:marker]`
/// target lists and enforcing target uniqueness across the layout.
pub struct TransferLayoutConverter<'a> {
    pool_converter: PoolLayoutConverter<'a>,
    allow_duplicate_targets: bool,
}

impl<'a> TransferLayoutConverter<'a> {
    pub fn new(pools: &'a PoolRegistry) -> Self {
        Self {
            pool_converter: PoolLayoutConverter::for_transfer(pools),
            allow_duplicate_targets: false,
        }
    }

    /// Some layout families (e.g. one source feeding replicates on several
    /// racks) legitimately hit the same well label twice.
    pub fn allowing_duplicate_targets(mut self) -> Self {
        self.allow_duplicate_targets = true;
        self
    }

    pub fn convert(&self, rack_layout: &RackLayout, issues: &mut IssueLog) -> Option<TransferLayout> {
        convert_layout(self, rack_layout, issues)
    }
}

impl PositionBuilder for TransferLayoutConverter<'_> {
    type Position = TransferPosition;

    fn parameter_set(&self) -> &'static ParameterSet {
        &TRANSFER_PARAMETERS
    }

    fn build_position(
        &self,
        rack_position: RackPosition,
        values: &ParameterMap,
        issues: &mut IssueLog,
    ) -> Option<TransferPosition> {
        let pool_position = self
            .pool_converter
            .build_position(rack_position, values, issues)?;

        let transfer_targets = match effective_value(values, Parameter::TransferTargets) {
            Some(value) => match parse_targets(value) {
                Ok(targets) => targets,
                Err(error) => {
                    issues.error(
                        IssueKind::Conversion,
                        format!("Position '{}': {}", rack_position, error),
                    );
                    return None;
                }
            },
            None => vec![],
        };

        Some(TransferPosition {
            pool_position,
            transfer_targets,
        })
    }

    fn check_layout(&self, layout: &WorkingLayout<TransferPosition>, issues: &mut IssueLog) {
        if self.allow_duplicate_targets {
            return;
        }
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for position in layout.positions() {
            for target in position.transfer_targets.iter() {
                if !seen.insert(target.hash_value()) {
                    issues.error(
                        IssueKind::LayoutInvariant,
                        format!(
                            "Duplicate transfer target '{}' (source position '{}')",
                            target.hash_value(),
                            position.rack_position()
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod transfer_layout_converter_tests {
    use lab::geometry::RackShape;
    use lab::pool::{MoleculeDesignPool, MoleculeType};

    use super::*;
    use crate::parameter::TRANSFER_PARAMETERS;

    fn registry() -> PoolRegistry {
        let mut registry = PoolRegistry::new();
        registry
            .add(MoleculeDesignPool {
                id: 205200,
                molecule_type: MoleculeType::SiRna,
                designs: [2052001].into_iter().collect(),
                default_stock_concentration: 50_000.0,
            })
            .unwrap();
        registry
    }

    fn position(label: &str) -> RackPosition {
        label.parse().unwrap()
    }

    #[test]
    fn targets_round_trip() {
        let registry = registry();
        let mut layout = TransferLayout::new(RackShape::SHAPE_96);
        let pool_position = PoolPosition::fixed(position("A1"), registry.find(205200).unwrap(), &TRANSFER_PARAMETERS);
        layout
            .add_position(
                TransferPosition::new(pool_position)
                    .with_targets(parse_targets("B1:5-C1:7.5:p#1").unwrap()),
            )
            .unwrap();

        let rack_layout = layout.create_rack_layout();
        let mut issues = IssueLog::new();
        let converted = TransferLayoutConverter::new(&registry)
            .convert(&rack_layout, &mut issues)
            .unwrap();

        assert_eq!(converted, layout);
    }

    #[test]
    fn duplicate_targets_are_rejected_by_default() {
        let registry = registry();
        let mut rack_layout = RackLayout::new(RackShape::SHAPE_96);
        rack_layout
            .add_tagged_position_set(
                BTreeSet::from([
                    Tag::new("iso", "molecule_design_pool_id", "205200"),
                    Tag::new("iso", "transfer_targets", "D1:5-D1:10"),
                ]),
                [position("A1")].into_iter().collect(),
            )
            .unwrap();

        let mut issues = IssueLog::new();
        let result = TransferLayoutConverter::new(&registry).convert(&rack_layout, &mut issues);

        assert!(result.is_none());
        assert!(issues
            .errors()
            .next()
            .unwrap()
            .message
            .contains("Duplicate transfer target 'D1'"));
    }

    #[test]
    fn duplicate_targets_can_be_allowed() {
        let registry = registry();
        let mut rack_layout = RackLayout::new(RackShape::SHAPE_96);
        rack_layout
            .add_tagged_position_set(
                BTreeSet::from([
                    Tag::new("iso", "molecule_design_pool_id", "205200"),
                    Tag::new("iso", "transfer_targets", "D1:5-D1:10"),
                ]),
                [position("A1")].into_iter().collect(),
            )
            .unwrap();

        let mut issues = IssueLog::new();
        let result = TransferLayoutConverter::new(&registry)
            .allowing_duplicate_targets()
            .convert(&rack_layout, &mut issues);

        assert!(result.is_some());
        assert!(!issues.has_errors());
    }
}
