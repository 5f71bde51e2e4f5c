use std::collections::BTreeSet;
use std::sync::Arc;

use lab::barcode::TubeBarcode;
use lab::geometry::RackPosition;
use lab::pool::{MoleculeDesignPool, PoolRegistry};
use lab::rack_layout::RackLayout;
use lab::tag::Tag;
use util::issue::{IssueKind, IssueLog};

use crate::converter::{convert_layout, ParameterMap, PositionBuilder};
use crate::parameter::{Parameter, ParameterSet, STOCK_RACK_PARAMETERS};
use crate::pool_layout::effective_value;
use crate::transfer_target::{format_targets, parse_targets, TransferTarget};
use crate::working::{WorkingLayout, WorkingPosition};

/// One tube on a stock rack: the pool it holds, its barcode and the planned
/// transfers out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRackPosition {
    pub position: RackPosition,
    pub pool: Arc<MoleculeDesignPool>,
    pub tube_barcode: TubeBarcode,
    pub transfer_targets: Vec<TransferTarget>,
}

impl StockRackPosition {
    pub fn new(position: RackPosition, pool: Arc<MoleculeDesignPool>, tube_barcode: TubeBarcode) -> Self {
        Self {
            position,
            pool,
            tube_barcode,
            transfer_targets: vec![],
        }
    }

    pub fn with_targets(mut self, transfer_targets: Vec<TransferTarget>) -> Self {
        self.transfer_targets = transfer_targets;
        self
    }

    /// Total volume in ul leaving this tube.
    pub fn transfer_volume(&self) -> f64 {
        self.transfer_targets
            .iter()
            .map(|target| target.volume)
            .sum()
    }
}

impl WorkingPosition for StockRackPosition {
    fn rack_position(&self) -> RackPosition {
        self.position
    }

    fn tag_set(&self) -> BTreeSet<Tag> {
        let domain = STOCK_RACK_PARAMETERS.domain;
        let mut tags = BTreeSet::new();
        tags.insert(Tag::new(domain, Parameter::Pool.predicate(), self.pool.id.to_string()));
        tags.insert(Tag::new(
            domain,
            Parameter::TubeBarcode.predicate(),
            self.tube_barcode.to_string(),
        ));
        if !self.transfer_targets.is_empty() {
            tags.insert(Tag::new(
                domain,
                Parameter::TransferTargets.predicate(),
                format_targets(&self.transfer_targets),
            ));
        }
        tags
    }

    fn is_empty(&self) -> bool {
        false
    }
}

pub type StockRackLayout = WorkingLayout<StockRackPosition>;

/// Converts persisted stock rack layouts back into working form.
pub struct StockRackLayoutConverter<'a> {
    pools: &'a PoolRegistry,
}

impl<'a> StockRackLayoutConverter<'a> {
    pub fn new(pools: &'a PoolRegistry) -> Self {
        Self {
            pools,
        }
    }

    pub fn convert(&self, rack_layout: &RackLayout, issues: &mut IssueLog) -> Option<StockRackLayout> {
        convert_layout(self, rack_layout, issues)
    }
}

impl PositionBuilder for StockRackLayoutConverter<'_> {
    type Position = StockRackPosition;

    fn parameter_set(&self) -> &'static ParameterSet {
        &STOCK_RACK_PARAMETERS
    }

    fn build_position(
        &self,
        rack_position: RackPosition,
        values: &ParameterMap,
        issues: &mut IssueLog,
    ) -> Option<StockRackPosition> {
        let pool_value = effective_value(values, Parameter::Pool)?;
        let pool = match pool_value.trim().parse::<u32>() {
            Ok(pool_id) => match self.pools.find(pool_id) {
                Some(pool) => pool,
                None => {
                    issues.error(
                        IssueKind::Conversion,
                        format!("Unknown molecule design pool '{}' at position '{}'", pool_id, rack_position),
                    );
                    return None;
                }
            },
            Err(_) => {
                issues.error(
                    IssueKind::Conversion,
                    format!(
                        "Invalid pool value '{}' at position '{}'; stock rack positions hold fixed pools",
                        pool_value, rack_position
                    ),
                );
                return None;
            }
        };

        let Some(barcode_value) = effective_value(values, Parameter::TubeBarcode) else {
            issues.error(
                IssueKind::Conversion,
                format!("Missing tube barcode at position '{}'", rack_position),
            );
            return None;
        };
        let tube_barcode: TubeBarcode = match barcode_value.parse() {
            Ok(barcode) => barcode,
            Err(error) => {
                issues.error(
                    IssueKind::Conversion,
                    format!("Position '{}': {}", rack_position, error),
                );
                return None;
            }
        };

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

        Some(StockRackPosition {
            position: rack_position,
            pool,
            tube_barcode,
            transfer_targets,
        })
    }
}

#[cfg(test)]
mod stock_rack_layout_tests {
    use lab::geometry::RackShape;
    use lab::pool::{MoleculeDesignPool, MoleculeType};

    use super::*;

    fn registry() -> PoolRegistry {
        let mut registry = PoolRegistry::new();
        for id in [205200u32, 205201] {
            registry
                .add(MoleculeDesignPool {
                    id,
                    molecule_type: MoleculeType::SiRna,
                    designs: [id * 10].into_iter().collect(),
                    default_stock_concentration: 50_000.0,
                })
                .unwrap();
        }
        registry
    }

    fn position(label: &str) -> RackPosition {
        label.parse().unwrap()
    }

    #[test]
    fn stock_rack_layout_round_trips() {
        let registry = registry();
        let mut layout = StockRackLayout::new(RackShape::SHAPE_96);
        layout
            .add_position(
                StockRackPosition::new(position("A1"), registry.find(205200).unwrap(), "1000201".parse().unwrap())
                    .with_targets(parse_targets("C2:5").unwrap()),
            )
            .unwrap();
        layout
            .add_position(
                StockRackPosition::new(position("B1"), registry.find(205201).unwrap(), "1000202".parse().unwrap())
                    .with_targets(parse_targets("C3:5").unwrap()),
            )
            .unwrap();

        let rack_layout = layout.create_rack_layout();
        let mut issues = IssueLog::new();
        let converted = StockRackLayoutConverter::new(&registry)
            .convert(&rack_layout, &mut issues)
            .unwrap();

        assert_eq!(converted, layout);
    }

    #[test]
    fn missing_tube_barcode_is_an_error() {
        let registry = registry();
        let mut rack_layout = RackLayout::new(RackShape::SHAPE_96);
        rack_layout
            .add_tagged_position_set(
                BTreeSet::from([
                    Tag::new("stock_rack", "molecule_design_pool_id", "205200"),
                    Tag::new("stock_rack", "tube_barcode", "1000201"),
                ]),
                [position("A1")].into_iter().collect(),
            )
            .unwrap();
        rack_layout
            .add_tagged_position_set(
                BTreeSet::from([Tag::new("stock_rack", "molecule_design_pool_id", "205201")]),
                [position("B1")].into_iter().collect(),
            )
            .unwrap();

        let mut issues = IssueLog::new();
        let result = StockRackLayoutConverter::new(&registry).convert(&rack_layout, &mut issues);

        assert!(result.is_none());
        assert!(issues
            .errors()
            .next()
            .unwrap()
            .message
            .contains("Missing tube barcode at position 'B1'"));
    }
}
