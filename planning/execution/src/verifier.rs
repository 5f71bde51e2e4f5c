use std::collections::BTreeSet;

use lab::geometry::RackPosition;
use lab::rack::Rack;
use lab::units::STOCK_DEAD_VOLUME;
use layout::stock_layout::StockRackLayout;
use util::issue::{IssueKind, IssueLog};
use util::number;

/// Verifies the rack that will receive the new pool samples: a tube at every
/// layout position with the planned barcode, no strays, nothing filled yet.
pub fn verify_target_rack(rack: &Rack, layout: &StockRackLayout, issues: &mut IssueLog) -> bool {
    let before = issues.errors().count();

    let expected: BTreeSet<RackPosition> = layout.rack_positions().collect();
    let actual: BTreeSet<RackPosition> = rack.tubes().map(|(position, _)| position).collect();

    for position in expected.difference(&actual) {
        issues.error(
            IssueKind::Verification,
            format!("Rack '{}' is missing a tube at position '{}'", rack.barcode, position),
        );
    }
    for position in actual.difference(&expected) {
        issues.error(
            IssueKind::Verification,
            format!("Rack '{}' holds an unexpected tube at position '{}'", rack.barcode, position),
        );
    }

    for (position, barcode) in rack.tubes() {
        let Some(planned) = layout.position(position) else {
            continue;
        };
        if planned.tube_barcode != *barcode {
            issues.error(
                IssueKind::Verification,
                format!(
                    "Tube at '{}' of rack '{}' has barcode '{}', the plan names '{}'",
                    position, rack.barcode, barcode, planned.tube_barcode
                ),
            );
        }
        if rack.sample(position).is_some() {
            issues.error(
                IssueKind::Verification,
                format!(
                    "Tube at '{}' of rack '{}' is not empty",
                    position, rack.barcode
                ),
            );
        }
    }

    issues.errors().count() == before
}

/// Verifies a source stock rack against its layout: the molecule designs
/// actually present at each position must match the planned pool, and every
/// tube must hold enough volume for its transfers plus the dead volume.
pub fn verify_source_rack(rack: &Rack, layout: &StockRackLayout, issues: &mut IssueLog) -> bool {
    let before = issues.errors().count();

    for planned in layout.positions() {
        let position = planned.position;
        let Some(sample) = rack.sample(position) else {
            issues.error(
                IssueKind::Verification,
                format!(
                    "Rack '{}' has no sample at position '{}' (pool {} expected)",
                    rack.barcode, position, planned.pool.id
                ),
            );
            continue;
        };

        if sample.design_ids() != planned.pool.designs {
            issues.error(
                IssueKind::Verification,
                format!(
                    "The molecule designs at '{}' of rack '{}' do not match pool {}",
                    position, rack.barcode, planned.pool.id
                ),
            );
        }

        let required = planned.transfer_volume() + STOCK_DEAD_VOLUME;
        if number::is_smaller(sample.volume, required) {
            issues.error(
                IssueKind::Verification,
                format!(
                    "The sample at '{}' of rack '{}' holds {} ul, {} ul are required",
                    position,
                    rack.barcode,
                    number::format_quantity(sample.volume),
                    number::format_quantity(required)
                ),
            );
        }
    }

    issues.errors().count() == before
}

#[cfg(test)]
mod verifier_tests {
    use std::sync::Arc;

    use lab::barcode::RackBarcode;
    use lab::container::Sample;
    use lab::geometry::RackShape;
    use lab::pool::{MoleculeDesignPool, MoleculeType};
    use layout::stock_layout::StockRackPosition;

    use super::*;

    fn barcode(value: &str) -> RackBarcode {
        value.parse().unwrap()
    }

    fn position(label: &str) -> RackPosition {
        label.parse().unwrap()
    }

    fn pool(id: u32, designs: &[u32]) -> Arc<MoleculeDesignPool> {
        Arc::new(MoleculeDesignPool {
            id,
            molecule_type: MoleculeType::SiRna,
            designs: designs.iter().copied().collect(),
            default_stock_concentration: 50_000.0,
        })
    }

    fn layout_with(positions: &[(&str, u32, &str)]) -> StockRackLayout {
        let mut layout = StockRackLayout::new(RackShape::SHAPE_96);
        for (label, pool_id, tube) in positions {
            layout
                .add_position(
                    StockRackPosition::new(position(label), pool(*pool_id, &[*pool_id * 10]), tube.parse().unwrap())
                        .with_targets(vec!["A1:3".parse().unwrap()]),
                )
                .unwrap();
        }
        layout
    }

    #[test]
    fn matching_target_rack_passes() {
        let layout = layout_with(&[("A1", 1056000, "1000201"), ("B1", 1056001, "1000202")]);
        let mut rack = Rack::tube_rack(barcode("02481543"), "pool rack", RackShape::SHAPE_96);
        rack.add_tube(position("A1"), "1000201".parse().unwrap()).unwrap();
        rack.add_tube(position("B1"), "1000202".parse().unwrap()).unwrap();

        let mut issues = IssueLog::new();
        assert!(verify_target_rack(&rack, &layout, &mut issues));
        assert!(!issues.has_errors());
    }

    #[test]
    fn missing_extra_and_filled_tubes_are_reported_per_position() {
        let layout = layout_with(&[("A1", 1056000, "1000201"), ("B1", 1056001, "1000202")]);
        let mut rack = Rack::tube_rack(barcode("02481543"), "pool rack", RackShape::SHAPE_96);
        // B1 missing, C1 extra, A1 present but already filled
        rack.add_tube(position("A1"), "1000201".parse().unwrap()).unwrap();
        rack.add_tube(position("C1"), "1000209".parse().unwrap()).unwrap();
        rack.container_mut(position("A1")).unwrap().sample = Some(Sample::new(10.0));

        let mut issues = IssueLog::new();
        assert!(!verify_target_rack(&rack, &layout, &mut issues));

        let messages: Vec<&str> = issues.errors().map(|issue| issue.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("missing a tube at position 'B1'")));
        assert!(messages.iter().any(|m| m.contains("unexpected tube at position 'C1'")));
        assert!(messages.iter().any(|m| m.contains("'A1' of rack '02481543' is not empty")));
    }

    #[test]
    fn source_rack_design_mismatch_is_an_error() {
        let layout = layout_with(&[("A1", 1056000, "1000201")]);
        let mut rack = Rack::tube_rack(barcode("09999991"), "source", RackShape::SHAPE_96);
        rack.add_tube(position("A1"), "1000201".parse().unwrap()).unwrap();
        rack.container_mut(position("A1")).unwrap().sample =
            Some(Sample::new(50.0).with_molecule(999, 50_000.0));

        let mut issues = IssueLog::new();
        assert!(!verify_source_rack(&rack, &layout, &mut issues));
        assert!(issues
            .errors()
            .next()
            .unwrap()
            .message
            .contains("do not match pool 1056000"));
    }

    #[test]
    fn source_volume_boundary_uses_the_dead_volume() {
        let layout = layout_with(&[("A1", 1056000, "1000201")]);
        let mut rack = Rack::tube_rack(barcode("09999991"), "source", RackShape::SHAPE_96);
        rack.add_tube(position("A1"), "1000201".parse().unwrap()).unwrap();
        // exactly transfer volume (3) + dead volume (5)
        rack.container_mut(position("A1")).unwrap().sample =
            Some(Sample::new(8.0).with_molecule(10560000, 50_000.0));

        let mut issues = IssueLog::new();
        assert!(verify_source_rack(&rack, &layout, &mut issues));

        rack.container_mut(position("A1")).unwrap().sample =
            Some(Sample::new(7.99).with_molecule(10560000, 50_000.0));
        let mut issues = IssueLog::new();
        assert!(!verify_source_rack(&rack, &layout, &mut issues));
    }
}
