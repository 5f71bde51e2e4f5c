use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use lab::barcode::RackBarcode;
use lab::container::{Sample, StockInfo};
use lab::pool::PoolRegistry;
use lab::rack::Rack;
use layout::stock_layout::{StockRackLayout, StockRackLayoutConverter};
use transfer::executed::{ExecutedTransfer, ExecutedWorklist};
use transfer::iso::{Iso, IsoStatus, StockRack};
use transfer::planned::{PlannedTransfer, PlannedWorklist, TransferType};
use tracing::info;
use util::issue::{IssueKind, IssueLog};
use util::number;

use crate::verifier::{verify_source_rack, verify_target_rack};

/// Applies the planned worklists of a pool-creation ISO to the bench state:
/// one buffer dilution into every new pool tube, then the stock transfers
/// from the single-design source racks.
///
/// Verification and application are atomic: all gates run first, transfers
/// are applied to copies, and state is only written back when every step
/// succeeded. Re-running a completed ISO is refused.
pub struct PoolCreationExecutor<'a> {
    pools: &'a PoolRegistry,
    user: String,
    timestamp: DateTime<Utc>,
}

/// The record of one successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub executed_worklists: Vec<ExecutedWorklist>,
}

impl<'a> PoolCreationExecutor<'a> {
    pub fn new(pools: &'a PoolRegistry, user: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            pools,
            user: user.into(),
            timestamp,
        }
    }

    pub fn execute(
        &self,
        iso: &mut Iso,
        pool_stock_rack: &StockRack,
        target_rack: &mut Rack,
        source_stock_racks: &[StockRack],
        source_racks: &mut BTreeMap<RackBarcode, Rack>,
        issues: &mut IssueLog,
    ) -> Option<ExecutionOutcome> {
        // double execution is refused before anything else happens
        for stock_rack in source_stock_racks {
            for worklist in stock_rack.worklist_series.iter() {
                if iso.was_worklist_executed(&worklist.label) {
                    issues.error(
                        IssueKind::InvariantPreservation,
                        "The stock transfer has already been executed",
                    );
                    return None;
                }
            }
        }
        if iso.status != IsoStatus::Queued {
            issues.error(
                IssueKind::InvariantPreservation,
                format!(
                    "ISO '{}' is in status '{}'; pool creation requires '{}'",
                    iso.label,
                    iso.status,
                    IsoStatus::Queued
                ),
            );
            return None;
        }

        let target_layout = StockRackLayoutConverter::new(self.pools).convert(&pool_stock_rack.rack_layout, issues)?;
        if target_rack.barcode != pool_stock_rack.rack_barcode {
            issues.error(
                IssueKind::InputValidity,
                format!(
                    "The rack '{}' does not belong to stock rack '{}' (barcode '{}')",
                    target_rack.barcode, pool_stock_rack.marker, pool_stock_rack.rack_barcode
                ),
            );
            return None;
        }
        if !verify_target_rack(target_rack, &target_layout, issues) {
            return None;
        }

        let source_layouts = self.verify_sources(source_stock_racks, source_racks, issues)?;

        let Some(buffer_worklist) = iso.worklist_series.iter().next() else {
            issues.error(
                IssueKind::InputValidity,
                format!("ISO '{}' has no buffer dilution worklist", iso.label),
            );
            return None;
        };
        if buffer_worklist.transfer_type != TransferType::SampleDilution {
            issues.error(
                IssueKind::InputValidity,
                format!(
                    "The first worklist of ISO '{}' is a '{}' worklist, expected '{}'",
                    iso.label,
                    buffer_worklist.transfer_type,
                    TransferType::SampleDilution
                ),
            );
            return None;
        }

        // apply to copies; bench state is written back only on full success
        let mut new_target = target_rack.clone();
        let mut new_sources = source_racks.clone();
        let mut executed_worklists = vec![];

        let executed_buffer = self.apply_buffer_worklist(buffer_worklist, &target_layout, &mut new_target, issues)?;
        executed_worklists.push(executed_buffer);

        for stock_rack in source_stock_racks {
            let layout = &source_layouts[&stock_rack.rack_barcode];
            let source_rack = new_sources
                .get_mut(&stock_rack.rack_barcode)
                .expect("sources were verified");
            for worklist in stock_rack.worklist_series.iter() {
                let executed =
                    self.apply_stock_transfer_worklist(worklist, layout, source_rack, &mut new_target, issues)?;
                executed_worklists.push(executed);
            }
        }

        self.convert_new_stock_samples(&target_layout, &mut new_target, &new_sources, source_stock_racks, issues)?;

        *target_rack = new_target;
        *source_racks = new_sources;
        iso.executed_worklists.extend(executed_worklists.clone());
        iso.transition(IsoStatus::Done)
            .expect("status was gated to queued above");
        info!(
            "Executed pool creation. iso: '{}', worklists: {}",
            iso.label,
            executed_worklists.len()
        );

        Some(ExecutionOutcome {
            executed_worklists,
        })
    }

    fn verify_sources(
        &self,
        source_stock_racks: &[StockRack],
        source_racks: &BTreeMap<RackBarcode, Rack>,
        issues: &mut IssueLog,
    ) -> Option<BTreeMap<RackBarcode, StockRackLayout>> {
        let mut layouts = BTreeMap::new();
        for stock_rack in source_stock_racks {
            let Some(layout) = StockRackLayoutConverter::new(self.pools).convert(&stock_rack.rack_layout, issues)
            else {
                return None;
            };
            let Some(rack) = source_racks.get(&stock_rack.rack_barcode) else {
                issues.error(
                    IssueKind::InputValidity,
                    format!("Source rack '{}' could not be found", stock_rack.rack_barcode),
                );
                return None;
            };
            if !verify_source_rack(rack, &layout, issues) {
                return None;
            }
            layouts.insert(stock_rack.rack_barcode.clone(), layout);
        }
        Some(layouts)
    }

    /// One dilution per new pool tube; dilution targets without a layout
    /// position are ignored.
    fn apply_buffer_worklist(
        &self,
        worklist: &PlannedWorklist,
        target_layout: &StockRackLayout,
        target_rack: &mut Rack,
        issues: &mut IssueLog,
    ) -> Option<ExecutedWorklist> {
        let mut executed = ExecutedWorklist::for_worklist(worklist);

        for transfer in worklist.sorted_transfers() {
            let PlannedTransfer::Dilution(dilution) = transfer else {
                unreachable!("the worklist type was checked");
            };
            if target_layout.position(dilution.target_position).is_none() {
                continue;
            }
            if !worklist.pipetting_specs.supports_volume(dilution.volume) {
                issues.error(
                    IssueKind::InputValidity,
                    format!(
                        "The dilution volume of {} ul at '{}' is outside the {} range",
                        number::format_quantity(dilution.volume),
                        dilution.target_position,
                        worklist.pipetting_specs.name
                    ),
                );
                return None;
            }
            let container = target_rack
                .container_mut(dilution.target_position)
                .expect("target rack was verified against the layout");
            let sample = container.sample.get_or_insert_with(|| Sample::new(0.0));
            if let Err(error) = sample.add_diluent(dilution.volume) {
                issues.error(IssueKind::InvariantPreservation, error.to_string());
                return None;
            }
            executed.add_execution(ExecutedTransfer {
                planned: (*transfer).clone(),
                source: None,
                target_rack: target_rack.barcode.clone(),
                target_position: Some(dilution.target_position),
                user: self.user.clone(),
                timestamp: self.timestamp,
            });
        }

        Some(executed)
    }

    /// Applies one stock-transfer worklist: a rack transfer moves every
    /// layout position 1:1, sample transfers move individually.
    fn apply_stock_transfer_worklist(
        &self,
        worklist: &PlannedWorklist,
        source_layout: &StockRackLayout,
        source_rack: &mut Rack,
        target_rack: &mut Rack,
        issues: &mut IssueLog,
    ) -> Option<ExecutedWorklist> {
        let mut executed = ExecutedWorklist::for_worklist(worklist);

        for transfer in worklist.sorted_transfers() {
            if !worklist.pipetting_specs.supports_volume(transfer.volume()) {
                issues.error(
                    IssueKind::InputValidity,
                    format!(
                        "The transfer volume of {} ul in worklist '{}' is outside the {} range",
                        number::format_quantity(transfer.volume()),
                        worklist.label,
                        worklist.pipetting_specs.name
                    ),
                );
                return None;
            }
            match transfer {
                PlannedTransfer::Rack(rack_transfer) => {
                    for planned_position in source_layout.positions() {
                        let position = planned_position.position;
                        self.move_volume(source_rack, position, target_rack, position, rack_transfer.volume, issues)?;
                    }
                    executed.add_execution(ExecutedTransfer {
                        planned: (*transfer).clone(),
                        source: None,
                        target_rack: target_rack.barcode.clone(),
                        target_position: None,
                        user: self.user.clone(),
                        timestamp: self.timestamp,
                    });
                }
                PlannedTransfer::Sample(sample_transfer) => {
                    self.move_volume(
                        source_rack,
                        sample_transfer.source_position,
                        target_rack,
                        sample_transfer.target_position,
                        sample_transfer.volume,
                        issues,
                    )?;
                    executed.add_execution(ExecutedTransfer {
                        planned: (*transfer).clone(),
                        source: Some((source_rack.barcode.clone(), sample_transfer.source_position)),
                        target_rack: target_rack.barcode.clone(),
                        target_position: Some(sample_transfer.target_position),
                        user: self.user.clone(),
                        timestamp: self.timestamp,
                    });
                }
                PlannedTransfer::Dilution(_) => {
                    issues.error(
                        IssueKind::InputValidity,
                        format!("The stock transfer worklist '{}' contains dilutions", worklist.label),
                    );
                    return None;
                }
            }
        }

        Some(executed)
    }

    /// Decrements the source, increments the target; a new target sample
    /// inherits the source composition at the diluted concentration.
    fn move_volume(
        &self,
        source_rack: &mut Rack,
        source_position: lab::geometry::RackPosition,
        target_rack: &mut Rack,
        target_position: lab::geometry::RackPosition,
        volume: f64,
        issues: &mut IssueLog,
    ) -> Option<()> {
        let Some(source_container) = source_rack.container_mut(source_position) else {
            issues.error(
                IssueKind::Verification,
                format!("Rack '{}' has no container at '{}'", source_rack.barcode, source_position),
            );
            return None;
        };
        let Some(source_sample) = source_container.sample.as_mut() else {
            issues.error(
                IssueKind::Verification,
                format!("Rack '{}' has no sample at '{}'", source_rack.barcode, source_position),
            );
            return None;
        };
        let source_snapshot = source_sample.clone();
        if let Err(error) = source_sample.take(volume) {
            issues.error(IssueKind::InvariantPreservation, error.to_string());
            return None;
        }

        let Some(target_container) = target_rack.container_mut(target_position) else {
            issues.error(
                IssueKind::Verification,
                format!("Rack '{}' has no container at '{}'", target_rack.barcode, target_position),
            );
            return None;
        };
        let target_sample = target_container
            .sample
            .get_or_insert_with(|| Sample::new(0.0));
        if let Err(error) = target_sample.add_from(&source_snapshot, volume) {
            issues.error(IssueKind::InvariantPreservation, error.to_string());
            return None;
        }
        Some(())
    }

    /// Re-derives the design set of every new pool sample and registers it as
    /// a stock sample. The verifier checked the sources before the transfers;
    /// this guards the state in between.
    fn convert_new_stock_samples(
        &self,
        target_layout: &StockRackLayout,
        target_rack: &mut Rack,
        source_racks: &BTreeMap<RackBarcode, Rack>,
        source_stock_racks: &[StockRack],
        issues: &mut IssueLog,
    ) -> Option<()> {
        for planned in target_layout.positions() {
            let position = planned.position;
            let Some(sample) = target_rack
                .container_mut(position)
                .and_then(|container| container.sample.as_mut())
            else {
                issues.error(
                    IssueKind::InvariantPreservation,
                    format!("No sample was created at position '{}'", position),
                );
                return None;
            };

            if sample.design_ids() != planned.pool.designs {
                issues.error(
                    IssueKind::InvariantPreservation,
                    format!(
                        "The molecule designs created at '{}' do not match pool {}",
                        position, planned.pool.id
                    ),
                );
                return None;
            }

            let mut concentration: Option<f64> = None;
            for molecule in sample.molecules() {
                match concentration {
                    None => concentration = Some(molecule.concentration),
                    Some(existing) if number::is_equal(existing, molecule.concentration) => {}
                    Some(_) => {
                        issues.error(
                            IssueKind::InvariantPreservation,
                            format!(
                                "The designs of pool {} at '{}' ended up at different concentrations",
                                planned.pool.id, position
                            ),
                        );
                        return None;
                    }
                }
            }

            let suppliers = self.suppliers_for_position(position, source_racks, source_stock_racks);
            if suppliers.len() > 1 {
                issues.error(
                    IssueKind::InvariantPreservation,
                    format!(
                        "Pool {} at '{}' was combined from multiple suppliers: {}",
                        planned.pool.id,
                        position,
                        suppliers.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                );
                return None;
            }
            let supplier = suppliers.into_iter().next().unwrap_or_else(|| "unknown".to_string());

            let stock_info = StockInfo {
                pool: planned.pool.id,
                supplier,
                molecule_type: planned.pool.molecule_type,
                concentration: concentration.unwrap_or(0.0),
            };
            if let Err(error) = sample.convert_to_stock(stock_info) {
                issues.error(IssueKind::InvariantPreservation, error.to_string());
                return None;
            }
        }
        Some(())
    }

    /// The suppliers of the source stock samples feeding one target position.
    fn suppliers_for_position(
        &self,
        position: lab::geometry::RackPosition,
        source_racks: &BTreeMap<RackBarcode, Rack>,
        source_stock_racks: &[StockRack],
    ) -> BTreeSet<String> {
        let mut suppliers = BTreeSet::new();
        for stock_rack in source_stock_racks {
            let Some(rack) = source_racks.get(&stock_rack.rack_barcode) else {
                continue;
            };
            if let Some(info) = rack
                .sample(position)
                .and_then(|sample| sample.stock_info())
            {
                suppliers.insert(info.supplier.clone());
            }
        }
        suppliers
    }
}
