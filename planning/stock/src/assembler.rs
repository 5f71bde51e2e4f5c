use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use chrono::NaiveDateTime;
use itertools::Itertools;
use lab::barcode::{RackBarcode, RackMarker, RackRole, TubeBarcode};
use lab::geometry::{RackPosition, RackShape};
use lab::pool::{PoolId, PoolRegistry};
use lab::rack::Rack;
use lab::units::MINIMUM_STOCK_TRANSFER_VOLUME;
use layout::pool_layout::{PoolLayout, PoolLayoutConverter};
use layout::position::{PoolContent, PositionKind};
use layout::stock_layout::{StockRackLayout, StockRackPosition};
use layout::transfer_target::TransferTarget;
use layout::working::WorkingPosition;
use stores::archive::{bundle_archive, ArchiveMemberNames};
use stores::instructions::{write_instructions, OperatorInstructions};
use stores::summary::{write_summary, DestinationRackSummary, SourceRackSummary, XL20Summary};
use stores::xl20::{write_dummy_output, write_worklist, XL20WorklistItem};
use transfer::iso::{Iso, IsoJob, StockRack};
use transfer::pipetting::{BIOMEK, CYBIO};
use transfer::planned::{
    PlannedRackSampleTransfer, PlannedSampleTransfer, PlannedTransfer, PlannedWorklist, TransferType, WorklistSeries,
};
use transfer::sector::{sector_index, RackSectorTranslator, TranslationBehaviour};
use tracing::info;
use util::issue::{IssueKind, IssueLog};
use util::number;

use crate::container::StockTubeContainer;
use crate::optimizer::optimize_stock_rack_layout;
use crate::picker::TubePicker;
use crate::source::StockSource;

/// Which robot performs the stock transfers; decides how tubes are grouped
/// into stock racks and where they sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipettingStrategy {
    /// One stock rack, column-optimised tube placement.
    Biomek,
    /// One stock rack per target sector group, sector-translated placement.
    CyBio,
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub entity_label: String,
    pub destination_racks: Vec<RackBarcode>,
    pub excluded_racks: Vec<RackBarcode>,
    pub requested_tubes: Vec<TubeBarcode>,
    pub include_dummy_output: bool,
    pub strategy: PipettingStrategy,
}

/// Everything the assembly step produces: entities for the database, the
/// robot worklist, and the operator bundle.
#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub stock_racks: Vec<StockRack>,
    pub worklist_items: Vec<XL20WorklistItem>,
    pub summary: XL20Summary,
    /// Zip bundle with worklist, summary, instructions and optionally the
    /// dummy robot output.
    pub archive: Vec<u8>,
    /// Floating pools dropped because no stock tube could serve them; they
    /// go back into the pool queue.
    pub dropped_pools: Vec<PoolId>,
}

pub struct StockRackAssembler<'a> {
    source: &'a dyn StockSource,
    pools: &'a PoolRegistry,
    racks: &'a BTreeMap<RackBarcode, Rack>,
}

impl<'a> StockRackAssembler<'a> {
    pub fn new(
        source: &'a dyn StockSource,
        pools: &'a PoolRegistry,
        racks: &'a BTreeMap<RackBarcode, Rack>,
    ) -> Self {
        Self {
            source,
            pools,
            racks,
        }
    }

    pub fn assemble(
        &self,
        iso: &Iso,
        request: &AssemblyRequest,
        timestamp: NaiveDateTime,
        issues: &mut IssueLog,
    ) -> Option<AssemblyOutcome> {
        self.assemble_entity(&iso.rack_layout, &iso.label, &iso.pool_set, request, timestamp, issues)
    }

    /// Job-level assembly works on the job's preparation layout; it serves
    /// the fixed control positions shared by the job's ISOs.
    pub fn assemble_job(
        &self,
        job: &IsoJob,
        request: &AssemblyRequest,
        timestamp: NaiveDateTime,
        issues: &mut IssueLog,
    ) -> Option<AssemblyOutcome> {
        let Some(preparation_layout) = job.preparation_layout.as_ref() else {
            issues.error(
                IssueKind::InputValidity,
                format!("ISO job '{}' has no preparation layout", job.label),
            );
            return None;
        };
        self.assemble_entity(preparation_layout, &job.label, &BTreeSet::new(), request, timestamp, issues)
    }

    fn assemble_entity(
        &self,
        rack_layout: &lab::rack_layout::RackLayout,
        entity_label: &str,
        pool_set: &BTreeSet<PoolId>,
        request: &AssemblyRequest,
        timestamp: NaiveDateTime,
        issues: &mut IssueLog,
    ) -> Option<AssemblyOutcome> {
        let layout = PoolLayoutConverter::for_iso(self.pools).convert(rack_layout, issues)?;

        let mut containers = self.build_containers(entity_label, pool_set, &layout, issues)?;
        self.verify_destination_racks(&request.destination_racks, issues);
        if issues.has_errors() {
            return None;
        }

        let picker = TubePicker::new(self.source)
            .excluding_racks(request.excluded_racks.iter().cloned())
            .requesting_tubes(request.requested_tubes.iter().cloned());
        let missing_pools = picker.pick(&mut containers);
        let dropped_pools = self.handle_missing_pools(&mut containers, missing_pools, issues);
        if issues.has_errors() {
            return None;
        }
        if containers.is_empty() {
            issues.error(
                IssueKind::StockAvailability,
                "No stock tubes remain after picking; there is nothing to assemble",
            );
            return None;
        }

        let rack_groups = match request.strategy {
            PipettingStrategy::Biomek => self.group_for_biomek(&containers, issues),
            PipettingStrategy::CyBio => self.group_for_cybio(&containers, &layout, issues),
        }?;
        if rack_groups.len() > request.destination_racks.len() {
            issues.error(
                IssueKind::InputValidity,
                format!(
                    "{} stock racks are required but only {} destination racks were provided",
                    rack_groups.len(),
                    request.destination_racks.len()
                ),
            );
            return None;
        }

        let outcome = self.build_outcome(request, &containers, rack_groups, timestamp, issues)?;
        info!(
            "Assembled stock racks. entity: '{}', racks: {}, tubes: {}",
            request.entity_label,
            outcome.stock_racks.len(),
            outcome.worklist_items.len()
        );
        Some(AssemblyOutcome {
            dropped_pools,
            ..outcome
        })
    }

    /// One container per pool, targets annotated with the volume to draw at
    /// stock concentration.
    fn build_containers(
        &self,
        entity_label: &str,
        pool_set: &BTreeSet<PoolId>,
        layout: &PoolLayout,
        issues: &mut IssueLog,
    ) -> Option<BTreeMap<PoolId, StockTubeContainer>> {
        let floating_pools = self.assign_floating_pools(pool_set, layout, issues)?;

        let mut containers: BTreeMap<PoolId, StockTubeContainer> = BTreeMap::new();
        for position in layout.positions() {
            let pool = match (&position.kind, &position.pool) {
                (PositionKind::Fixed, PoolContent::Pool(pool)) => pool.clone(),
                (PositionKind::Floating, PoolContent::Placeholder(placeholder)) => {
                    floating_pools.get(placeholder.as_str()).cloned()?
                }
                _ => continue,
            };

            let (Some(volume), Some(concentration)) = (position.volume, position.concentration) else {
                issues.error(
                    IssueKind::LayoutInvariant,
                    format!(
                        "Position '{}' carries pool {} but no volume and concentration",
                        position.rack_position(),
                        pool.id
                    ),
                );
                continue;
            };

            let stock_concentration = pool.default_stock_concentration;
            let stock_volume = volume * concentration / stock_concentration;
            if number::is_smaller(stock_volume, MINIMUM_STOCK_TRANSFER_VOLUME) {
                issues.error(
                    IssueKind::LayoutInvariant,
                    format!(
                        "The stock transfer volume for position '{}' (pool {}) is below the minimum of {} ul",
                        position.rack_position(),
                        pool.id,
                        MINIMUM_STOCK_TRANSFER_VOLUME
                    ),
                );
                continue;
            }

            let container = containers.entry(pool.id).or_insert_with(|| {
                StockTubeContainer::new(pool.clone(), position.kind, stock_concentration)
            });
            container.add_target(
                entity_label.to_string(),
                TransferTarget::new(position.rack_position(), stock_volume),
            );
        }

        if issues.has_errors() {
            return None;
        }
        Some(containers)
    }

    /// Maps floating placeholders to pools from the entity's pool queue, in
    /// placeholder order.
    fn assign_floating_pools(
        &self,
        pool_set: &BTreeSet<PoolId>,
        layout: &PoolLayout,
        issues: &mut IssueLog,
    ) -> Option<BTreeMap<String, std::sync::Arc<lab::pool::MoleculeDesignPool>>> {
        let placeholders: BTreeSet<String> = layout
            .positions()
            .filter(|position| position.kind == PositionKind::Floating)
            .filter_map(|position| position.pool.placeholder().map(str::to_string))
            .collect();
        if placeholders.is_empty() {
            return Some(BTreeMap::new());
        }

        let fixed_pools: BTreeSet<PoolId> = layout
            .positions()
            .filter_map(|position| position.pool.pool_id())
            .collect();
        let mut queue = pool_set
            .iter()
            .filter(|pool_id| !fixed_pools.contains(pool_id))
            .copied();

        let mut assignment = BTreeMap::new();
        for placeholder in placeholders {
            let Some(pool_id) = queue.next() else {
                issues.error(
                    IssueKind::InputValidity,
                    format!(
                        "The ISO pool set has no pool left for floating placeholder '{}'",
                        placeholder
                    ),
                );
                return None;
            };
            let pool = match self.pools.get(pool_id) {
                Ok(pool) => pool,
                Err(error) => {
                    issues.error(IssueKind::InputValidity, error.to_string());
                    return None;
                }
            };
            assignment.insert(placeholder, pool);
        }
        Some(assignment)
    }

    fn verify_destination_racks(&self, destination_racks: &[RackBarcode], issues: &mut IssueLog) {
        for barcode in destination_racks {
            match self.racks.get(barcode) {
                None => issues.error(
                    IssueKind::StockAvailability,
                    format!("Destination rack '{}' could not be found", barcode),
                ),
                Some(rack) if !rack.is_empty() => issues.error(
                    IssueKind::StockAvailability,
                    format!("Destination rack '{}' is not empty", barcode),
                ),
                Some(_) => {}
            }
        }
    }

    /// Fixed pools without tubes are fatal as one grouped message; floating
    /// pools are dropped with a warning and their containers removed.
    fn handle_missing_pools(
        &self,
        containers: &mut BTreeMap<PoolId, StockTubeContainer>,
        missing_pools: Vec<PoolId>,
        issues: &mut IssueLog,
    ) -> Vec<PoolId> {
        let (missing_fixed, missing_floating): (Vec<PoolId>, Vec<PoolId>) = missing_pools
            .into_iter()
            .partition(|pool_id| containers[pool_id].kind == PositionKind::Fixed);

        if !missing_fixed.is_empty() {
            issues.error(
                IssueKind::StockAvailability,
                format!(
                    "For some control molecule design pools there are no valid stock tubes available: {}",
                    missing_fixed.iter().join(", ")
                ),
            );
        }
        for pool_id in missing_floating.iter() {
            issues.warning(
                IssueKind::StockAvailability,
                format!(
                    "No stock tube is available for floating pool {}; the pool is returned to the queue",
                    pool_id
                ),
            );
            containers.remove(pool_id);
        }
        missing_floating
    }

    fn group_for_biomek(
        &self,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        issues: &mut IssueLog,
    ) -> Option<Vec<RackGroup>> {
        let by_pool: BTreeMap<PoolId, &StockTubeContainer> = containers
            .iter()
            .map(|(pool_id, container)| (*pool_id, container))
            .collect();
        let placements = match optimize_stock_rack_layout(&by_pool) {
            Ok(placements) => placements,
            Err(error) => {
                issues.error(IssueKind::Geometry, error.to_string());
                return None;
            }
        };
        Some(vec![RackGroup {
            sectors: BTreeSet::new(),
            number_sectors: 1,
            placements,
        }])
    }

    /// CyBio transfers move whole sectors; every tube of one stock rack must
    /// serve the same sector set and every target of a tube must condense to
    /// the same stock position.
    fn group_for_cybio(
        &self,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        layout: &PoolLayout,
        issues: &mut IssueLog,
    ) -> Option<Vec<RackGroup>> {
        let number_sectors = if layout.shape() == RackShape::SHAPE_384 { 4 } else { 1 };

        let mut groups: BTreeMap<BTreeSet<usize>, BTreeMap<PoolId, RackPosition>> = BTreeMap::new();
        for (pool_id, container) in containers.iter() {
            let mut sectors: BTreeSet<usize> = BTreeSet::new();
            let mut stock_position: Option<RackPosition> = None;
            for target in container.all_targets() {
                let sector = match sector_index(target.position, number_sectors) {
                    Ok(sector) => sector,
                    Err(error) => {
                        issues.error(IssueKind::Geometry, error.to_string());
                        return None;
                    }
                };
                sectors.insert(sector);
                let translator =
                    match RackSectorTranslator::new(number_sectors, sector, 0, TranslationBehaviour::ManyToOne) {
                        Ok(translator) => translator,
                        Err(error) => {
                            issues.error(IssueKind::Geometry, error.to_string());
                            return None;
                        }
                    };
                let translated = match translator.translate(target.position) {
                    Ok(position) => position,
                    Err(error) => {
                        issues.error(IssueKind::Geometry, error.to_string());
                        return None;
                    }
                };
                match stock_position {
                    None => stock_position = Some(translated),
                    Some(existing) if existing == translated => {}
                    Some(existing) => {
                        issues.error(
                            IssueKind::Geometry,
                            format!(
                                "The targets of pool {} condense to different stock positions ('{}' and '{}'); \
                                 a CyBio transfer cannot serve them from one tube",
                                pool_id, existing, translated
                            ),
                        );
                        return None;
                    }
                }
            }
            let Some(stock_position) = stock_position else {
                continue;
            };
            groups
                .entry(sectors)
                .or_default()
                .insert(*pool_id, stock_position);
        }

        Some(
            groups
                .into_iter()
                .map(|(sectors, placements)| RackGroup {
                    sectors,
                    number_sectors,
                    placements,
                })
                .collect(),
        )
    }

    fn build_outcome(
        &self,
        request: &AssemblyRequest,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        rack_groups: Vec<RackGroup>,
        timestamp: NaiveDateTime,
        issues: &mut IssueLog,
    ) -> Option<AssemblyOutcome> {
        let mut stock_racks = vec![];
        let mut worklist_items = vec![];
        let mut destination_summaries = vec![];

        for (group_index, group) in rack_groups.iter().enumerate() {
            let destination_rack = request.destination_racks[group_index].clone();
            let marker = RackMarker::new(RackRole::Stock, group_index + 1);

            let mut rack_layout = StockRackLayout::new(RackShape::SHAPE_96);
            for (pool_id, stock_position) in group.placements.iter() {
                let container = &containers[pool_id];
                let tube = container
                    .tube
                    .as_ref()
                    .expect("picking succeeded for every remaining container");

                let targets: Vec<TransferTarget> = container.all_targets().cloned().collect();
                if let Err(error) = rack_layout.add_position(
                    StockRackPosition::new(*stock_position, container.pool.clone(), tube.tube_barcode.clone())
                        .with_targets(targets),
                ) {
                    issues.error(IssueKind::Geometry, error.to_string());
                    return None;
                }

                worklist_items.push(XL20WorklistItem {
                    source_rack: tube.rack_barcode.clone(),
                    source_position: tube.position,
                    tube_barcode: tube.tube_barcode.clone(),
                    destination_rack: destination_rack.clone(),
                    destination_position: *stock_position,
                });
            }

            let worklist_series =
                self.build_stock_transfer_series(request, group, containers, group_index, issues)?;

            destination_summaries.push(DestinationRackSummary {
                barcode: destination_rack.clone(),
                tube_count: group.placements.len(),
                sector: group.sectors.iter().next().copied().filter(|_| group.sectors.len() == 1),
            });
            stock_racks.push(StockRack {
                marker,
                rack_barcode: destination_rack,
                rack_layout: {
                    let mut layout = rack_layout;
                    layout.create_rack_layout()
                },
                worklist_series,
            });
        }

        let summary = self.build_summary(request, containers, destination_summaries);
        let archive = self.build_archive(request, &worklist_items, &summary, timestamp, issues)?;

        Some(AssemblyOutcome {
            stock_racks,
            worklist_items,
            summary,
            archive,
            dropped_pools: vec![],
        })
    }

    fn build_stock_transfer_series(
        &self,
        request: &AssemblyRequest,
        group: &RackGroup,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        group_index: usize,
        issues: &mut IssueLog,
    ) -> Option<WorklistSeries> {
        let mut series = WorklistSeries::new();
        let label = format!("{}_stock_transfer_s{}", request.entity_label, group_index + 1);

        match request.strategy {
            PipettingStrategy::Biomek => {
                let mut worklist = PlannedWorklist::new(0, label, BIOMEK, TransferType::SampleTransfer);
                for (pool_id, stock_position) in group.placements.iter() {
                    for target in containers[pool_id].all_targets() {
                        let transfer =
                            match PlannedSampleTransfer::new(target.volume, *stock_position, target.position) {
                                Ok(transfer) => transfer,
                                Err(error) => {
                                    issues.error(IssueKind::InputValidity, error.to_string());
                                    return None;
                                }
                            };
                        worklist
                            .add_transfer(PlannedTransfer::Sample(transfer))
                            .expect("worklist holds sample transfers only");
                    }
                }
                series
                    .add_worklist(worklist)
                    .expect("fresh series has no index 0");
            }
            PipettingStrategy::CyBio => {
                let mut worklist = PlannedWorklist::new(0, label, CYBIO, TransferType::RackSampleTransfer);
                for sector in group.sectors.iter() {
                    let volume = self.uniform_sector_volume(group, containers, *sector, issues)?;
                    let transfer = match PlannedRackSampleTransfer::new(volume, group.number_sectors, 0, *sector) {
                        Ok(transfer) => transfer,
                        Err(error) => {
                            issues.error(IssueKind::InputValidity, error.to_string());
                            return None;
                        }
                    };
                    worklist
                        .add_transfer(PlannedTransfer::Rack(transfer))
                        .expect("worklist holds rack transfers only");
                }
                series
                    .add_worklist(worklist)
                    .expect("fresh series has no index 0");
            }
        }
        Some(series)
    }

    /// One CyBio step moves one volume for a whole sector; mixed volumes
    /// within a sector cannot be served.
    fn uniform_sector_volume(
        &self,
        group: &RackGroup,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        sector: usize,
        issues: &mut IssueLog,
    ) -> Option<f64> {
        let mut volume: Option<f64> = None;
        for pool_id in group.placements.keys() {
            for target in containers[pool_id].all_targets() {
                if sector_index(target.position, group.number_sectors).ok()? != sector {
                    continue;
                }
                match volume {
                    None => volume = Some(target.volume),
                    Some(existing) if number::is_equal(existing, target.volume) => {}
                    Some(existing) => {
                        issues.error(
                            IssueKind::Geometry,
                            format!(
                                "Sector {} mixes transfer volumes ({} and {} ul); \
                                 one CyBio step moves a single volume",
                                sector,
                                util::number::format_quantity(existing),
                                util::number::format_quantity(target.volume)
                            ),
                        );
                        return None;
                    }
                }
            }
        }
        volume
    }

    fn build_summary(
        &self,
        request: &AssemblyRequest,
        containers: &BTreeMap<PoolId, StockTubeContainer>,
        destination_racks: Vec<DestinationRackSummary>,
    ) -> XL20Summary {
        let mut volume_counts: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for container in containers.values() {
            let volume = container.total_transfer_volume();
            let entry = volume_counts
                .entry(util::number::format_quantity(volume))
                .or_insert((volume, 0));
            entry.1 += 1;
        }

        let source_racks: Vec<SourceRackSummary> = containers
            .values()
            .filter_map(|container| container.tube.as_ref())
            .map(|tube| (tube.rack_barcode.clone(), tube.location.clone()))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .map(|(barcode, location)| SourceRackSummary {
                barcode,
                location,
            })
            .collect();

        XL20Summary {
            entity_label: request.entity_label.clone(),
            total_tubes: containers.len(),
            volume_breakdown: volume_counts.into_values().collect(),
            destination_racks,
            excluded_racks: request.excluded_racks.clone(),
            requested_tubes: request.requested_tubes.clone(),
            source_racks,
        }
    }

    fn build_archive(
        &self,
        request: &AssemblyRequest,
        worklist_items: &[XL20WorklistItem],
        summary: &XL20Summary,
        timestamp: NaiveDateTime,
        issues: &mut IssueLog,
    ) -> Option<Vec<u8>> {
        let names = ArchiveMemberNames::for_entity(&request.entity_label);

        let mut worklist_bytes = vec![];
        if let Err(error) = write_worklist(&mut worklist_bytes, worklist_items) {
            issues.error(IssueKind::InputValidity, error.to_string());
            return None;
        }

        let mut summary_bytes = vec![];
        if let Err(error) = write_summary(&mut summary_bytes, summary) {
            issues.error(IssueKind::InputValidity, error.to_string());
            return None;
        }

        let instructions = OperatorInstructions {
            entity_label: request.entity_label.clone(),
            worklist_file: names.worklist.clone(),
            destination_racks: request.destination_racks.clone(),
            source_racks: summary
                .source_racks
                .iter()
                .map(|source| source.barcode.clone())
                .collect(),
        };
        let mut instructions_bytes = vec![];
        if let Err(error) = write_instructions(&mut instructions_bytes, &instructions) {
            issues.error(IssueKind::InputValidity, error.to_string());
            return None;
        }

        let mut members = vec![
            (names.worklist, worklist_bytes),
            (names.summary, summary_bytes),
            (names.instructions, instructions_bytes),
        ];
        if request.include_dummy_output {
            let mut dummy_bytes = vec![];
            if let Err(error) = write_dummy_output(&mut dummy_bytes, worklist_items, timestamp) {
                issues.error(IssueKind::InputValidity, error.to_string());
                return None;
            }
            members.push((names.dummy_output, dummy_bytes));
        }

        let mut buffer = Cursor::new(vec![]);
        if let Err(error) = bundle_archive(&mut buffer, &members) {
            issues.error(IssueKind::InputValidity, error.to_string());
            return None;
        }
        Some(buffer.into_inner())
    }
}

/// The tubes destined for one physical stock rack and where they sit.
#[derive(Debug, Clone)]
struct RackGroup {
    /// Target sectors served by this rack; empty for Biomek racks.
    sectors: BTreeSet<usize>,
    /// Sector count of the target shape the sectors refer to.
    number_sectors: usize,
    placements: BTreeMap<PoolId, RackPosition>,
}
