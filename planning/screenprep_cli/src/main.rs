use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use lab::barcode::RackBarcode;
use lab::geometry::RackShape;
use lab::rack::Rack;
use stock::assembler::{AssemblyRequest, StockRackAssembler};
use stock::source::StockInventory;
use tracing::info;
use transfer::sector::RackSectorTranslator;
use util::issue::{IssueLog, IssueSeverity};

use crate::opts::{Command, Opts};
use crate::request::PickRequest;

mod opts;
mod request;
mod trace;

fn main() -> anyhow::Result<()> {
    let args = argfile::expand_args(argfile::parse_fromfile, argfile::PREFIX)?;

    let opts = Opts::parse_from(args);

    trace::configure_tracing(opts.verbosity)?;

    match opts.command {
        Command::PickTubes {
            inventory,
            request,
            output,
        } => pick_tubes(&inventory, &request, &output),
        Command::Translate {
            sectors,
            source_sector,
            target_sector,
            behaviour,
            position,
        } => translate(sectors, source_sector, target_sector, behaviour, &position),
    }
}

fn pick_tubes(inventory_path: &PathBuf, request_path: &PathBuf, output_path: &PathBuf) -> anyhow::Result<()> {
    let inventory = StockInventory::load(inventory_path)?;
    let request = PickRequest::load(request_path)?;

    let registry = request.build_registry()?;
    let iso = request.build_iso();

    // destination racks are expected fresh from the washer; the operator
    // confirms emptiness when loading the robot deck
    let racks: BTreeMap<RackBarcode, Rack> = request
        .destination_racks
        .iter()
        .map(|barcode| {
            (
                barcode.clone(),
                Rack::tube_rack(barcode.clone(), "destination", RackShape::SHAPE_96),
            )
        })
        .collect();

    let assembly_request = AssemblyRequest {
        entity_label: request.label.clone(),
        destination_racks: request.destination_racks.clone(),
        excluded_racks: request.excluded_racks.clone(),
        requested_tubes: request.requested_tubes.clone(),
        include_dummy_output: request.include_dummy_output,
        strategy: request.strategy.to_strategy(),
    };

    let timestamp = chrono::Local::now().naive_local();
    let mut issues = IssueLog::new();
    let outcome =
        StockRackAssembler::new(&inventory, &registry, &racks).assemble(&iso, &assembly_request, timestamp, &mut issues);

    for issue in issues.issues() {
        match issue.severity {
            IssueSeverity::Warning => eprintln!("warning: {}", issue.message),
            IssueSeverity::Error => eprintln!("error: {}", issue.message),
        }
    }

    let Some(outcome) = outcome else {
        bail!("tube picking failed; see the messages above");
    };

    let bundle_path = output_path.join(format!("{}_worklist_bundle.zip", request.label));
    std::fs::write(&bundle_path, &outcome.archive)
        .with_context(|| format!("Writing worklist bundle. file: {}", bundle_path.display()))?;
    info!("Wrote worklist bundle. file: {}", bundle_path.display());

    println!("{} tube moves planned for '{}'", outcome.worklist_items.len(), request.label);
    for stock_rack in outcome.stock_racks.iter() {
        println!("stock rack {} -> {}", stock_rack.marker, stock_rack.rack_barcode);
    }
    if !outcome.dropped_pools.is_empty() {
        println!(
            "{} floating pools were returned to the queue",
            outcome.dropped_pools.len()
        );
    }
    println!("bundle: {}", bundle_path.display());

    Ok(())
}

fn translate(
    sectors: usize,
    source_sector: usize,
    target_sector: usize,
    behaviour: crate::opts::BehaviourArg,
    position: &str,
) -> anyhow::Result<()> {
    let translator = RackSectorTranslator::new(sectors, source_sector, target_sector, behaviour.to_behaviour())?;
    let position = position.parse::<lab::geometry::RackPosition>()?;
    let translated = translator.translate(position)?;
    println!("{}", translated);
    Ok(())
}
