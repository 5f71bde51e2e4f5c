use std::io::Write;

use lab::barcode::{RackBarcode, TubeBarcode};
use util::number::format_quantity;

/// Everything the human-readable XL20 summary reports.
#[derive(Debug, Clone, Default)]
pub struct XL20Summary {
    pub entity_label: String,
    pub total_tubes: usize,
    /// (volume in ul, number of tubes picked for that volume).
    pub volume_breakdown: Vec<(f64, usize)>,
    pub destination_racks: Vec<DestinationRackSummary>,
    pub excluded_racks: Vec<RackBarcode>,
    pub requested_tubes: Vec<TubeBarcode>,
    pub source_racks: Vec<SourceRackSummary>,
}

#[derive(Debug, Clone)]
pub struct DestinationRackSummary {
    pub barcode: RackBarcode,
    pub tube_count: usize,
    /// Set when the rack serves one sector of a CyBio transfer.
    pub sector: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SourceRackSummary {
    pub barcode: RackBarcode,
    pub location: Option<String>,
}

pub fn write_summary<W: Write>(mut writer: W, summary: &XL20Summary) -> std::io::Result<()> {
    writeln!(writer, "XL20 WORKLIST GENERATION REPORT")?;
    writeln!(writer, "Entity: {}", summary.entity_label)?;
    writeln!(writer)?;
    writeln!(writer, "Total number of tubes: {}", summary.total_tubes)?;
    for (volume, count) in summary.volume_breakdown.iter() {
        writeln!(writer, "{} tubes with {} ul", count, format_quantity(*volume))?;
    }
    writeln!(writer)?;

    writeln!(writer, "Destination racks:")?;
    for destination in summary.destination_racks.iter() {
        match destination.sector {
            Some(sector) => writeln!(
                writer,
                "{} ({} tubes, sector {})",
                destination.barcode, destination.tube_count, sector
            )?,
            None => writeln!(writer, "{} ({} tubes)", destination.barcode, destination.tube_count)?,
        }
    }
    writeln!(writer)?;

    writeln!(writer, "Excluded racks:")?;
    if summary.excluded_racks.is_empty() {
        writeln!(writer, "no excluded racks")?;
    } else {
        for barcode in summary.excluded_racks.iter() {
            writeln!(writer, "{}", barcode)?;
        }
    }
    writeln!(writer)?;

    writeln!(writer, "Requested tubes:")?;
    if summary.requested_tubes.is_empty() {
        writeln!(writer, "no requested tubes")?;
    } else {
        for barcode in summary.requested_tubes.iter() {
            writeln!(writer, "{}", barcode)?;
        }
    }
    writeln!(writer)?;

    writeln!(writer, "Source racks:")?;
    for source in summary.source_racks.iter() {
        match &source.location {
            Some(location) => writeln!(writer, "{} ({})", source.barcode, location)?,
            None => writeln!(writer, "{} (unknown location)", source.barcode)?,
        }
    }

    Ok(())
}
