use std::io::Write;

use lab::barcode::{RackBarcode, TubeBarcode};
use lab::geometry::RackPosition;
use lab::pool::DesignId;
use util::number::format_quantity;

/// One row of the per-rack tube-transfer report written for pool creation
/// runs: where each single-design tube goes and how much is drawn from it.
#[derive(Debug, Clone, PartialEq)]
pub struct TubeTransferRow {
    pub tube_barcode: TubeBarcode,
    pub molecule_design: DesignId,
    /// Volume in ul.
    pub volume: f64,
    pub target_rack: RackBarcode,
    pub target_position: RackPosition,
}

pub fn write_tube_transfers<W: Write>(
    mut writer: W,
    source_rack: &RackBarcode,
    rows: &[TubeTransferRow],
) -> std::io::Result<()> {
    writeln!(writer, "TUBE TRANSFERS FROM RACK {}", source_rack)?;
    writeln!(writer)?;
    for row in rows.iter() {
        writeln!(
            writer,
            "tube {} (molecule design {}): {} ul to {} {}",
            row.tube_barcode,
            row.molecule_design,
            format_quantity(row.volume),
            row.target_rack,
            row.target_position,
        )?;
    }
    Ok(())
}
