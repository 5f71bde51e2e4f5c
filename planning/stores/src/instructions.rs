use std::io::Write;

use lab::barcode::RackBarcode;

/// What the operator needs to know to run the prepared worklist.
#[derive(Debug, Clone, Default)]
pub struct OperatorInstructions {
    pub entity_label: String,
    pub worklist_file: String,
    pub destination_racks: Vec<RackBarcode>,
    pub source_racks: Vec<RackBarcode>,
}

pub fn write_instructions<W: Write>(mut writer: W, instructions: &OperatorInstructions) -> std::io::Result<()> {
    writeln!(writer, "PROCESSING INSTRUCTIONS FOR {}", instructions.entity_label)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "1. Fetch the source racks listed below from the stock storage and"
    )?;
    writeln!(writer, "   place them onto the XL20 deck:")?;
    for barcode in instructions.source_racks.iter() {
        writeln!(writer, "   - {}", barcode)?;
    }
    writeln!(writer)?;
    writeln!(writer, "2. Place the empty destination racks onto the XL20 deck:")?;
    for barcode in instructions.destination_racks.iter() {
        writeln!(writer, "   - {}", barcode)?;
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "3. Load the worklist file '{}' into the XL20 software and start",
        instructions.worklist_file
    )?;
    writeln!(writer, "   the run.")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "4. When the run has finished, archive the robot output file together"
    )?;
    writeln!(writer, "   with this instruction sheet.")?;
    Ok(())
}

#[cfg(test)]
mod instructions_tests {
    use super::*;

    #[test]
    fn instructions_reference_the_artefacts() {
        let instructions = OperatorInstructions {
            entity_label: "screen_1_iso_1".to_string(),
            worklist_file: "screen_1_iso_1_xl20_worklist.csv".to_string(),
            destination_racks: vec!["02481543".parse().unwrap()],
            source_racks: vec!["09999991".parse().unwrap(), "09999992".parse().unwrap()],
        };

        let mut buffer = vec![];
        write_instructions(&mut buffer, &instructions).unwrap();
        let written = String::from_utf8(buffer).unwrap();

        assert!(written.contains("screen_1_iso_1_xl20_worklist.csv"));
        assert!(written.contains("- 02481543"));
        assert!(written.contains("- 09999991"));
        assert!(written.contains("- 09999992"));
    }
}
