use std::io::{Read, Write};

use chrono::NaiveDateTime;
use lab::barcode::{RackBarcode, TubeBarcode};
use lab::geometry::RackPosition;
use thiserror::Error;
use tracing::debug;
use util::issue::{IssueKind, IssueLog};

/// One tube move for the XL20 tube handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XL20WorklistItem {
    pub source_rack: RackBarcode,
    pub source_position: RackPosition,
    pub tube_barcode: TubeBarcode,
    pub destination_rack: RackBarcode,
    pub destination_position: RackPosition,
}

/// CSV record with the exact column names the robot software expects.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct XL20WorklistRecord {
    #[serde(rename = "Source Rack")]
    source_rack: String,
    #[serde(rename = "Source Position")]
    source_position: String,
    #[serde(rename = "Tube Barcode")]
    tube_barcode: String,
    #[serde(rename = "Destination Rack")]
    destination_rack: String,
    #[serde(rename = "Destination Position")]
    destination_position: String,
}

#[derive(Error, Debug)]
pub enum XL20WorklistError {
    #[error("Error writing XL20 worklist: {0}")]
    Write(#[from] csv::Error),

    #[error("Error writing XL20 dummy output: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the tube-move worklist, rows ordered by destination rack and then
/// destination position row-major.
pub fn write_worklist<W: Write>(writer: W, items: &[XL20WorklistItem]) -> Result<(), XL20WorklistError> {
    let mut sorted: Vec<&XL20WorklistItem> = items.iter().collect();
    sorted.sort_by_key(|item| {
        (
            item.destination_rack.clone(),
            item.destination_position.row(),
            item.destination_position.column(),
        )
    });

    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    for item in sorted {
        csv_writer.serialize(XL20WorklistRecord {
            source_rack: item.source_rack.to_string(),
            source_position: item.source_position.to_string(),
            tube_barcode: item.tube_barcode.to_string(),
            destination_rack: item.destination_rack.to_string(),
            destination_position: item.destination_position.to_string(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Replays a worklist as if the robot had executed it, for test runs without
/// hardware. The file mirrors the robot's actual output format.
pub fn write_dummy_output<W: Write>(
    mut writer: W,
    items: &[XL20WorklistItem],
    timestamp: NaiveDateTime,
) -> Result<(), XL20WorklistError> {
    let mut sorted: Vec<&XL20WorklistItem> = items.iter().collect();
    sorted.sort_by_key(|item| {
        (
            item.destination_rack.clone(),
            item.destination_position.row(),
            item.destination_position.column(),
        )
    });

    for item in sorted {
        writeln!(
            writer,
            "\"{}\",\"{}\",{},{},{},{},{},{},",
            timestamp.format("%m/%d/%y"),
            timestamp.format("%H:%M:%S"),
            item.source_rack,
            item.source_position,
            item.destination_rack,
            item.destination_position,
            item.tube_barcode,
            item.tube_barcode,
        )?;
    }
    Ok(())
}

/// One tube move as reported by the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct XL20OutputRecord {
    pub timestamp: NaiveDateTime,
    pub source_rack: RackBarcode,
    pub source_position: RackPosition,
    pub destination_rack: RackBarcode,
    pub destination_position: RackPosition,
    pub expected_tube: TubeBarcode,
    pub found_tube: TubeBarcode,
}

/// Parses the robot's actual output.
///
/// A found barcode differing from the expected one, or a non-empty error
/// column, is recorded as a warning; malformed positions or barcodes are
/// fatal.
pub fn parse_output<R: Read>(reader: R, issues: &mut IssueLog) -> Option<Vec<XL20OutputRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = vec![];
    for (line_number, result) in csv_reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(error) => {
                issues.error(
                    IssueKind::InputValidity,
                    format!("Unreadable XL20 output row {}: {}", line_number + 1, error),
                );
                return None;
            }
        };
        if row.len() < 8 {
            issues.error(
                IssueKind::InputValidity,
                format!(
                    "XL20 output row {} has {} columns, expected at least 8",
                    line_number + 1,
                    row.len()
                ),
            );
            return None;
        }

        let timestamp_value = format!("{} {}", &row[0], &row[1]);
        let timestamp = match NaiveDateTime::parse_from_str(&timestamp_value, "%m/%d/%y %H:%M:%S") {
            Ok(timestamp) => timestamp,
            Err(_) => {
                issues.error(
                    IssueKind::InputValidity,
                    format!("Invalid timestamp '{}' in XL20 output row {}", timestamp_value, line_number + 1),
                );
                return None;
            }
        };

        let record = match parse_output_row(&row, timestamp) {
            Ok(record) => record,
            Err(message) => {
                issues.error(
                    IssueKind::InputValidity,
                    format!("XL20 output row {}: {}", line_number + 1, message),
                );
                return None;
            }
        };

        if record.expected_tube != record.found_tube {
            issues.warning(
                IssueKind::Verification,
                format!(
                    "Tube at {} {} differs from the plan: expected '{}', found '{}'",
                    record.source_rack, record.source_position, record.expected_tube, record.found_tube
                ),
            );
        }
        if let Some(error_message) = row.get(8).filter(|value| !value.trim().is_empty()) {
            issues.warning(
                IssueKind::Verification,
                format!(
                    "XL20 reported an error for tube '{}': {}",
                    record.expected_tube,
                    error_message.trim()
                ),
            );
        }

        debug!("Parsed XL20 output record: {:?}", record);
        records.push(record);
    }

    Some(records)
}

fn parse_output_row(row: &csv::StringRecord, timestamp: NaiveDateTime) -> Result<XL20OutputRecord, String> {
    let source_rack: RackBarcode = row[2]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;
    let source_position: RackPosition = row[3]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;
    let destination_rack: RackBarcode = row[4]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;
    let destination_position: RackPosition = row[5]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;
    let expected_tube: TubeBarcode = row[6]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;
    let found_tube: TubeBarcode = row[7]
        .trim()
        .parse()
        .map_err(|error| format!("{}", error))?;

    Ok(XL20OutputRecord {
        timestamp,
        source_rack,
        source_position,
        destination_rack,
        destination_position,
        expected_tube,
        found_tube,
    })
}
