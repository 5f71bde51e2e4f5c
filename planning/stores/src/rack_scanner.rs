use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use lab::barcode::{RackBarcode, TubeBarcode};
use lab::geometry::{RackPosition, RackShape};
use regex::Regex;
use util::issue::{IssueKind, IssueLog};

/// The contents of one rack-scanner output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RackScanResult {
    pub rack_barcode: RackBarcode,
    pub timestamp: DateTime<FixedOffset>,
    pub tubes: BTreeMap<RackPosition, TubeBarcode>,
}

fn barcode_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d{8})\b").unwrap())
}

fn timestamp_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{4}-\d{2}-\d{2}T[0-9:.+-]+Z?)").unwrap())
}

/// Parses a rack-scanner output file: a preamble naming the rack barcode and
/// scan timestamp, followed by `<position>\t<tube_barcode>` rows.
///
/// Duplicate positions or tube barcodes are fatal, as are labels outside the
/// 96-well shape.
pub fn parse_rack_scan<R: BufRead>(reader: R, issues: &mut IssueLog) -> Option<RackScanResult> {
    let mut rack_barcode: Option<RackBarcode> = None;
    let mut timestamp: Option<DateTime<FixedOffset>> = None;
    let mut tubes: BTreeMap<RackPosition, TubeBarcode> = BTreeMap::new();
    let mut seen_tubes: BTreeSet<TubeBarcode> = BTreeSet::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                issues.error(
                    IssueKind::InputValidity,
                    format!("Unreadable rack scanner file at line {}: {}", line_number + 1, error),
                );
                return None;
            }
        };
        let trimmed = line.trim_end_matches(['\r', '\n']).trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((label, barcode_value)) = trimmed.split_once('\t') {
            parse_tube_row(
                label,
                barcode_value,
                line_number + 1,
                &mut tubes,
                &mut seen_tubes,
                issues,
            );
            continue;
        }

        // preamble line
        if rack_barcode.is_none() {
            if let Some(captures) = barcode_line_pattern().captures(trimmed) {
                rack_barcode = captures[1].parse().ok();
                continue;
            }
        }
        if timestamp.is_none() {
            if let Some(captures) = timestamp_line_pattern().captures(trimmed) {
                timestamp = DateTime::parse_from_rfc3339(&captures[1]).ok();
            }
        }
    }

    let Some(rack_barcode) = rack_barcode else {
        issues.error(
            IssueKind::InputValidity,
            "The rack scanner file names no rack barcode (8 digits expected)",
        );
        return None;
    };
    let Some(timestamp) = timestamp else {
        issues.error(
            IssueKind::InputValidity,
            "The rack scanner file names no ISO-8601 scan timestamp",
        );
        return None;
    };
    if issues.has_errors() {
        return None;
    }

    Some(RackScanResult {
        rack_barcode,
        timestamp,
        tubes,
    })
}

fn parse_tube_row(
    label: &str,
    barcode_value: &str,
    line_number: usize,
    tubes: &mut BTreeMap<RackPosition, TubeBarcode>,
    seen_tubes: &mut BTreeSet<TubeBarcode>,
    issues: &mut IssueLog,
) {
    let position = match RackPosition::parse_for_shape(label.trim(), RackShape::SHAPE_96) {
        Ok(position) => position,
        Err(error) => {
            issues.error(
                IssueKind::InputValidity,
                format!("Rack scanner line {}: {}", line_number, error),
            );
            return;
        }
    };
    let barcode: TubeBarcode = match barcode_value.trim().parse() {
        Ok(barcode) => barcode,
        Err(error) => {
            issues.error(
                IssueKind::InputValidity,
                format!("Rack scanner line {}: {}", line_number, error),
            );
            return;
        }
    };

    if tubes.contains_key(&position) {
        issues.error(
            IssueKind::InputValidity,
            format!("Duplicate position '{}' in rack scanner file", position),
        );
        return;
    }
    if !seen_tubes.insert(barcode.clone()) {
        issues.error(
            IssueKind::InputValidity,
            format!("Duplicate tube barcode '{}' in rack scanner file", barcode),
        );
        return;
    }
    tubes.insert(position, barcode);
}
