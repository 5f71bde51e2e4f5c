use std::collections::BTreeSet;

/// The closed set of layout parameters.
///
/// Spreadsheet tags are joined to these by the alias tables below; there is
/// no reflective lookup anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum Parameter {
    #[strum(serialize = "molecule_design_pool_id")]
    Pool,
    #[strum(serialize = "position_type")]
    PositionType,
    #[strum(serialize = "iso_volume")]
    Volume,
    #[strum(serialize = "iso_concentration")]
    Concentration,
    #[strum(serialize = "transfer_targets")]
    TransferTargets,
    #[strum(serialize = "tube_barcode")]
    TubeBarcode,
}

impl Parameter {
    /// The default tag predicate: the parameter name itself.
    pub fn predicate(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterEntry {
    pub parameter: Parameter,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

/// The parameters of one layout family, with the tag domain they live in.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSet {
    pub domain: &'static str,
    pub entries: &'static [ParameterEntry],
}

impl ParameterSet {
    pub fn entry(&self, parameter: Parameter) -> Option<&ParameterEntry> {
        self.entries
            .iter()
            .find(|entry| entry.parameter == parameter)
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.entry(parameter).is_some()
    }
}

/// Pool layouts: a pool (or placeholder) per position plus the position kind.
pub const POOL_PARAMETERS: ParameterSet = ParameterSet {
    domain: "iso",
    entries: &[
        ParameterEntry {
            parameter: Parameter::Pool,
            aliases: &["molecule design pool", "pool id", "pool"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::PositionType,
            aliases: &["position type", "type"],
            required: false,
        },
    ],
};

/// Final plate layouts: pool layout parameters plus volume and concentration.
pub const ISO_PARAMETERS: ParameterSet = ParameterSet {
    domain: "iso",
    entries: &[
        ParameterEntry {
            parameter: Parameter::Pool,
            aliases: &["molecule design pool", "pool id", "pool"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::PositionType,
            aliases: &["position type", "type"],
            required: false,
        },
        ParameterEntry {
            parameter: Parameter::Volume,
            aliases: &["volume"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::Concentration,
            aliases: &["concentration"],
            required: true,
        },
    ],
};

/// Transfer layouts: pool layout parameters plus transfer targets.
pub const TRANSFER_PARAMETERS: ParameterSet = ParameterSet {
    domain: "iso",
    entries: &[
        ParameterEntry {
            parameter: Parameter::Pool,
            aliases: &["molecule design pool", "pool id", "pool"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::PositionType,
            aliases: &["position type", "type"],
            required: false,
        },
        ParameterEntry {
            parameter: Parameter::Volume,
            aliases: &["volume"],
            required: false,
        },
        ParameterEntry {
            parameter: Parameter::Concentration,
            aliases: &["concentration"],
            required: false,
        },
        ParameterEntry {
            parameter: Parameter::TransferTargets,
            aliases: &["transfer targets", "targets"],
            required: false,
        },
    ],
};

/// Stock rack layouts: pool, tube barcode and the planned transfer targets.
pub const STOCK_RACK_PARAMETERS: ParameterSet = ParameterSet {
    domain: "stock_rack",
    entries: &[
        ParameterEntry {
            parameter: Parameter::Pool,
            aliases: &["molecule design pool", "pool id", "pool"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::TubeBarcode,
            aliases: &["tube barcode", "barcode"],
            required: true,
        },
        ParameterEntry {
            parameter: Parameter::TransferTargets,
            aliases: &["transfer targets", "targets"],
            required: false,
        },
    ],
};

/// Reports whether candidate tag predicates name a parameter, tolerating the
/// usual spreadsheet spelling variants.
#[derive(Debug, Clone)]
pub struct AliasValidator {
    parameter: Parameter,
    accepted: BTreeSet<String>,
}

impl AliasValidator {
    pub fn new(entry: &ParameterEntry) -> Self {
        let mut accepted = BTreeSet::new();
        accepted.insert(Self::normalize(&entry.parameter.predicate()));
        for alias in entry.aliases {
            accepted.insert(Self::normalize(alias));
        }
        Self {
            parameter: entry.parameter,
            accepted,
        }
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }

    /// Trim, lower-case and collapse underscores/hyphens to single spaces.
    pub fn normalize(value: &str) -> String {
        value
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn matches(&self, predicate: &str) -> bool {
        self.accepted.contains(&Self::normalize(predicate))
    }

    /// The accepted spellings, for error messages.
    pub fn accepted(&self) -> Vec<&str> {
        self.accepted.iter().map(String::as_str).collect()
    }
}
