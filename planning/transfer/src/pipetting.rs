/// Capabilities of one liquid-handling method.
///
/// Worklists carry the specs they were planned for; executors use them to
/// validate transfer volumes before touching sample state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipettingSpecs {
    pub name: &'static str,
    /// Smallest transferable volume in ul.
    pub min_transfer_volume: f64,
    /// Largest volume in ul for a single step; larger transfers are split by
    /// the planner.
    pub max_transfer_volume: f64,
    /// Whether transfers are bound to full rack sectors.
    pub is_sector_bound: bool,
}

/// Individually-channelled pipettor; fastest when many source wells share a
/// column.
pub const BIOMEK: PipettingSpecs = PipettingSpecs {
    name: "BioMek",
    min_transfer_volume: 2.0,
    max_transfer_volume: 250.0,
    is_sector_bound: false,
};

/// Multi-channel pipettor; one transfer moves a full sector simultaneously.
pub const CYBIO: PipettingSpecs = PipettingSpecs {
    name: "CyBio",
    min_transfer_volume: 1.0,
    max_transfer_volume: 250.0,
    is_sector_bound: true,
};

pub const MANUAL: PipettingSpecs = PipettingSpecs {
    name: "manual",
    min_transfer_volume: 0.5,
    max_transfer_volume: 500.0,
    is_sector_bound: false,
};

impl PipettingSpecs {
    pub fn supports_volume(&self, volume: f64) -> bool {
        !util::number::is_smaller(volume, self.min_transfer_volume)
            && !util::number::is_larger(volume, self.max_transfer_volume)
    }
}

#[cfg(test)]
mod pipetting_specs_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BIOMEK, 2.0, true)]
    #[case(BIOMEK, 1.9, false)]
    #[case(BIOMEK, 250.0, true)]
    #[case(BIOMEK, 250.5, false)]
    #[case(CYBIO, 1.0, true)]
    #[case(MANUAL, 0.5, true)]
    fn volume_support(#[case] specs: PipettingSpecs, #[case] volume: f64, #[case] expected_result: bool) {
        assert_eq!(specs.supports_volume(volume), expected_result);
    }
}
