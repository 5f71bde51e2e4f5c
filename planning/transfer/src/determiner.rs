use layout::position::{PoolPosition, PositionKind};
use layout::working::{WorkingLayout, WorkingPosition};
use util::issue::{IssueKind, IssueLog};
use util::number;

use crate::sector::sector_index;

/// Collects the single value an attribute takes per rack sector.
///
/// Fails when any sector exhibits more than one distinct value; sectors
/// without a value stay `None`.
pub struct SectorValueDeterminer<F> {
    number_sectors: usize,
    attribute_name: &'static str,
    attribute: F,
    regard_controls: bool,
}

impl<F> SectorValueDeterminer<F>
where
    F: Fn(&PoolPosition) -> Option<f64>,
{
    pub fn new(number_sectors: usize, attribute_name: &'static str, attribute: F) -> Self {
        Self {
            number_sectors,
            attribute_name,
            attribute,
            regard_controls: true,
        }
    }

    /// Skip fixed (control) positions when collecting values.
    pub fn ignoring_controls(mut self) -> Self {
        self.regard_controls = false;
        self
    }

    pub fn determine(
        &self,
        layout: &WorkingLayout<PoolPosition>,
        issues: &mut IssueLog,
    ) -> Option<Vec<Option<f64>>> {
        let mut values: Vec<Option<f64>> = vec![None; self.number_sectors];

        for position in layout.positions() {
            if !self.regard_controls && position.kind == PositionKind::Fixed {
                continue;
            }
            let Some(value) = (self.attribute)(position) else {
                continue;
            };
            let sector = match sector_index(position.rack_position(), self.number_sectors) {
                Ok(sector) => sector,
                Err(error) => {
                    issues.error(IssueKind::Geometry, error.to_string());
                    return None;
                }
            };
            match values[sector] {
                None => values[sector] = Some(value),
                Some(existing) if number::is_equal(existing, value) => {}
                Some(existing) => {
                    issues.error(
                        IssueKind::Geometry,
                        format!(
                            "There is more than one value for sector {} ({}): {}, {}",
                            sector,
                            self.attribute_name,
                            util::number::format_quantity(existing),
                            util::number::format_quantity(value)
                        ),
                    );
                    return None;
                }
            }
        }

        Some(values)
    }
}

/// Determiner over the ISO concentration of each position.
pub fn concentration_determiner(
    number_sectors: usize,
) -> SectorValueDeterminer<impl Fn(&PoolPosition) -> Option<f64>> {
    SectorValueDeterminer::new(number_sectors, "iso_concentration", |position| position.concentration)
}

/// Determiner over the ISO volume of each position.
pub fn volume_determiner(number_sectors: usize) -> SectorValueDeterminer<impl Fn(&PoolPosition) -> Option<f64>> {
    SectorValueDeterminer::new(number_sectors, "iso_volume", |position| position.volume)
}
