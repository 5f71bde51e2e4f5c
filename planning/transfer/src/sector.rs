use lab::geometry::{RackPosition, RackShape};
use thiserror::Error;

/// How the sectors of source and target racks relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TranslationBehaviour {
    /// Equal shapes, no sector arithmetic.
    #[strum(serialize = "one-to-one")]
    OneToOne,
    /// A small rack feeding one sector of a larger rack.
    #[strum(serialize = "one-to-many")]
    OneToMany,
    /// One sector of a larger rack condensed onto a small rack.
    #[strum(serialize = "many-to-one")]
    ManyToOne,
    /// Sector to sector within equally-shaped racks.
    #[strum(serialize = "many-to-many")]
    ManyToMany,
}

#[derive(Error, Debug, PartialEq)]
pub enum SectorError {
    #[error("Sector counts must be squares (1, 4, 16, ...), found: {0}")]
    NotASquare(usize),

    #[error("Sector index {sector} is out of range for {number_sectors} sectors")]
    SectorOutOfRange { sector: usize, number_sectors: usize },

    #[error("Position '{position}' does not lie in sector {sector} of {number_sectors}")]
    PositionNotInSector {
        position: RackPosition,
        sector: usize,
        number_sectors: usize,
    },
}

/// Side length of the sector grid, e.g. 2 for 4 sectors.
fn sector_grid_side(number_sectors: usize) -> Result<usize, SectorError> {
    let side = (number_sectors as f64).sqrt().round() as usize;
    if side * side != number_sectors || number_sectors == 0 {
        return Err(SectorError::NotASquare(number_sectors));
    }
    Ok(side)
}

/// The sector a position belongs to, 0-based row-major over the offsets.
pub fn sector_index(position: RackPosition, number_sectors: usize) -> Result<usize, SectorError> {
    let side = sector_grid_side(number_sectors)?;
    Ok((position.row() % side) * side + position.column() % side)
}

/// Maps positions between racks related by sector composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RackSectorTranslator {
    pub number_sectors: usize,
    pub source_sector: usize,
    pub target_sector: usize,
    pub behaviour: TranslationBehaviour,
    side: usize,
}

impl RackSectorTranslator {
    pub fn new(
        number_sectors: usize,
        source_sector: usize,
        target_sector: usize,
        behaviour: TranslationBehaviour,
    ) -> Result<Self, SectorError> {
        let side = sector_grid_side(number_sectors)?;
        for sector in [source_sector, target_sector] {
            if sector >= number_sectors {
                return Err(SectorError::SectorOutOfRange {
                    sector,
                    number_sectors,
                });
            }
        }
        Ok(Self {
            number_sectors,
            source_sector,
            target_sector,
            behaviour,
            side,
        })
    }

    fn sector_offsets(&self, sector: usize) -> (usize, usize) {
        (sector / self.side, sector % self.side)
    }

    fn check_in_sector(&self, position: RackPosition, sector: usize) -> Result<(), SectorError> {
        let (row_offset, column_offset) = self.sector_offsets(sector);
        if position.row() % self.side != row_offset || position.column() % self.side != column_offset {
            return Err(SectorError::PositionNotInSector {
                position,
                sector,
                number_sectors: self.number_sectors,
            });
        }
        Ok(())
    }

    pub fn translate(&self, position: RackPosition) -> Result<RackPosition, SectorError> {
        match self.behaviour {
            TranslationBehaviour::OneToOne => Ok(position),
            TranslationBehaviour::OneToMany => {
                let (row_offset, column_offset) = self.sector_offsets(self.target_sector);
                Ok(RackPosition::new(
                    position.row() * self.side + row_offset,
                    position.column() * self.side + column_offset,
                ))
            }
            TranslationBehaviour::ManyToOne => {
                self.check_in_sector(position, self.source_sector)?;
                Ok(RackPosition::new(position.row() / self.side, position.column() / self.side))
            }
            TranslationBehaviour::ManyToMany => {
                self.check_in_sector(position, self.source_sector)?;
                let (row_offset, column_offset) = self.sector_offsets(self.target_sector);
                Ok(RackPosition::new(
                    (position.row() / self.side) * self.side + row_offset,
                    (position.column() / self.side) * self.side + column_offset,
                ))
            }
        }
    }
}

/// All positions of `shape` belonging to `sector`, row-major.
pub fn sector_positions(
    shape: RackShape,
    number_sectors: usize,
    sector: usize,
) -> Result<Vec<RackPosition>, SectorError> {
    let side = sector_grid_side(number_sectors)?;
    if sector >= number_sectors {
        return Err(SectorError::SectorOutOfRange {
            sector,
            number_sectors,
        });
    }
    let (row_offset, column_offset) = (sector / side, sector % side);
    Ok(shape
        .positions()
        .filter(|position| position.row() % side == row_offset && position.column() % side == column_offset)
        .collect())
}

#[cfg(test)]
mod sector_translator_tests {
    use rstest::rstest;

    use super::*;

    fn position(label: &str) -> RackPosition {
        label.parse().unwrap()
    }

    #[rstest]
    #[case("A1", 0)]
    #[case("A2", 1)]
    #[case("B1", 2)]
    #[case("B2", 3)]
    #[case("C3", 0)]
    #[case("P24", 3)]
    fn sector_indices(#[case] label: &str, #[case] expected_sector: usize) {
        assert_eq!(sector_index(position(label), 4).unwrap(), expected_sector);
    }

    #[test]
    fn single_sector_translation_is_identity() {
        for behaviour in [
            TranslationBehaviour::OneToOne,
            TranslationBehaviour::OneToMany,
            TranslationBehaviour::ManyToOne,
            TranslationBehaviour::ManyToMany,
        ] {
            let translator = RackSectorTranslator::new(1, 0, 0, behaviour).unwrap();
            assert_eq!(translator.translate(position("C5")).unwrap(), position("C5"));
        }
    }

    #[rstest]
    #[case(0, "A1", "A1")]
    #[case(0, "B2", "C3")]
    #[case(1, "A1", "A2")]
    #[case(2, "A1", "B1")]
    #[case(3, "D6", "H12")]
    fn one_to_many(#[case] target_sector: usize, #[case] source: &str, #[case] expected_target: &str) {
        let translator = RackSectorTranslator::new(4, 0, target_sector, TranslationBehaviour::OneToMany).unwrap();
        assert_eq!(translator.translate(position(source)).unwrap(), position(expected_target));
    }

    #[rstest]
    #[case(0, "A1", "A1")]
    #[case(0, "C3", "B2")]
    #[case(3, "B2", "A1")]
    #[case(3, "P24", "H12")]
    fn many_to_one(#[case] source_sector: usize, #[case] source: &str, #[case] expected_target: &str) {
        let translator = RackSectorTranslator::new(4, source_sector, 0, TranslationBehaviour::ManyToOne).unwrap();
        assert_eq!(translator.translate(position(source)).unwrap(), position(expected_target));
    }

    #[test]
    fn many_to_one_rejects_foreign_sectors() {
        let translator = RackSectorTranslator::new(4, 0, 0, TranslationBehaviour::ManyToOne).unwrap();

        assert_eq!(
            translator.translate(position("A2")),
            Err(SectorError::PositionNotInSector {
                position: position("A2"),
                sector: 0,
                number_sectors: 4,
            })
        );
    }

    #[test]
    fn one_to_many_rejects_nothing_but_covers_only_its_sector() {
        let translator = RackSectorTranslator::new(4, 0, 2, TranslationBehaviour::OneToMany).unwrap();
        // every target lands in sector 2
        for source in RackShape::SHAPE_96.positions() {
            let target = translator.translate(source).unwrap();
            assert_eq!(sector_index(target, 4).unwrap(), 2);
        }
    }

    #[test]
    fn many_to_many_moves_between_sectors() {
        let translator = RackSectorTranslator::new(4, 1, 2, TranslationBehaviour::ManyToMany).unwrap();

        assert_eq!(translator.translate(position("A2")).unwrap(), position("B1"));
        assert_eq!(translator.translate(position("C4")).unwrap(), position("D3"));
        assert!(translator.translate(position("A1")).is_err());
    }

    #[test]
    fn distinct_sources_never_collide_in_many_to_one() {
        // two translators from different source sectors; no shared source
        // position is accepted by both
        let from_0 = RackSectorTranslator::new(4, 0, 0, TranslationBehaviour::ManyToOne).unwrap();
        let from_3 = RackSectorTranslator::new(4, 3, 0, TranslationBehaviour::ManyToOne).unwrap();

        for source in RackShape::SHAPE_384.positions() {
            let accepted_by_both = from_0.translate(source).is_ok() && from_3.translate(source).is_ok();
            assert!(!accepted_by_both);
        }
    }

    #[test]
    fn sector_positions_cover_the_shape_once() {
        let mut all: Vec<RackPosition> = vec![];
        for sector in 0..4 {
            all.extend(sector_positions(RackShape::SHAPE_384, 4, sector).unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), RackShape::SHAPE_384.size());
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(5)]
    fn invalid_sector_counts(#[case] number_sectors: usize) {
        assert_eq!(
            RackSectorTranslator::new(number_sectors, 0, 0, TranslationBehaviour::OneToOne),
            Err(SectorError::NotASquare(number_sectors))
        );
    }
}
