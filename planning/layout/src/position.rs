use std::collections::BTreeSet;
use std::sync::Arc;

use lab::geometry::RackPosition;
use lab::pool::{MoleculeDesignPool, PoolId};
use lab::tag::Tag;
use thiserror::Error;
use util::number::format_quantity;

use crate::parameter::{Parameter, ParameterSet};
use crate::working::WorkingPosition;

/// How a rack position participates in an experiment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString
)]
#[strum(ascii_case_insensitive)]
pub enum PositionKind {
    /// A specific pool.
    #[strum(serialize = "fixed")]
    Fixed,
    /// Pool chosen later; the layout carries a placeholder like "md_1".
    #[strum(serialize = "floating")]
    Floating,
    /// Buffer only, no pool.
    #[strum(serialize = "mock")]
    Mock,
    /// Supplied by a prebuilt library plate.
    #[strum(serialize = "library")]
    Library,
    /// Documentary: cells present, nothing applied.
    #[strum(serialize = "untreated")]
    Untreated,
    #[strum(serialize = "untransfected")]
    Untransfected,
    #[strum(serialize = "empty")]
    Empty,
}

impl PositionKind {
    /// Untreated and untransfected positions carry no liquid but stay in
    /// closed layouts for documentation.
    pub fn is_documentation(&self) -> bool {
        matches!(self, PositionKind::Untreated | PositionKind::Untransfected)
    }

    pub fn has_pool(&self) -> bool {
        matches!(self, PositionKind::Fixed | PositionKind::Floating)
    }
}

/// The pool slot of a position; what it may hold depends on the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolContent {
    Pool(Arc<MoleculeDesignPool>),
    /// Floating placeholder, e.g. "md_1".
    Placeholder(String),
    /// Mock/library/untreated/untransfected positions carry the kind literal
    /// in their pool tag instead of a pool.
    None,
}

impl PoolContent {
    pub fn pool(&self) -> Option<&Arc<MoleculeDesignPool>> {
        match self {
            PoolContent::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn pool_id(&self) -> Option<PoolId> {
        self.pool().map(|pool| pool.id)
    }

    pub fn placeholder(&self) -> Option<&str> {
        match self {
            PoolContent::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PositionKindError {
    #[error("Position kind '{kind}' does not allow a concentration")]
    UnexpectedConcentration { kind: PositionKind },

    #[error("Position kind '{kind}' does not allow a volume")]
    UnexpectedVolume { kind: PositionKind },

    #[error("Position kind '{kind}' requires a pool")]
    MissingPool { kind: PositionKind },

    #[error("Position kind '{kind}' does not allow a pool")]
    UnexpectedPool { kind: PositionKind },
}

/// A pool-layout position: rack position, kind and pool content, optionally
/// annotated with the ISO volume and concentration for final plate layouts.
#[derive(Debug, Clone)]
pub struct PoolPosition {
    pub position: RackPosition,
    pub kind: PositionKind,
    pub pool: PoolContent,
    /// Volume in ul; None outside ISO layouts and for documentation kinds.
    pub volume: Option<f64>,
    /// Concentration in nM; None for mock and documentation kinds.
    pub concentration: Option<f64>,
    parameter_set: &'static ParameterSet,
}

impl PoolPosition {
    pub fn fixed(position: RackPosition, pool: Arc<MoleculeDesignPool>, parameter_set: &'static ParameterSet) -> Self {
        Self {
            position,
            kind: PositionKind::Fixed,
            pool: PoolContent::Pool(pool),
            volume: None,
            concentration: None,
            parameter_set,
        }
    }

    pub fn floating(
        position: RackPosition,
        placeholder: impl Into<String>,
        parameter_set: &'static ParameterSet,
    ) -> Self {
        Self {
            position,
            kind: PositionKind::Floating,
            pool: PoolContent::Placeholder(placeholder.into()),
            volume: None,
            concentration: None,
            parameter_set,
        }
    }

    pub fn of_kind(position: RackPosition, kind: PositionKind, parameter_set: &'static ParameterSet) -> Self {
        Self {
            position,
            kind,
            pool: PoolContent::None,
            volume: None,
            concentration: None,
            parameter_set,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_concentration(mut self, concentration: f64) -> Self {
        self.concentration = Some(concentration);
        self
    }

    /// Replaces a floating placeholder that could not be served by a stock
    /// tube; the position then behaves as empty.
    pub fn inactivate(&mut self) {
        self.kind = PositionKind::Empty;
        self.pool = PoolContent::None;
        self.volume = None;
        self.concentration = None;
    }

    /// The value of the pool tag for this position.
    pub fn pool_tag_value(&self) -> String {
        match (&self.pool, self.kind) {
            (PoolContent::Pool(pool), _) => pool.id.to_string(),
            (PoolContent::Placeholder(placeholder), _) => placeholder.clone(),
            (PoolContent::None, kind) => kind.to_string(),
        }
    }

    /// Per-kind field invariants.
    pub fn check_invariants(&self) -> Result<(), PositionKindError> {
        match self.kind {
            PositionKind::Fixed | PositionKind::Floating => {
                if self.pool.pool().is_none() && self.pool.placeholder().is_none() {
                    return Err(PositionKindError::MissingPool {
                        kind: self.kind,
                    });
                }
            }
            PositionKind::Mock => {
                if self.concentration.is_some() {
                    return Err(PositionKindError::UnexpectedConcentration {
                        kind: self.kind,
                    });
                }
            }
            PositionKind::Library => {}
            PositionKind::Untreated | PositionKind::Untransfected | PositionKind::Empty => {
                if self.pool.pool().is_some() {
                    return Err(PositionKindError::UnexpectedPool {
                        kind: self.kind,
                    });
                }
                if self.volume.is_some() {
                    return Err(PositionKindError::UnexpectedVolume {
                        kind: self.kind,
                    });
                }
                if self.concentration.is_some() {
                    return Err(PositionKindError::UnexpectedConcentration {
                        kind: self.kind,
                    });
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for PoolPosition {
    /// Structural over the semantic fields; the parameter set only steers tag
    /// emission.
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.kind == other.kind
            && self.pool == other.pool
            && self.volume == other.volume
            && self.concentration == other.concentration
    }
}

impl WorkingPosition for PoolPosition {
    fn rack_position(&self) -> RackPosition {
        self.position
    }

    fn tag_set(&self) -> BTreeSet<Tag> {
        let domain = self.parameter_set.domain;
        let mut tags = BTreeSet::new();
        tags.insert(Tag::new(domain, Parameter::Pool.predicate(), self.pool_tag_value()));
        tags.insert(Tag::new(
            domain,
            Parameter::PositionType.predicate(),
            self.kind.to_string(),
        ));
        if let Some(volume) = self.volume {
            tags.insert(Tag::new(domain, Parameter::Volume.predicate(), format_quantity(volume)));
        }
        if let Some(concentration) = self.concentration {
            tags.insert(Tag::new(
                domain,
                Parameter::Concentration.predicate(),
                format_quantity(concentration),
            ));
        }
        tags
    }

    fn is_empty(&self) -> bool {
        self.kind == PositionKind::Empty
    }

    fn is_documentation(&self) -> bool {
        self.kind.is_documentation()
    }
}

#[cfg(test)]
mod position_kind_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("fixed", PositionKind::Fixed)]
    #[case("FIXED", PositionKind::Fixed)]
    #[case("Floating", PositionKind::Floating)]
    #[case("mock", PositionKind::Mock)]
    #[case("untransfected", PositionKind::Untransfected)]
    fn parse(#[case] value: &str, #[case] expected_result: PositionKind) {
        assert_eq!(value.parse::<PositionKind>().unwrap(), expected_result);
    }

    #[test]
    fn mock_rejects_concentration() {
        let position = PoolPosition::of_kind(
            RackPosition::new(0, 0),
            PositionKind::Mock,
            &crate::parameter::ISO_PARAMETERS,
        )
        .with_volume(10.0)
        .with_concentration(50.0);

        assert_eq!(
            position.check_invariants(),
            Err(PositionKindError::UnexpectedConcentration {
                kind: PositionKind::Mock
            })
        );
    }

    #[test]
    fn inactivated_floating_positions_behave_as_empty() {
        let mut position = PoolPosition::floating(RackPosition::new(0, 0), "md_1", &crate::parameter::ISO_PARAMETERS)
            .with_volume(10.0)
            .with_concentration(50.0);

        position.inactivate();

        assert!(position.is_empty());
        assert_eq!(position.pool, PoolContent::None);
        assert!(position.volume.is_none());
    }

    #[test]
    fn untreated_rejects_volume_and_concentration() {
        let position = PoolPosition::of_kind(
            RackPosition::new(0, 0),
            PositionKind::Untreated,
            &crate::parameter::ISO_PARAMETERS,
        )
        .with_volume(10.0);

        assert_eq!(
            position.check_invariants(),
            Err(PositionKindError::UnexpectedVolume {
                kind: PositionKind::Untreated
            })
        );
    }
}
