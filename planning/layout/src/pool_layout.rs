use lab::geometry::RackPosition;
use lab::pool::{PoolId, PoolRegistry};
use lab::rack_layout::RackLayout;
use util::issue::{IssueKind, IssueLog};

use crate::converter::{convert_layout, ParameterMap, PositionBuilder};
use crate::parameter::{Parameter, ParameterSet, ISO_PARAMETERS, POOL_PARAMETERS};
use crate::position::{PoolPosition, PositionKind};
use crate::working::WorkingLayout;

pub type PoolLayout = WorkingLayout<PoolPosition>;

/// Prefix of floating placeholders, e.g. "md_1".
pub const FLOATING_INDICATOR: &str = "md_";

/// The literal emitted for an absent parameter value.
pub const NONE_VALUE: &str = "None";

/// Converts rack layouts into pool layouts, resolving pool ids against the
/// registry and reconciling position kinds with pool values.
pub struct PoolLayoutConverter<'a> {
    pools: &'a PoolRegistry,
    parameter_set: &'static ParameterSet,
}

impl<'a> PoolLayoutConverter<'a> {
    /// For plain pool layouts (no volumes or concentrations).
    pub fn new(pools: &'a PoolRegistry) -> Self {
        Self {
            pools,
            parameter_set: &POOL_PARAMETERS,
        }
    }

    /// For final plate layouts carrying ISO volume and concentration.
    pub fn for_iso(pools: &'a PoolRegistry) -> Self {
        Self {
            pools,
            parameter_set: &ISO_PARAMETERS,
        }
    }

    /// Base converter of the transfer layout family.
    pub(crate) fn for_transfer(pools: &'a PoolRegistry) -> Self {
        Self {
            pools,
            parameter_set: &crate::parameter::TRANSFER_PARAMETERS,
        }
    }

    pub fn convert(&self, rack_layout: &RackLayout, issues: &mut IssueLog) -> Option<PoolLayout> {
        convert_layout(self, rack_layout, issues)
    }
}

/// Splits a pool tag value into content and the kind it implies.
pub(crate) fn interpret_pool_value(
    pools: &PoolRegistry,
    rack_position: RackPosition,
    value: &str,
    issues: &mut IssueLog,
) -> Option<(PositionKind, crate::position::PoolContent)> {
    use crate::position::PoolContent;

    let trimmed = value.trim();
    if let Ok(kind) = trimmed.parse::<PositionKind>() {
        // "mock", "library", "untreated", "untransfected", "empty"
        return Some((kind, PoolContent::None));
    }
    if trimmed
        .to_lowercase()
        .starts_with(FLOATING_INDICATOR)
    {
        return Some((PositionKind::Floating, PoolContent::Placeholder(trimmed.to_string())));
    }
    match trimmed.parse::<PoolId>() {
        Ok(pool_id) => match pools.find(pool_id) {
            Some(pool) => Some((PositionKind::Fixed, PoolContent::Pool(pool))),
            None => {
                issues.error(
                    IssueKind::Conversion,
                    format!("Unknown molecule design pool '{}' at position '{}'", pool_id, rack_position),
                );
                None
            }
        },
        Err(_) => {
            issues.error(
                IssueKind::Conversion,
                format!("Invalid pool value '{}' at position '{}'", trimmed, rack_position),
            );
            None
        }
    }
}

pub(crate) fn effective_value<'v>(values: &'v ParameterMap, parameter: Parameter) -> Option<&'v str> {
    values
        .get(&parameter)
        .map(String::as_str)
        .filter(|value| *value != NONE_VALUE)
}

pub(crate) fn parse_quantity(
    rack_position: RackPosition,
    parameter: Parameter,
    value: &str,
    issues: &mut IssueLog,
) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(quantity) if quantity > 0.0 => Some(quantity),
        _ => {
            issues.error(
                IssueKind::Conversion,
                format!(
                    "Invalid value '{}' for parameter '{}' at position '{}'",
                    value, parameter, rack_position
                ),
            );
            None
        }
    }
}

impl PositionBuilder for PoolLayoutConverter<'_> {
    type Position = PoolPosition;

    fn parameter_set(&self) -> &'static ParameterSet {
        self.parameter_set
    }

    fn build_position(
        &self,
        rack_position: RackPosition,
        values: &ParameterMap,
        issues: &mut IssueLog,
    ) -> Option<PoolPosition> {
        let explicit_kind = match effective_value(values, Parameter::PositionType) {
            Some(value) => match value.parse::<PositionKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    issues.error(
                        IssueKind::Conversion,
                        format!("Unknown position type '{}' at position '{}'", value, rack_position),
                    );
                    return None;
                }
            },
            None => None,
        };

        let Some(pool_value) = effective_value(values, Parameter::Pool) else {
            // no pool value: only documentation kinds can stand alone
            return match explicit_kind {
                Some(kind) if kind.is_documentation() || kind == PositionKind::Empty => {
                    Some(PoolPosition::of_kind(rack_position, kind, self.parameter_set))
                }
                Some(kind) => {
                    issues.error(
                        IssueKind::Conversion,
                        format!(
                            "Position '{}' is typed '{}' but carries no pool value",
                            rack_position, kind
                        ),
                    );
                    None
                }
                None => None,
            };
        };

        let (derived_kind, pool) = interpret_pool_value(self.pools, rack_position, pool_value, issues)?;
        if let Some(explicit) = explicit_kind {
            if explicit != derived_kind {
                issues.error(
                    IssueKind::Conversion,
                    format!(
                        "Position '{}' is typed '{}' but its pool value '{}' implies '{}'",
                        rack_position, explicit, pool_value, derived_kind
                    ),
                );
                return None;
            }
        }

        let mut position = PoolPosition::of_kind(rack_position, derived_kind, self.parameter_set);
        position.pool = pool;

        if self.parameter_set.contains(Parameter::Volume) {
            if let Some(value) = effective_value(values, Parameter::Volume) {
                position.volume = Some(parse_quantity(rack_position, Parameter::Volume, value, issues)?);
            }
        }
        if self.parameter_set.contains(Parameter::Concentration) {
            if let Some(value) = effective_value(values, Parameter::Concentration) {
                position.concentration =
                    Some(parse_quantity(rack_position, Parameter::Concentration, value, issues)?);
            }
        }

        if let Err(error) = position.check_invariants() {
            issues.error(
                IssueKind::LayoutInvariant,
                format!("Position '{}': {}", rack_position, error),
            );
            return None;
        }

        Some(position)
    }
}
