use std::collections::BTreeMap;

use lab::geometry::RackPosition;
use lab::rack_layout::RackLayout;
use util::issue::{IssueKind, IssueLog};

use crate::parameter::{AliasValidator, Parameter, ParameterSet};
use crate::working::{WorkingLayout, WorkingPosition};

/// Raw parameter values gathered for one rack position.
pub type ParameterMap = BTreeMap<Parameter, String>;

/// Builds working positions of one layout family from raw parameter values.
///
/// Implementations decide whether a position is acceptable; returning `None`
/// without logging an error means "empty here, skip it".
pub trait PositionBuilder {
    type Position: WorkingPosition;

    fn parameter_set(&self) -> &'static ParameterSet;

    /// Parameters the builder tolerates being absent from the whole layout,
    /// even though the parameter set marks them required.
    fn optional_parameters(&self) -> &'static [Parameter] {
        &[]
    }

    fn build_position(
        &self,
        rack_position: RackPosition,
        values: &ParameterMap,
        issues: &mut IssueLog,
    ) -> Option<Self::Position>;

    /// Whole-layout checks after all positions were built.
    fn check_layout(&self, _layout: &WorkingLayout<Self::Position>, _issues: &mut IssueLog) {}
}

/// Turns a rack layout into a closed working layout.
///
/// All problems are accumulated into the issue log; the converter returns
/// `None` (never a partial layout) when any error-severity issue was logged.
pub fn convert_layout<B: PositionBuilder>(
    builder: &B,
    rack_layout: &RackLayout,
    issues: &mut IssueLog,
) -> Option<WorkingLayout<B::Position>> {
    let parameter_set = builder.parameter_set();
    let validators: Vec<AliasValidator> = parameter_set
        .entries
        .iter()
        .map(AliasValidator::new)
        .collect();

    check_required_parameters(builder, rack_layout, &validators, issues);
    if issues.has_errors() {
        return None;
    }

    let mut layout = WorkingLayout::new(rack_layout.shape);
    for rack_position in rack_layout.shape.positions() {
        let tags = rack_layout.tags_for_position(rack_position);
        if tags.is_empty() {
            continue;
        }

        let mut values = ParameterMap::new();
        let mut duplicate = false;
        for tag in tags.iter() {
            for validator in validators.iter() {
                if !validator.matches(&tag.predicate) {
                    continue;
                }
                if values
                    .insert(validator.parameter(), tag.value.clone())
                    .is_some()
                {
                    issues.error(
                        IssueKind::Conversion,
                        format!(
                            "Duplicate value for parameter '{}' at position '{}'",
                            validator.parameter(),
                            rack_position
                        ),
                    );
                    duplicate = true;
                }
            }
        }
        if duplicate || values.is_empty() {
            continue;
        }

        let Some(position) = builder.build_position(rack_position, &values, issues) else {
            continue;
        };

        if let Err(error) = layout.add_position(position) {
            issues.error(IssueKind::Conversion, error.to_string());
        }
    }

    builder.check_layout(&layout, issues);

    if issues.has_errors() {
        return None;
    }
    layout.close();
    Some(layout)
}

fn check_required_parameters<B: PositionBuilder>(
    builder: &B,
    rack_layout: &RackLayout,
    validators: &[AliasValidator],
    issues: &mut IssueLog,
) {
    let all_tags = rack_layout.all_tags();
    for (entry, validator) in builder
        .parameter_set()
        .entries
        .iter()
        .zip(validators.iter())
    {
        if !entry.required || builder.optional_parameters().contains(&entry.parameter) {
            continue;
        }
        let found = all_tags
            .iter()
            .any(|tag| validator.matches(&tag.predicate));
        if !found {
            issues.error(
                IssueKind::Conversion,
                format!(
                    "No tag found for required parameter '{}'. Accepted predicates: {}",
                    entry.parameter,
                    validator.accepted().join(", ")
                ),
            );
        }
    }
}
