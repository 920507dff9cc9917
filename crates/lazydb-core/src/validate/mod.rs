//! Constraint validation over entity instances.
//!
//! The walk visits each declared attribute, asks the reachability resolver
//! before touching its value, and evaluates the attribute's constraints only
//! when the value is already in memory. Values are read through
//! `EntityInstance::loaded_value_at`, which never fetches.

#[cfg(test)]
mod tests;

use crate::{
    entity::EntityInstance,
    obs::sink::{MetricsEvent, record},
    resolve::{PathNode, ReachabilityResolver},
    value::Value,
    visitor::{IssueCollector, PathSegment, VisitorContext},
};
use std::{collections::BTreeMap, slice};
use thiserror::Error as ThisError;

///
/// ValidateError
///

#[derive(Debug, ThisError)]
pub enum ValidateError {
    #[error("validation failed: {}", render_issues(.0))]
    ValidationFailed(BTreeMap<String, Vec<String>>),
}

impl ValidateError {
    #[must_use]
    pub const fn issues(&self) -> &BTreeMap<String, Vec<String>> {
        match self {
            Self::ValidationFailed(issues) => issues,
        }
    }
}

fn render_issues(issues: &BTreeMap<String, Vec<String>>) -> String {
    issues
        .iter()
        .map(|(path, messages)| format!("{path}: {}", messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}

///
/// Constraint
///
/// Declarative rule attached to an attribute (or to each element of a
/// collection attribute).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Constraint {
    /// Value must not be `Null`.
    Required,
    /// Text length / collection size must not exceed the bound.
    MaxLen(usize),
    /// Text length / collection size must reach the bound.
    MinLen(usize),
    /// Integer must fall within the inclusive range.
    Range { min: i64, max: i64 },
}

impl Constraint {
    /// Check one value, reporting violations through the context.
    /// `Null` satisfies every constraint except `Required`.
    pub fn check(&self, value: &Value, ctx: &mut dyn VisitorContext) {
        match self {
            Self::Required => {
                if value.is_null() {
                    ctx.issue("value is required");
                }
            }

            Self::MaxLen(max) => {
                if let Some(len) = value.len()
                    && len > *max
                {
                    ctx.issue(format!("size ({len}) is greater than maximum of {max}"));
                }
            }

            Self::MinLen(min) => {
                if let Some(len) = value.len()
                    && len < *min
                {
                    ctx.issue(format!("size ({len}) is lower than minimum of {min}"));
                }
            }

            Self::Range { min, max } => {
                if let Some(n) = value.as_int()
                    && !(*min..=*max).contains(&n)
                {
                    ctx.issue(format!("{n} is outside the range {min}..={max}"));
                }
            }
        }
    }
}

///
/// ValidationSummary
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidationSummary {
    /// Attributes whose constraints were evaluated.
    pub checked: u64,
    /// Attributes skipped because they were not reachable.
    pub skipped: u64,
}

///
/// validate_entity
///
/// Validate every reachable attribute of an instance, collecting issues by
/// path. Unreachable attributes are skipped, never loaded.
///
pub fn validate_entity(
    instance: &EntityInstance,
    resolver: &ReachabilityResolver,
) -> Result<ValidationSummary, ValidateError> {
    let model = instance.model();
    let mut collector = IssueCollector::new();
    let mut summary = ValidationSummary::default();

    for (index, field) in model.fields.iter().enumerate() {
        if !field.is_constrained() {
            continue;
        }

        let node = PathNode::property(field.name);
        if !resolver.is_reachable(instance, &node, None, &[]) {
            summary.skipped += 1;
            continue;
        }
        let Some(value) = instance.loaded_value_at(index) else {
            summary.skipped += 1;
            continue;
        };
        summary.checked += 1;

        collector.push(PathSegment::Field(field.name));
        let ctx: &mut dyn VisitorContext = &mut collector;
        for constraint in field.constraints {
            constraint.check(value, ctx);
        }

        if !field.element_constraints.is_empty()
            && let Value::List(items) = value
            && resolver.is_cascadable(instance, &node, Some(field.kind), &[])
        {
            for (i, item) in items.iter().enumerate() {
                let element = PathNode::element(field.name, i);
                if !resolver.is_reachable(
                    instance,
                    &element,
                    Some(field.kind),
                    slice::from_ref(&node),
                ) {
                    continue;
                }

                collector.push(PathSegment::Index(i));
                let ctx: &mut dyn VisitorContext = &mut collector;
                for constraint in field.element_constraints {
                    constraint.check(item, ctx);
                }
                collector.pop();
            }
        }
        collector.pop();
    }

    record(MetricsEvent::ValidationPass {
        entity_path: model.path,
        checked: summary.checked,
        skipped: summary.skipped,
    });

    let issues = collector.into_issues();
    if issues.is_empty() {
        Ok(summary)
    } else {
        Err(ValidateError::ValidationFailed(issues))
    }
}
