//! Single-rule evaluation.

use super::types::{Constraint, Rule};
use crate::attribute::{AttributeRegistry, AttributeValue, MatchContext, Target};
use crate::error::MatchError;

/// Result of evaluating one rule against one target.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub passed: bool,
    /// `rule.weight` when passed, otherwise 0.
    pub contribution: f64,
    /// Set when a required rule did not pass.
    pub required_failed: bool,
    /// Why the rule could not be evaluated, if it could not.
    pub error: Option<MatchError>,
}

/// Evaluates rules by resolving their attribute and applying the constraint.
///
/// Attribute and constraint errors stop here: they become a failed rule and
/// are only visible through [`RuleOutcome::error`] and the debug log.
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator<'r> {
    registry: &'r AttributeRegistry,
}

impl<'r> RuleEvaluator<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r AttributeRegistry {
        self.registry
    }

    pub fn evaluate(&self, rule: &Rule, target: &Target<'_>, ctx: &MatchContext<'_>) -> RuleOutcome {
        let result = self
            .registry
            .resolve(&rule.attribute, target, ctx)
            .and_then(|value| apply(&rule.constraint, &value));

        let (passed, error) = match result {
            Ok(passed) => (passed, None),
            Err(err) => {
                log::debug!(
                    "RuleEvaluator::evaluate rule on `{}` failed against {} target: {err}",
                    rule.attribute,
                    target.kind()
                );
                (false, Some(err))
            }
        };

        RuleOutcome {
            passed,
            contribution: if passed { rule.weight } else { 0.0 },
            required_failed: rule.required && !passed,
            error,
        }
    }
}

/// Applies `constraint` to a resolved attribute value.
pub fn apply(constraint: &Constraint, value: &AttributeValue) -> Result<bool, MatchError> {
    match constraint {
        Constraint::Equals(raw) => Ok(values_equal(value, constraint.operand(raw)?)),
        Constraint::DoesNotEqual(raw) => Ok(!values_equal(value, constraint.operand(raw)?)),
        Constraint::Contains(raw) => Ok(contains(value, constraint.operand(raw)?, false)),
        Constraint::ContainsI(raw) => Ok(contains(value, constraint.operand(raw)?, true)),
        Constraint::DoesNotContain(raw) => Ok(!contains(value, constraint.operand(raw)?, false)),
        Constraint::StartsWith(raw) => {
            let prefix = constraint.text_operand(raw)?;
            Ok(any_text(value, |s| s.starts_with(prefix)))
        }
        Constraint::EndsWith(raw) => {
            let suffix = constraint.text_operand(raw)?;
            Ok(any_text(value, |s| s.ends_with(suffix)))
        }
        Constraint::GreaterThan(raw) => {
            let bound = constraint.numeric_operand(raw)?;
            Ok(numeric(value).is_some_and(|v| v > bound))
        }
        Constraint::GreaterThanOrEqualTo(raw) => {
            let bound = constraint.numeric_operand(raw)?;
            Ok(numeric(value).is_some_and(|v| v >= bound))
        }
        Constraint::LessThan(raw) => {
            let bound = constraint.numeric_operand(raw)?;
            Ok(numeric(value).is_some_and(|v| v < bound))
        }
        Constraint::LessThanOrEqualTo(raw) => {
            let bound = constraint.numeric_operand(raw)?;
            Ok(numeric(value).is_some_and(|v| v <= bound))
        }
        Constraint::Range(bounds) => {
            let (min, max) = constraint.bounds(bounds)?;
            Ok(numeric(value).is_some_and(|v| {
                min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi)
            }))
        }
        Constraint::Regex(re) => {
            let regex = re.compiled().map_err(|e| constraint.malformed(e.to_string()))?;
            Ok(any_text(value, |s| regex.is_match(s)))
        }
    }
}

/// Structural equality, except that numbers compare numerically against
/// numeric text.
fn values_equal(a: &AttributeValue, b: &AttributeValue) -> bool {
    match (a, b) {
        (AttributeValue::Number(x), AttributeValue::Text(_))
        | (AttributeValue::Text(_), AttributeValue::Number(x)) => {
            let other = if matches!(a, AttributeValue::Number(_)) { b } else { a };
            other.as_f64().is_some_and(|y| y == *x)
        }
        (AttributeValue::List(xs), AttributeValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn contains(value: &AttributeValue, operand: &AttributeValue, ignore_case: bool) -> bool {
    if let AttributeValue::List(needles) = operand {
        return needles.iter().any(|n| contains_one(value, n, ignore_case));
    }
    contains_one(value, operand, ignore_case)
}

fn contains_one(value: &AttributeValue, needle: &AttributeValue, ignore_case: bool) -> bool {
    match value {
        AttributeValue::List(items) => items.iter().any(|item| {
            if ignore_case {
                match (item.as_str(), needle.as_str()) {
                    (Some(x), Some(y)) => x.to_lowercase() == y.to_lowercase(),
                    _ => values_equal(item, needle),
                }
            } else {
                values_equal(item, needle)
            }
        }),
        AttributeValue::Text(haystack) => match needle.as_str() {
            Some(n) if ignore_case => haystack.to_lowercase().contains(&n.to_lowercase()),
            Some(n) => haystack.contains(n),
            None => false,
        },
        _ => false,
    }
}

/// Applies `pred` to a text value, or to any text element of a list.
fn any_text(value: &AttributeValue, pred: impl Fn(&str) -> bool) -> bool {
    match value {
        AttributeValue::Text(s) => pred(s),
        AttributeValue::List(items) => items.iter().filter_map(AttributeValue::as_str).any(pred),
        _ => false,
    }
}

/// Numeric view of a value; single-element lists (multi-valued DICOM
/// attributes with one value) count as their element.
fn numeric(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::List(items) if items.len() == 1 => items[0].as_f64(),
        other => other.as_f64(),
    }
}
