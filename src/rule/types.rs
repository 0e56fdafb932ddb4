//! Matching rules and constraint variants.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::error::MatchError;

fn default_weight() -> f64 {
    1.0
}

fn is_default_weight(w: &f64) -> bool {
    (*w - 1.0).abs() < f64::EPSILON
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One weighted, optionally required, attribute constraint.
///
/// A passing rule contributes `weight` to the candidate's score. A failing
/// `required` rule disqualifies the candidate outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Free-form identifier, only used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attribute: String,
    pub constraint: Constraint,
    #[serde(default = "default_weight", skip_serializing_if = "is_default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

impl Rule {
    /// A rule with weight 1 that is not required.
    pub fn new(attribute: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            id: None,
            attribute: attribute.into(),
            constraint,
            weight: 1.0,
            required: false,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Load-time validation: attribute name, weight and constraint operands.
    pub fn validate(&self) -> Result<(), String> {
        if self.attribute.trim().is_empty() {
            return Err("attribute name must not be empty".into());
        }
        if !self.weight.is_finite() {
            return Err(format!("weight must be finite, got {}", self.weight));
        }
        if self.weight < 0.0 {
            return Err(format!("weight must not be negative, got {}", self.weight));
        }
        self.constraint.validate().map_err(|e| e.to_string())
    }
}

/// Inclusive numeric bounds. At least one bound must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<AttributeValue>,
}

/// A regular expression constraint. The pattern is compiled on first use
/// and reused by every later evaluation of the same rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegexPattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub case_insensitive: bool,
    #[serde(skip)]
    compiled: OnceLock<Regex>,
}

impl RegexPattern {
    pub fn new(pattern: impl Into<String>, case_insensitive: bool) -> Self {
        Self {
            pattern: pattern.into(),
            case_insensitive,
            compiled: OnceLock::new(),
        }
    }

    /// The compiled expression, built once per pattern.
    pub fn compiled(&self) -> Result<&Regex, regex::Error> {
        if let Some(regex) = self.compiled.get() {
            return Ok(regex);
        }
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.case_insensitive)
            .build()?;
        Ok(self.compiled.get_or_init(|| regex))
    }

    pub(crate) fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.case_insensitive == other.case_insensitive
    }
}

/// The comparison a rule applies to its resolved attribute value.
///
/// Serialized externally tagged, one key per constraint:
/// `{"equals": "MR"}` or `{"equals": {"value": "MR"}}`. Unknown tags are
/// rejected when the document is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    /// Exact equality. Text comparison is case-sensitive.
    Equals(AttributeValue),
    #[serde(alias = "notEquals")]
    DoesNotEqual(AttributeValue),
    /// Membership for list values, substring for text values. A list
    /// operand passes if any of its elements is contained.
    Contains(AttributeValue),
    /// Case-insensitive [`Constraint::Contains`].
    #[serde(rename = "containsI")]
    ContainsI(AttributeValue),
    DoesNotContain(AttributeValue),
    StartsWith(AttributeValue),
    EndsWith(AttributeValue),
    GreaterThan(AttributeValue),
    GreaterThanOrEqualTo(AttributeValue),
    LessThan(AttributeValue),
    LessThanOrEqualTo(AttributeValue),
    /// Inclusive numeric range.
    Range(RangeBounds),
    Regex(RegexPattern),
}

impl Constraint {
    pub fn equals(value: impl Into<AttributeValue>) -> Self {
        Constraint::Equals(value.into())
    }

    pub fn contains(value: impl Into<AttributeValue>) -> Self {
        Constraint::Contains(value.into())
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Constraint::Range(RangeBounds {
            min: min.map(AttributeValue::Number),
            max: max.map(AttributeValue::Number),
        })
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Constraint::Regex(RegexPattern::new(pattern, false))
    }

    /// The tag this constraint is written with.
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Equals(_) => "equals",
            Constraint::DoesNotEqual(_) => "doesNotEqual",
            Constraint::Contains(_) => "contains",
            Constraint::ContainsI(_) => "containsI",
            Constraint::DoesNotContain(_) => "doesNotContain",
            Constraint::StartsWith(_) => "startsWith",
            Constraint::EndsWith(_) => "endsWith",
            Constraint::GreaterThan(_) => "greaterThan",
            Constraint::GreaterThanOrEqualTo(_) => "greaterThanOrEqualTo",
            Constraint::LessThan(_) => "lessThan",
            Constraint::LessThanOrEqualTo(_) => "lessThanOrEqualTo",
            Constraint::Range(_) => "range",
            Constraint::Regex(_) => "regex",
        }
    }

    pub(crate) fn malformed(&self, reason: impl Into<String>) -> MatchError {
        MatchError::MalformedConstraint {
            constraint: self.name(),
            reason: reason.into(),
        }
    }

    /// Unwraps `{"value": x}` operands and rejects missing ones.
    pub(crate) fn operand<'a>(&self, raw: &'a AttributeValue) -> Result<&'a AttributeValue, MatchError> {
        match raw {
            AttributeValue::Object(map) => match map.get("value") {
                Some(v) if !v.is_null() && map.len() == 1 => Ok(v),
                _ => Err(self.malformed("object operand must be {\"value\": ...}")),
            },
            AttributeValue::Null => Err(self.malformed("missing operand")),
            other => Ok(other),
        }
    }

    /// Operand of a text-only constraint.
    pub(crate) fn text_operand<'a>(&self, raw: &'a AttributeValue) -> Result<&'a str, MatchError> {
        self.operand(raw)?
            .as_str()
            .ok_or_else(|| self.malformed("operand must be text"))
    }

    pub(crate) fn numeric_operand(&self, raw: &AttributeValue) -> Result<f64, MatchError> {
        self.operand(raw)?
            .as_f64()
            .ok_or_else(|| self.malformed("operand must be numeric"))
    }

    /// Resolved `(min, max)` bounds of a range constraint.
    pub(crate) fn bounds(&self, bounds: &RangeBounds) -> Result<(Option<f64>, Option<f64>), MatchError> {
        let min = bounds
            .min
            .as_ref()
            .map(|v| self.numeric_operand(v))
            .transpose()?;
        let max = bounds
            .max
            .as_ref()
            .map(|v| self.numeric_operand(v))
            .transpose()?;
        match (min, max) {
            (None, None) => Err(self.malformed("range needs at least one of min or max")),
            (Some(lo), Some(hi)) if lo > hi => Err(self.malformed(format!("min {lo} exceeds max {hi}"))),
            bounds => Ok(bounds),
        }
    }

    /// Checks the operands without evaluating anything.
    pub fn validate(&self) -> Result<(), MatchError> {
        match self {
            Constraint::Equals(v)
            | Constraint::DoesNotEqual(v)
            | Constraint::Contains(v)
            | Constraint::ContainsI(v)
            | Constraint::DoesNotContain(v) => self.operand(v).map(|_| ()),
            Constraint::StartsWith(v) | Constraint::EndsWith(v) => self.text_operand(v).map(|_| ()),
            Constraint::GreaterThan(v)
            | Constraint::GreaterThanOrEqualTo(v)
            | Constraint::LessThan(v)
            | Constraint::LessThanOrEqualTo(v) => self.numeric_operand(v).map(|_| ()),
            Constraint::Range(bounds) => self.bounds(bounds).map(|_| ()),
            Constraint::Regex(re) => re
                .compiled()
                .map(|_| ())
                .map_err(|e| self.malformed(e.to_string())),
        }
    }
}
