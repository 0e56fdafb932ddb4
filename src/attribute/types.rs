//! Attribute values, matching targets and the read-only matching context.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::url_params::UrlParams;
use crate::study::{Instance, Series, Study};

/// Metadata keyword to value map carried by studies, series and instances.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// A dynamically typed attribute value, shaped like the JSON it comes from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<AttributeValue>),
    Object(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of the value. DICOM IS/DS values arrive as strings, so
    /// text that parses as a number counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Field lookup on an object value.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            AttributeValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// First element of a list, or the value itself for scalars.
    pub fn first(&self) -> Option<&AttributeValue> {
        match self {
            AttributeValue::List(items) => items.first(),
            AttributeValue::Null => None,
            other => Some(other),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => write!(f, "{s}"),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AttributeValue::Object(map) => write!(f, "{{{} field(s)}}", map.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        AttributeValue::Number(f64::from(n))
    }
}

impl From<usize> for AttributeValue {
    fn from(n: usize) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(items: Vec<T>) -> Self {
        AttributeValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or(AttributeValue::Null),
            serde_json::Value::String(s) => AttributeValue::Text(s),
            serde_json::Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// The level of metadata a target represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Study,
    Series,
    Image,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Study => "study",
            TargetKind::Series => "series",
            TargetKind::Image => "image",
        };
        f.write_str(name)
    }
}

/// A metadata object a rule is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Study(&'a Study),
    Series(&'a Series),
    Image(&'a Instance),
}

impl<'a> Target<'a> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Study(_) => TargetKind::Study,
            Target::Series(_) => TargetKind::Series,
            Target::Image(_) => TargetKind::Image,
        }
    }

    /// Reads a DICOM keyword from the target's own metadata, falling back to
    /// its first image the way the viewer reads "representative" tags.
    pub fn tag(&self, keyword: &str) -> Option<&'a AttributeValue> {
        match *self {
            Target::Study(study) => study
                .metadata
                .get(keyword)
                .or_else(|| study.first_instance().and_then(|i| i.tag(keyword))),
            Target::Series(series) => series
                .metadata
                .get(keyword)
                .or_else(|| series.first_instance().and_then(|i| i.tag(keyword))),
            Target::Image(instance) => instance.tag(keyword),
        }
    }
}

/// Read-only inputs shared by every extractor during one matching pass.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// The study being matched. Series and image extractors use it for
    /// study-wide counts.
    pub study: Option<&'a Study>,
    /// Initial-selection parameters from the viewer URL.
    pub url_params: &'a UrlParams,
}

impl<'a> MatchContext<'a> {
    pub fn new(study: Option<&'a Study>, url_params: &'a UrlParams) -> Self {
        Self { study, url_params }
    }
}
