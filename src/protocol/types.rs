//! Protocol document data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::rule::Rule;

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// A named, ordered collection of stages plus study-level matching rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub stages: Vec<Stage>,
    #[serde(default, alias = "protocolMatchingRules")]
    pub study_matching_rules: Vec<Rule>,
    /// A locked protocol refuses per-session customization.
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
}

impl Protocol {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            stages: Vec::new(),
            study_matching_rules: Vec::new(),
            locked: false,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.study_matching_rules.push(rule);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Every rule in the document: study rules first, then each viewport's
    /// series and image rules in stage and slot order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.study_matching_rules.iter().chain(self.stages.iter().flat_map(|stage| {
            stage.viewports.iter().flat_map(|vp| {
                vp.series_matching_rules
                    .iter()
                    .chain(vp.image_matching_rules.iter().flatten())
            })
        }))
    }
}

/// One layout configuration within a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub viewport_structure: ViewportStructure,
    #[serde(default)]
    pub viewports: Vec<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_activation: Option<StageActivation>,
}

impl Stage {
    pub fn new(name: impl Into<String>, viewport_structure: ViewportStructure) -> Self {
        Self {
            id: None,
            name: name.into(),
            viewport_structure,
            viewports: Vec::new(),
            stage_activation: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewports.push(viewport);
        self
    }

    pub fn with_activation(mut self, activation: StageActivation) -> Self {
        self.stage_activation = Some(activation);
        self
    }
}

/// Topology of a stage's viewport slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportStructure {
    /// `grid` or a custom layout name understood by the renderer.
    #[serde(default = "default_layout_type")]
    pub layout_type: String,
    #[serde(default)]
    pub properties: LayoutProperties,
}

fn default_layout_type() -> String {
    "grid".to_string()
}

impl ViewportStructure {
    pub fn grid(rows: usize, columns: usize) -> Self {
        Self {
            layout_type: default_layout_type(),
            properties: LayoutProperties {
                rows,
                columns,
                layout_options: Vec::new(),
            },
        }
    }

    /// Number of slots: explicit layout options when present, otherwise
    /// `rows * columns`.
    pub fn slot_count(&self) -> usize {
        let props = &self.properties;
        if props.layout_options.is_empty() {
            props.rows.saturating_mul(props.columns)
        } else {
            props.layout_options.len()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutProperties {
    #[serde(default = "one")]
    pub rows: usize,
    #[serde(default = "one")]
    pub columns: usize,
    /// Free-form slot rectangles, in slot order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout_options: Vec<LayoutOption>,
}

fn one() -> usize {
    1
}

impl Default for LayoutProperties {
    fn default() -> Self {
        Self {
            rows: 1,
            columns: 1,
            layout_options: Vec::new(),
        }
    }
}

/// A slot rectangle in normalized viewer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutOption {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// How many display sets a viewport takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// The best candidate only.
    #[default]
    Single,
    /// Every qualifying candidate.
    Multiple,
}

/// Order of a viewport's candidate display sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewportSort {
    /// Descending image score, declaration order on ties.
    #[default]
    Score,
    /// Ascending `InstanceNumber` of each display set's first image.
    InstanceNumber,
}

/// One declared slot within a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Opaque renderer settings (window level, tools, sync groups).
    #[serde(default)]
    pub viewport_settings: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub series_matching_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_matching_rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub sort: ViewportSort,
    /// Zero-based rank of the series to take: 0 is the best match, 1 the
    /// runner-up, and so on.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub match_index: usize,
    /// Skip display sets already placed in an earlier slot of the stage.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive: bool,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series_rule(mut self, rule: Rule) -> Self {
        self.series_matching_rules.push(rule);
        self
    }

    pub fn with_image_rule(mut self, rule: Rule) -> Self {
        self.image_matching_rules.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_sort(mut self, sort: ViewportSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_match_index(mut self, index: usize) -> Self {
        self.match_index = index;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.viewport_settings.insert(key.into(), value.into());
        self
    }
}

/// Thresholds that classify a stage by how many of its viewports were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageActivation {
    #[serde(default = "ActivationRule::enabled_default")]
    pub enabled: ActivationRule,
    #[serde(default = "ActivationRule::passive_default")]
    pub passive: ActivationRule,
}

impl Default for StageActivation {
    fn default() -> Self {
        Self {
            enabled: ActivationRule::enabled_default(),
            passive: ActivationRule::passive_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRule {
    #[serde(default)]
    pub min_viewports_matched: usize,
}

impl ActivationRule {
    pub fn enabled_default() -> Self {
        Self {
            min_viewports_matched: 1,
        }
    }

    pub fn passive_default() -> Self {
        Self {
            min_viewports_matched: 0,
        }
    }
}
