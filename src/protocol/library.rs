//! Load-time validation and protocol library loading.

use std::collections::BTreeSet;

use super::types::{Protocol, Stage, Viewport, ViewportStructure};
use crate::attribute::AttributeRegistry;
use crate::error::ProtocolError;

/// Id of the built-in fallback protocol.
pub const DEFAULT_PROTOCOL_ID: &str = "default";

impl Protocol {
    /// The fallback protocol: one 1x1 grid stage with a single viewport and
    /// no rules anywhere.
    pub fn default_protocol() -> Self {
        Protocol::new(DEFAULT_PROTOCOL_ID, "Default").with_stage(
            Stage::new("default", ViewportStructure::grid(1, 1)).with_viewport(Viewport::new()),
        )
    }

    /// Parses and validates a single protocol document.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let protocol: Protocol = serde_json::from_str(json)?;
        protocol.validate()?;
        Ok(protocol)
    }

    /// Checks the structural invariants matching relies on.
    ///
    /// A stage may declare fewer viewports than its structure has slots (the
    /// rest stay empty) but never zero viewports, and never more viewports
    /// than slots.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.id.trim().is_empty() {
            return Err(ProtocolError::EmptyId);
        }
        if self.stages.is_empty() {
            return Err(ProtocolError::EmptyStages {
                id: self.id.clone(),
            });
        }

        for (stage_index, stage) in self.stages.iter().enumerate() {
            let slots = stage.viewport_structure.slot_count();
            if slots == 0 {
                return Err(ProtocolError::EmptyViewportStructure {
                    id: self.id.clone(),
                    stage: stage_index,
                });
            }
            if stage.viewports.is_empty() {
                return Err(ProtocolError::NoViewports {
                    id: self.id.clone(),
                    stage: stage_index,
                    slots,
                });
            }
            if stage.viewports.len() > slots {
                return Err(ProtocolError::TooManyViewports {
                    id: self.id.clone(),
                    stage: stage_index,
                    viewports: stage.viewports.len(),
                    slots,
                });
            }
        }

        for rule in self.rules() {
            rule.validate().map_err(|reason| ProtocolError::InvalidRule {
                id: self.id.clone(),
                attribute: rule.attribute.clone(),
                reason,
            })?;
        }

        Ok(())
    }

    /// Rule attributes that are neither registered on `registry` nor
    /// spelled like a DICOM keyword, in document order without repeats.
    pub fn unknown_attributes<'p>(&'p self, registry: &AttributeRegistry) -> Vec<&'p str> {
        let mut seen = BTreeSet::new();
        self.rules()
            .map(|rule| rule.attribute.as_str())
            .filter(|name| !registry.contains(name) && !looks_like_keyword(name))
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// DICOM keywords are UpperCamelCase ASCII words such as `SeriesDescription`.
fn looks_like_keyword(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Validates every protocol and the uniqueness of their ids.
pub fn validate_library(protocols: &[Protocol]) -> Result<(), ProtocolError> {
    let mut ids = BTreeSet::new();
    for protocol in protocols {
        protocol.validate()?;
        if !ids.insert(protocol.id.as_str()) {
            return Err(ProtocolError::DuplicateId {
                id: protocol.id.clone(),
            });
        }
    }
    Ok(())
}

/// Parses a JSON array of protocol documents and validates the library.
pub fn load_library(json: &str) -> Result<Vec<Protocol>, ProtocolError> {
    let protocols: Vec<Protocol> = serde_json::from_str(json)?;
    validate_library(&protocols)?;
    Ok(protocols)
}

/// Logs a warning for every rule attribute the registry cannot resolve by
/// name. Such rules may still match through the keyword fallback.
pub fn warn_unknown_attributes(protocols: &[Protocol], registry: &AttributeRegistry) {
    for protocol in protocols {
        for name in protocol.unknown_attributes(registry) {
            log::warn!(
                "protocol `{}` uses attribute `{name}`, which is not registered and not a DICOM keyword",
                protocol.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Constraint, Rule};

    const LIBRARY: &str = r#"[
        {
            "id": "mr-brain",
            "name": "MR Brain",
            "protocolMatchingRules": [
                {"attribute": "modality", "constraint": {"equals": "MR"}, "required": true}
            ],
            "stages": [{
                "name": "axial",
                "viewportStructure": {"layoutType": "grid", "properties": {"rows": 1, "columns": 2}},
                "viewports": [
                    {"seriesMatchingRules": [
                        {"attribute": "seriesDescription", "constraint": {"contains": {"value": "AXIAL"}}, "weight": 2}
                    ]},
                    {"seriesMatchingRules": [], "matchIndex": 1}
                ],
                "stageActivation": {"enabled": {"minViewportsMatched": 2}}
            }]
        },
        {
            "id": "ct",
            "name": "CT",
            "locked": true,
            "stages": [{
                "name": "one",
                "viewportStructure": {"properties": {"rows": 1, "columns": 1}},
                "viewports": [{"imageMatchingRules": [
                    {"attribute": "instanceNumber", "constraint": {"range": {"min": 1, "max": 10}}}
                ], "matchMode": "multiple", "sort": "instanceNumber"}]
            }]
        }
    ]"#;

    #[test]
    fn test_load_library() {
        let library = load_library(LIBRARY).unwrap();
        assert_eq!(library.len(), 2);

        let mr = &library[0];
        assert_eq!(mr.study_matching_rules.len(), 1);
        assert!(mr.study_matching_rules[0].required);
        let stage = &mr.stages[0];
        assert_eq!(stage.viewport_structure.slot_count(), 2);
        assert_eq!(stage.viewports[1].match_index, 1);
        let activation = stage.stage_activation.unwrap();
        assert_eq!(activation.enabled.min_viewports_matched, 2);
        assert_eq!(activation.passive.min_viewports_matched, 0);

        let ct = &library[1];
        assert!(ct.locked);
        assert_eq!(ct.stages[0].viewport_structure.layout_type, "grid");
        let vp = &ct.stages[0].viewports[0];
        assert_eq!(vp.match_mode, crate::protocol::MatchMode::Multiple);
        assert_eq!(vp.sort, crate::protocol::ViewportSort::InstanceNumber);
        assert_eq!(vp.image_matching_rules.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_unknown_constraint_rejected_at_load() {
        let json = r#"[{"id": "x", "stages": [{"viewportStructure": {}, "viewports": [{}]}],
            "studyMatchingRules": [{"attribute": "modality", "constraint": {"soundsLike": "MR"}}]}]"#;
        assert!(matches!(load_library(json), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_duplicate_ids() {
        let p = Protocol::default_protocol();
        let err = validate_library(&[p.clone(), p]).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateId { id } if id == "default"));
    }

    #[test]
    fn test_default_protocol_is_valid() {
        let p = Protocol::default_protocol();
        assert!(p.validate().is_ok());
        assert_eq!(p.stages.len(), 1);
        assert_eq!(p.stages[0].viewports.len(), 1);
        assert!(p.rules().next().is_none());
    }

    #[test]
    fn test_validate_structure() {
        assert!(matches!(
            Protocol::new("", "x").validate(),
            Err(ProtocolError::EmptyId)
        ));
        assert!(matches!(
            Protocol::new("p", "x").validate(),
            Err(ProtocolError::EmptyStages { .. })
        ));

        let no_viewports = Protocol::new("p", "x").with_stage(Stage::new("s", ViewportStructure::grid(2, 2)));
        assert!(matches!(
            no_viewports.validate(),
            Err(ProtocolError::NoViewports { stage: 0, slots: 4, .. })
        ));

        let empty_grid = Protocol::new("p", "x")
            .with_stage(Stage::new("s", ViewportStructure::grid(0, 2)).with_viewport(Viewport::new()));
        assert!(matches!(
            empty_grid.validate(),
            Err(ProtocolError::EmptyViewportStructure { .. })
        ));

        let too_many = Protocol::new("p", "x").with_stage(
            Stage::new("s", ViewportStructure::grid(1, 1))
                .with_viewport(Viewport::new())
                .with_viewport(Viewport::new()),
        );
        assert!(matches!(
            too_many.validate(),
            Err(ProtocolError::TooManyViewports { viewports: 2, slots: 1, .. })
        ));

        // Fewer viewports than slots is allowed.
        let partial = Protocol::new("p", "x")
            .with_stage(Stage::new("s", ViewportStructure::grid(2, 2)).with_viewport(Viewport::new()));
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_validate_rules() {
        let p = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::range(Some(5.0), Some(1.0))));
        assert!(matches!(
            p.validate(),
            Err(ProtocolError::InvalidRule { attribute, .. }) if attribute == "modality"
        ));
    }

    #[test]
    fn test_unknown_attributes() {
        let registry = AttributeRegistry::with_builtins();
        let p = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::equals("MR")))
            .with_rule(Rule::new("SliceThickness", Constraint::equals(5.0)))
            .with_rule(Rule::new("fancyThing", Constraint::equals(1.0)))
            .with_rule(Rule::new("fancyThing", Constraint::equals(2.0)));
        assert_eq!(p.unknown_attributes(&registry), vec!["fancyThing"]);
    }

    #[test]
    fn test_protocol_round_trips_through_json() {
        let library = load_library(LIBRARY).unwrap();
        let json = serde_json::to_string(&library).unwrap();
        assert_eq!(load_library(&json).unwrap(), library);
    }
}
