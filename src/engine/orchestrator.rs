//! Protocol engine: selection, stage navigation and the cached assignment.

use std::collections::BTreeMap;

use super::config::EngineConfig;
use crate::assign::{ViewportAssigner, ViewportAssignment};
use crate::attribute::{AttributeRegistry, AttributeValue, MatchContext, UrlParams};
use crate::error::EngineError;
use crate::protocol::{validate_library, warn_unknown_attributes, Protocol, Stage};
use crate::rule::MatchResult;
use crate::selection::ProtocolSelector;
use crate::stage::{StageStatus, StageWalker};
use crate::study::Study;

/// Per-session hanging protocol state.
///
/// Holds the study snapshot, the protocol library, a private copy of the
/// current protocol, the stage position and the last computed viewport
/// assignment. Every state-changing call that can affect the assignment
/// recomputes it and replaces the cached value; navigation that does not
/// move leaves the cache alone.
///
/// # Examples
///
/// ```
/// use hanging_protocol::engine::ProtocolEngine;
/// use hanging_protocol::protocol::load_library;
/// use hanging_protocol::study::{Instance, Series, Study};
///
/// let library = load_library(r#"[{
///     "id": "mr",
///     "name": "MR",
///     "studyMatchingRules": [{"attribute": "modality", "constraint": {"equals": "MR"}, "required": true}],
///     "stages": [{
///         "name": "axial",
///         "viewportStructure": {"layoutType": "grid", "properties": {"rows": 1, "columns": 1}},
///         "viewports": [{"seriesMatchingRules": [
///             {"attribute": "seriesDescription", "constraint": {"contains": "AXIAL"}}
///         ]}]
///     }]
/// }]"#).unwrap();
///
/// let study = Study::new("1.2.3").with_attribute("Modality", "MR").with_series(
///     Series::new("1.2.3.1")
///         .with_attribute("SeriesDescription", "AXIAL T2")
///         .with_instances(vec![Instance::new("1.2.3.1.1").with_attribute("Rows", 256)]),
/// );
///
/// let mut engine = ProtocolEngine::default();
/// engine.set_protocol_library(library).unwrap();
/// engine.set_study(study);
///
/// assert_eq!(engine.current_protocol().id, "mr");
/// assert_eq!(engine.viewport_assignment().get(0).map(<[String]>::len), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    registry: AttributeRegistry,
    config: EngineConfig,
    library: Vec<Protocol>,
    study: Study,
    url_params: UrlParams,
    current: Protocol,
    current_index: Option<usize>,
    current_result: MatchResult,
    walker: StageWalker,
    assignment: ViewportAssignment,
    recomputations: usize,
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::build(AttributeRegistry::with_builtins(), EngineConfig::default())
    }
}

impl ProtocolEngine {
    /// Creates an engine with the built-in attributes.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_registry(AttributeRegistry::with_builtins(), config)
    }

    /// Creates an engine resolving attributes through `registry`.
    pub fn with_registry(registry: AttributeRegistry, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: AttributeRegistry, config: EngineConfig) -> Self {
        let current = config.default_protocol.clone();
        let mut engine = Self {
            walker: StageWalker::new(current.stages.len()),
            registry,
            config,
            library: Vec::new(),
            study: Study::default(),
            url_params: UrlParams::default(),
            current,
            current_index: None,
            current_result: MatchResult::default(),
            assignment: ViewportAssignment::default(),
            recomputations: 0,
        };
        engine.select_protocol();
        engine
    }

    // ---- inputs ----

    /// Replaces the study and selects a protocol for it from scratch.
    pub fn set_study(&mut self, study: Study) {
        log::trace!(
            "ProtocolEngine::set_study `{}` ({} series)",
            study.study_instance_uid,
            study.series.len()
        );
        self.study = study;
        self.select_protocol();
    }

    /// Validates and installs a protocol library, then reselects.
    ///
    /// On error the previous library stays in place.
    pub fn set_protocol_library(&mut self, protocols: Vec<Protocol>) -> Result<(), EngineError> {
        validate_library(&protocols)?;
        warn_unknown_attributes(&protocols, &self.registry);
        log::trace!("ProtocolEngine::set_protocol_library {} protocol(s)", protocols.len());
        self.library = protocols;
        self.select_protocol();
        Ok(())
    }

    /// Replaces the URL selection parameters and recomputes the current
    /// stage's assignment. The protocol and stage are kept.
    pub fn set_url_params(&mut self, params: UrlParams) {
        log::trace!("ProtocolEngine::set_url_params {params:?}");
        self.url_params = params;
        self.recompute();
    }

    /// Forces the protocol with `id`, bypassing selection.
    pub fn set_protocol(&mut self, id: &str) -> Result<(), EngineError> {
        let (protocol, index) = match self.library.iter().position(|p| p.id == id) {
            Some(i) => (self.library[i].clone(), Some(i)),
            None if self.config.default_protocol.id == id => (self.config.default_protocol.clone(), None),
            None => return Err(EngineError::UnknownProtocol { id: id.to_string() }),
        };
        log::trace!("ProtocolEngine::set_protocol `{id}`");
        self.install(protocol, index, MatchResult::default());
        Ok(())
    }

    // ---- protocol ----

    pub fn current_protocol(&self) -> &Protocol {
        &self.current
    }

    /// Whether the current protocol is the fallback rather than a library
    /// protocol.
    pub fn is_default_protocol(&self) -> bool {
        self.current_index.is_none()
    }

    /// Study-level match details of the current protocol.
    pub fn protocol_match(&self) -> &MatchResult {
        &self.current_result
    }

    // ---- stages ----

    pub fn num_stages(&self) -> usize {
        self.walker.count()
    }

    pub fn current_stage_index(&self) -> usize {
        self.walker.current()
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.current.stages.get(self.walker.current())
    }

    pub fn has_next_stage(&self) -> bool {
        self.walker.has_next()
    }

    pub fn has_previous_stage(&self) -> bool {
        self.walker.has_previous()
    }

    /// Advances one stage. Returns `false`, without recomputing, at the
    /// last stage.
    pub fn next_stage(&mut self) -> bool {
        let moved = self.walker.next();
        if moved {
            log::trace!("ProtocolEngine::next_stage -> {}", self.walker.current());
            self.recompute();
        }
        moved
    }

    /// Steps back one stage. Returns `false`, without recomputing, at
    /// stage 0.
    pub fn previous_stage(&mut self) -> bool {
        let moved = self.walker.previous();
        if moved {
            log::trace!("ProtocolEngine::previous_stage -> {}", self.walker.current());
            self.recompute();
        }
        moved
    }

    /// Jumps to stage `index`. Out of range or current is a no-op.
    pub fn set_stage(&mut self, index: usize) -> bool {
        let moved = self.walker.jump_to(index);
        if moved {
            log::trace!("ProtocolEngine::set_stage -> {index}");
            self.recompute();
        }
        moved
    }

    /// Status of every stage of the current protocol, from how many of its
    /// viewports the study can fill. The cached assignment is untouched.
    pub fn stage_statuses(&self) -> Vec<StageStatus> {
        let ctx = MatchContext::new(Some(&self.study), &self.url_params);
        let assigner = self.assigner();
        self.current
            .stages
            .iter()
            .map(|stage| {
                let filled = assigner.assign(stage, &self.study, &ctx).filled_count();
                StageStatus::classify(stage.stage_activation.as_ref(), filled)
            })
            .collect()
    }

    // ---- assignment ----

    /// The cached assignment for the current stage.
    pub fn viewport_assignment(&self) -> &ViewportAssignment {
        &self.assignment
    }

    /// How many times the assignment has been computed.
    pub fn assignment_count(&self) -> usize {
        self.recomputations
    }

    /// Merges `settings` into the viewport settings of slot
    /// `viewport_index` of the current stage.
    ///
    /// Only the engine's copy of the protocol changes; the library entry
    /// stays as loaded.
    pub fn update_viewport_settings(
        &mut self,
        viewport_index: usize,
        settings: BTreeMap<String, AttributeValue>,
    ) -> Result<(), EngineError> {
        if self.current.locked {
            return Err(EngineError::ProtocolLocked {
                id: self.current.id.clone(),
            });
        }
        let stage_index = self.walker.current();
        let Some(stage) = self.current.stages.get_mut(stage_index) else {
            return Err(EngineError::ViewportOutOfRange {
                index: viewport_index,
                count: 0,
            });
        };
        let count = stage.viewports.len();
        let viewport = stage
            .viewports
            .get_mut(viewport_index)
            .ok_or(EngineError::ViewportOutOfRange {
                index: viewport_index,
                count,
            })?;
        log::trace!(
            "ProtocolEngine::update_viewport_settings stage {stage_index} viewport {viewport_index}: {} key(s)",
            settings.len()
        );
        viewport.viewport_settings.extend(settings);
        Ok(())
    }

    // ---- accessors ----

    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn library(&self) -> &[Protocol] {
        &self.library
    }

    pub fn url_params(&self) -> &UrlParams {
        &self.url_params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    // ---- internals ----

    fn assigner(&self) -> ViewportAssigner<'_> {
        ViewportAssigner::new(&self.registry)
            .with_ranker(self.config.ranker())
            .with_policy(self.config.assignment_policy)
            .with_parallel(self.config.parallel)
    }

    fn select_protocol(&mut self) {
        let (protocol, index, result) = {
            let ctx = MatchContext::new(Some(&self.study), &self.url_params);
            let chosen = ProtocolSelector::new(&self.registry)
                .with_ranker(self.config.ranker())
                .with_parallel(self.config.parallel)
                .select(&self.library, &self.config.default_protocol, &self.study, &ctx);
            (chosen.protocol.clone(), chosen.index, chosen.result)
        };
        self.install(protocol, index, result);
    }

    /// Makes `protocol` current at stage 0 and recomputes.
    fn install(&mut self, protocol: Protocol, index: Option<usize>, result: MatchResult) {
        self.walker.reset(protocol.stages.len());
        self.current = protocol;
        self.current_index = index;
        self.current_result = result;
        self.recompute();
    }

    fn recompute(&mut self) {
        let ctx = MatchContext::new(Some(&self.study), &self.url_params);
        let assignment = match self.current_stage() {
            Some(stage) => self.assigner().assign(stage, &self.study, &ctx),
            None => ViewportAssignment::default(),
        };
        self.assignment = assignment;
        self.recomputations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::AssignmentPolicy;
    use crate::protocol::{load_library, Viewport, ViewportStructure};
    use crate::rule::{Constraint, Rule};
    use crate::study::{Instance, Series};

    fn series(uid: &str, description: &str) -> Series {
        Series::new(uid)
            .with_attribute("SeriesDescription", description)
            .with_instances(vec![Instance::new(format!("{uid}.1")).with_attribute("Rows", 256)])
    }

    fn mr_study() -> Study {
        Study::new("1")
            .with_attribute("Modality", "MR")
            .with_series(series("S1", "AXIAL T2"))
            .with_series(series("S2", "SAGITTAL T1"))
    }

    fn two_stage(id: &str) -> Protocol {
        let axial = Viewport::new()
            .with_series_rule(Rule::new("seriesDescription", Constraint::contains("AXIAL")).with_weight(2.0));
        let sagittal = Viewport::new()
            .with_series_rule(Rule::new("seriesDescription", Constraint::contains("SAGITTAL")).required());
        let mut p = Protocol::new(id, id)
            .with_stage(Stage::new("axial", ViewportStructure::grid(1, 1)).with_viewport(axial))
            .with_stage(Stage::new("sagittal", ViewportStructure::grid(1, 1)).with_viewport(sagittal));
        p.study_matching_rules
            .push(Rule::new("modality", Constraint::equals("MR")).required());
        p
    }

    fn engine_with(library: Vec<Protocol>, study: Study) -> ProtocolEngine {
        let mut engine = ProtocolEngine::default();
        engine.set_protocol_library(library).unwrap();
        engine.set_study(study);
        engine
    }

    #[test]
    fn test_starts_on_default_protocol() {
        let engine = ProtocolEngine::default();
        assert!(engine.is_default_protocol());
        assert_eq!(engine.current_protocol().id, "default");
        assert_eq!(engine.num_stages(), 1);
        assert_eq!(engine.viewport_assignment().len(), 1);
        assert_eq!(engine.viewport_assignment().filled_count(), 0);
    }

    #[test]
    fn test_selects_gated_protocol() {
        let mut p1 = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::equals("MR")).required());
        p1.id = "P1".into();
        let mut p2 = Protocol::default_protocol();
        p2.id = "P2".into();

        let study = Study::new("1").with_attribute("Modality", "CT");
        let engine = engine_with(vec![p1, p2], study);
        assert_eq!(engine.current_protocol().id, "P2");
        assert!(!engine.is_default_protocol());
    }

    #[test]
    fn test_stage_navigation_boundaries() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        assert_eq!(engine.num_stages(), 2);
        assert_eq!(engine.viewport_assignment().get(0), Some(&["S1.ds0".to_string()][..]));

        let count = engine.assignment_count();
        assert!(!engine.previous_stage());
        assert_eq!(engine.current_stage_index(), 0);
        assert_eq!(engine.assignment_count(), count);

        assert!(engine.next_stage());
        assert_eq!(engine.assignment_count(), count + 1);
        let before = engine.viewport_assignment().clone();
        assert_eq!(before.get(0), Some(&["S2.ds0".to_string()][..]));

        assert!(!engine.next_stage());
        assert_eq!(engine.viewport_assignment(), &before);
        assert_eq!(engine.assignment_count(), count + 1);
        assert!(!engine.has_next_stage());
        assert!(engine.has_previous_stage());
    }

    #[test]
    fn test_set_study_is_idempotent() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        let first = engine.viewport_assignment().clone();
        engine.set_study(mr_study());
        assert_eq!(engine.viewport_assignment(), &first);
    }

    #[test]
    fn test_set_study_resets_stage() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        assert!(engine.next_stage());
        engine.set_study(mr_study());
        assert_eq!(engine.current_stage_index(), 0);
    }

    #[test]
    fn test_invalid_library_is_rejected() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        let err = engine
            .set_protocol_library(vec![Protocol::new("broken", "Broken")])
            .unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
        assert_eq!(engine.library().len(), 1);
        assert_eq!(engine.current_protocol().id, "mr");
    }

    #[test]
    fn test_set_protocol() {
        let mut engine = engine_with(vec![two_stage("a"), two_stage("b")], mr_study());
        assert_eq!(engine.current_protocol().id, "a");
        engine.next_stage();
        engine.set_protocol("b").unwrap();
        assert_eq!(engine.current_protocol().id, "b");
        assert_eq!(engine.current_stage_index(), 0);
        assert!(matches!(
            engine.set_protocol("missing"),
            Err(EngineError::UnknownProtocol { .. })
        ));
        engine.set_protocol("default").unwrap();
        assert!(engine.is_default_protocol());
    }

    #[test]
    fn test_set_stage() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        assert!(engine.set_stage(1));
        assert!(!engine.set_stage(1));
        assert!(!engine.set_stage(5));
        assert_eq!(engine.current_stage_index(), 1);
        assert_eq!(engine.current_stage().map(|s| s.name.as_str()), Some("sagittal"));
    }

    #[test]
    fn test_url_params_drive_selection() {
        let rule = Rule::new("isDisplaySetFromUrl", Constraint::equals(true)).with_weight(10.0);
        let protocol = Protocol::new("url", "URL").with_stage(
            Stage::new("s", ViewportStructure::grid(1, 1)).with_viewport(Viewport::new().with_series_rule(rule)),
        );
        let mut engine = engine_with(vec![protocol], mr_study());
        assert_eq!(engine.viewport_assignment().get(0), Some(&["S1.ds0".to_string()][..]));

        engine.set_url_params(UrlParams::new().with_series("S2"));
        assert_eq!(engine.viewport_assignment().get(0), Some(&["S2.ds0".to_string()][..]));
    }

    #[test]
    fn test_stage_statuses() {
        let mut protocol = two_stage("mr");
        protocol.stages[1].viewports[0] = Viewport::new()
            .with_series_rule(Rule::new("seriesDescription", Constraint::contains("CORONAL")).required());
        let engine = engine_with(vec![protocol], mr_study());
        assert_eq!(
            engine.stage_statuses(),
            vec![StageStatus::Enabled, StageStatus::Passive]
        );
    }

    #[test]
    fn test_update_viewport_settings_uses_copy() {
        let mut engine = engine_with(vec![two_stage("mr")], mr_study());
        let settings = BTreeMap::from([("voi".to_string(), AttributeValue::from("brain"))]);
        engine.update_viewport_settings(0, settings.clone()).unwrap();
        assert_eq!(
            engine.current_protocol().stages[0].viewports[0].viewport_settings.get("voi"),
            Some(&AttributeValue::from("brain"))
        );
        assert!(engine.library()[0].stages[0].viewports[0].viewport_settings.is_empty());

        assert!(matches!(
            engine.update_viewport_settings(3, settings.clone()),
            Err(EngineError::ViewportOutOfRange { index: 3, count: 1 })
        ));

        let locked = two_stage("locked").locked();
        let mut engine = engine_with(vec![locked], mr_study());
        assert!(matches!(
            engine.update_viewport_settings(0, settings),
            Err(EngineError::ProtocolLocked { .. })
        ));
    }

    #[test]
    fn test_exclusive_policy_from_config() {
        let viewport = || {
            Viewport::new().with_series_rule(Rule::new("seriesDescription", Constraint::contains("T")))
        };
        let protocol = Protocol::new("two", "Two").with_stage(
            Stage::new("s", ViewportStructure::grid(1, 2))
                .with_viewport(viewport())
                .with_viewport(viewport()),
        );
        let config = EngineConfig::default().with_assignment_policy(AssignmentPolicy::Exclusive);
        let mut engine = ProtocolEngine::new(config).unwrap();
        engine.set_protocol_library(vec![protocol]).unwrap();
        engine.set_study(mr_study());
        let assignment = engine.viewport_assignment();
        assert_eq!(assignment.get(0), Some(&["S1.ds0".to_string()][..]));
        assert_eq!(assignment.get(1), Some(&["S2.ds0".to_string()][..]));
    }

    #[test]
    fn test_invalid_config() {
        let err = ProtocolEngine::new(EngineConfig::default().with_epsilon(-1.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_library_from_json() {
        let library = load_library(
            r#"[{"id": "j", "stages": [{"viewportStructure": {}, "viewports": [{}]}]}]"#,
        )
        .unwrap();
        let engine = engine_with(library, mr_study());
        assert_eq!(engine.current_protocol().id, "j");
        assert_eq!(engine.viewport_assignment().filled_count(), 1);
    }
}
