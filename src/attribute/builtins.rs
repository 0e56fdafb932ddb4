//! Built-in attributes.
//!
//! Plain names (`modality`, `seriesDescription`, ...) read the matching DICOM
//! keyword. The custom attributes compute values the metadata does not hold
//! directly: study-wide counts, URL-driven initial selection and mammography
//! laterality/view detection.

use std::collections::BTreeSet;

use super::registry::{AttributeExtractor, AttributeRegistry, FnExtractor};
use super::types::{AttributeValue, MatchContext, Target, TargetKind};
use crate::error::MatchError;
use crate::study::{Instance, Series, Study};

/// Registers every built-in attribute on `registry`.
pub fn register_all(registry: &mut AttributeRegistry) {
    for (name, keyword) in [
        ("seriesDescription", "SeriesDescription"),
        ("studyDescription", "StudyDescription"),
        ("bodyPartExamined", "BodyPartExamined"),
        ("seriesNumber", "SeriesNumber"),
        ("instanceNumber", "InstanceNumber"),
        ("patientId", "PatientID"),
    ] {
        registry.register(keyword_alias(name, keyword));
    }

    registry.register(FnExtractor::new("modality", |target, _| {
        Ok(modality(target))
    }));

    registry.register(
        FnExtractor::new("instanceCount", |target, _| match *target {
            Target::Study(study) => Ok(study.series.iter().map(instance_count).sum::<usize>().into()),
            Target::Series(series) => Ok(instance_count(series).into()),
            Target::Image(_) => unreachable_kind("instanceCount", TargetKind::Image),
        })
        .for_kinds(&[TargetKind::Study, TargetKind::Series]),
    );

    registry.register(FnExtractor::new(
        "numberOfDisplaySetsWithImages",
        |target, ctx| {
            let study = match *target {
                Target::Study(study) => Some(study),
                _ => ctx.study,
            };
            Ok(study.map_or(0, number_of_display_sets_with_images).into())
        },
    ));

    registry.register(
        FnExtractor::new("isDisplaySetFromUrl", |target, ctx| match *target {
            Target::Series(series) => Ok(is_series_from_url(series, ctx).into()),
            Target::Image(instance) => Ok(is_instance_from_url(instance, ctx).into()),
            Target::Study(_) => unreachable_kind("isDisplaySetFromUrl", TargetKind::Study),
        })
        .for_kinds(&[TargetKind::Series, TargetKind::Image]),
    );

    registry.register(
        FnExtractor::new("NumberOfStudyRelatedSeries", |target, _| match *target {
            Target::Study(study) => Ok(study
                .metadata
                .get("NumberOfStudyRelatedSeries")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| study.series.len().into())),
            _ => unreachable_kind("NumberOfStudyRelatedSeries", target.kind()),
        })
        .for_kinds(&[TargetKind::Study]),
    );

    registry.register(
        FnExtractor::new("NumberOfSeriesRelatedInstances", |target, _| match *target {
            Target::Series(series) => Ok(instance_count(series).into()),
            _ => unreachable_kind("NumberOfSeriesRelatedInstances", target.kind()),
        })
        .for_kinds(&[TargetKind::Series]),
    );

    registry.register(
        FnExtractor::new("ModalitiesInStudy", |target, _| match *target {
            Target::Study(study) => Ok(modalities_in_study(study)),
            _ => unreachable_kind("ModalitiesInStudy", target.kind()),
        })
        .for_kinds(&[TargetKind::Study]),
    );

    registry.register(
        FnExtractor::new("seriesDescriptions", |target, _| match *target {
            Target::Study(study) => Ok(AttributeValue::List(
                study
                    .series
                    .iter()
                    .filter_map(|s| Target::Series(s).tag("SeriesDescription"))
                    .filter(|v| !v.is_null())
                    .cloned()
                    .collect(),
            )),
            _ => unreachable_kind("seriesDescriptions", target.kind()),
        })
        .for_kinds(&[TargetKind::Study]),
    );

    registry.register(
        FnExtractor::new("isReconstructable", |target, _| match *target {
            Target::Series(series) => Ok(series
                .metadata
                .get("isReconstructable")
                .and_then(AttributeValue::as_bool)
                .unwrap_or(false)
                .into()),
            _ => unreachable_kind("isReconstructable", target.kind()),
        })
        .for_kinds(&[TargetKind::Series]),
    );

    for laterality in [Laterality::Left, Laterality::Right] {
        for view in [MammoView::CranioCaudal, MammoView::MedioLateralOblique] {
            registry.register(MammoPosition::new(laterality, view));
        }
    }
}

fn keyword_alias(name: &'static str, keyword: &'static str) -> impl AttributeExtractor {
    FnExtractor::new(name, move |target, _| {
        Ok(target.tag(keyword).cloned().unwrap_or_default())
    })
}

fn unreachable_kind(name: &str, kind: TargetKind) -> Result<AttributeValue, MatchError> {
    Err(MatchError::UnsupportedTarget {
        name: name.to_string(),
        kind,
    })
}

fn instance_count(series: &Series) -> usize {
    series.instances().count()
}

/// `Modality` of the target. Studies without their own `Modality` report
/// the modalities of their series.
fn modality(target: &Target<'_>) -> AttributeValue {
    match *target {
        Target::Study(study) => match study.metadata.get("Modality") {
            Some(value) if !value.is_null() => value.clone(),
            _ => modalities_in_study(study),
        },
        _ => target.tag("Modality").cloned().unwrap_or_default(),
    }
}

/// `ModalitiesInStudy` if the study carries it, otherwise the distinct series
/// modalities in series order.
pub fn modalities_in_study(study: &Study) -> AttributeValue {
    if let Some(list) = study
        .metadata
        .get("ModalitiesInStudy")
        .and_then(AttributeValue::as_list)
    {
        if !list.is_empty() {
            return AttributeValue::List(list.to_vec());
        }
    }

    let mut seen = BTreeSet::new();
    let mut modalities = Vec::new();
    for series in &study.series {
        if let Some(m) = Target::Series(series)
            .tag("Modality")
            .and_then(AttributeValue::as_str)
        {
            if seen.insert(m.to_string()) {
                modalities.push(AttributeValue::from(m));
            }
        }
    }
    AttributeValue::List(modalities)
}

/// Number of display sets in the study with at least one renderable image.
pub fn number_of_display_sets_with_images(study: &Study) -> usize {
    study.display_sets().filter(|ds| ds.has_images()).count()
}

/// A series comes "from the URL" if its UID is one of the requested series,
/// or any of its instances is one of the requested SOP instances.
pub fn is_series_from_url(series: &Series, ctx: &MatchContext<'_>) -> bool {
    let params = ctx.url_params;
    params.has_series(&series.series_instance_uid)
        || series
            .instances()
            .any(|i| params.has_sop_instance(&i.sop_instance_uid))
}

fn is_instance_from_url(instance: &Instance, ctx: &MatchContext<'_>) -> bool {
    let params = ctx.url_params;
    let series_match = instance
        .tag("SeriesInstanceUID")
        .and_then(AttributeValue::as_str)
        .is_some_and(|uid| params.has_series(uid));
    series_match || params.has_sop_instance(&instance.sop_instance_uid)
}

/// Breast laterality token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Laterality {
    Left,
    Right,
}

impl Laterality {
    fn code(self) -> &'static str {
        match self {
            Laterality::Left => "L",
            Laterality::Right => "R",
        }
    }
}

/// Mammography view token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MammoView {
    CranioCaudal,
    MedioLateralOblique,
}

impl MammoView {
    fn token(self) -> &'static str {
        match self {
            MammoView::CranioCaudal => "CC",
            MammoView::MedioLateralOblique => "MLO",
        }
    }

    /// SNOMED-RT and SNOMED-CT code values used in `ViewCodeSequence`.
    fn code_values(self) -> &'static [&'static str] {
        match self {
            MammoView::CranioCaudal => &["R-10242", "399162004"],
            MammoView::MedioLateralOblique => &["R-10226", "399368009"],
        }
    }

    fn code_meaning(self) -> &'static str {
        match self {
            MammoView::CranioCaudal => "cranio-caudal",
            MammoView::MedioLateralOblique => "medio-lateral oblique",
        }
    }
}

/// Detects a mammography position such as left CC or right MLO.
///
/// Laterality comes from `ImageLaterality`, falling back to `Laterality`.
/// The view matches when `ViewPosition` equals the view token, or the first
/// `ViewCodeSequence` item carries the view's code value or code meaning.
#[derive(Debug, Clone)]
pub struct MammoPosition {
    name: String,
    laterality: Laterality,
    view: MammoView,
}

impl MammoPosition {
    pub fn new(laterality: Laterality, view: MammoView) -> Self {
        let side = match laterality {
            Laterality::Left => "Left",
            Laterality::Right => "Right",
        };
        Self {
            name: format!("is{side}{}", view.token()),
            laterality,
            view,
        }
    }

    /// Evaluates the position against one target without going through a
    /// registry.
    pub fn matches(&self, target: &Target<'_>) -> bool {
        self.laterality_matches(target) && self.view_matches(target)
    }

    fn laterality_matches(&self, target: &Target<'_>) -> bool {
        ["ImageLaterality", "Laterality"]
            .iter()
            .filter_map(|k| target.tag(k).and_then(AttributeValue::as_str))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .is_some_and(|v| v.eq_ignore_ascii_case(self.laterality.code()))
    }

    fn view_matches(&self, target: &Target<'_>) -> bool {
        let position = target
            .tag("ViewPosition")
            .and_then(AttributeValue::as_str)
            .map(str::trim);
        if position.is_some_and(|p| p.eq_ignore_ascii_case(self.view.token())) {
            return true;
        }

        let Some(item) = target.tag("ViewCodeSequence").and_then(AttributeValue::first) else {
            return false;
        };
        let code_value = item.get("CodeValue").and_then(AttributeValue::as_str);
        let code_meaning = item.get("CodeMeaning").and_then(AttributeValue::as_str);
        code_value.is_some_and(|v| self.view.code_values().contains(&v.trim()))
            || code_meaning.is_some_and(|m| m.trim().eq_ignore_ascii_case(self.view.code_meaning()))
    }
}

impl AttributeExtractor for MammoPosition {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, kind: TargetKind) -> bool {
        kind != TargetKind::Study
    }

    fn extract(
        &self,
        target: &Target<'_>,
        _ctx: &MatchContext<'_>,
    ) -> Result<AttributeValue, MatchError> {
        Ok(self.matches(target).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::UrlParams;
    use crate::study::DisplaySet;
    use std::collections::BTreeMap;

    fn resolve(name: &str, target: &Target<'_>, study: &Study, params: &UrlParams) -> AttributeValue {
        let registry = AttributeRegistry::with_builtins();
        let ctx = MatchContext::new(Some(study), params);
        registry.resolve(name, target, &ctx).unwrap()
    }

    fn image(uid: &str) -> Instance {
        Instance::new(uid).with_attribute("Rows", 512)
    }

    fn study() -> Study {
        Study::new("1")
            .with_series(
                Series::new("1.2.3")
                    .with_attribute("Modality", "MR")
                    .with_attribute("SeriesDescription", "AXIAL T2")
                    .with_instances(vec![image("1.2.3.1"), image("1.2.3.2")]),
            )
            .with_series(
                Series::new("1.2.4")
                    .with_attribute("Modality", "SR")
                    .with_display_set(DisplaySet::new("sr").with_images(vec![Instance::new("1.2.4.1")
                        .with_attribute("SOPClassUID", "1.2.840.10008.5.1.4.1.1.88.22")])),
            )
            .with_series(
                Series::new("1.2.5")
                    .with_attribute("Modality", "MR")
                    .with_instances(vec![image("1.2.5.1")]),
            )
    }

    #[test]
    fn test_number_of_display_sets_with_images() {
        let study = study();
        let params = UrlParams::new();
        let v = resolve("numberOfDisplaySetsWithImages", &Target::Study(&study), &study, &params);
        assert_eq!(v, AttributeValue::Number(2.0));
    }

    #[test]
    fn test_is_display_set_from_url_by_series() {
        let study = study();
        let params = UrlParams::new().with_series("1.2.3");
        let hit = resolve("isDisplaySetFromUrl", &Target::Series(&study.series[0]), &study, &params);
        let miss = resolve("isDisplaySetFromUrl", &Target::Series(&study.series[2]), &study, &params);
        assert_eq!(hit, AttributeValue::Bool(true));
        assert_eq!(miss, AttributeValue::Bool(false));
    }

    #[test]
    fn test_is_display_set_from_url_by_sop_instance() {
        let study = study();
        let params = UrlParams::new()
            .with_series("9.9.9")
            .with_sop_instance("1.2.5.1");
        let hit = resolve("isDisplaySetFromUrl", &Target::Series(&study.series[2]), &study, &params);
        assert_eq!(hit, AttributeValue::Bool(true));
    }

    #[test]
    fn test_is_display_set_from_url_rejects_study() {
        let study = study();
        let params = UrlParams::new();
        let registry = AttributeRegistry::with_builtins();
        let ctx = MatchContext::new(Some(&study), &params);
        assert!(registry
            .resolve("isDisplaySetFromUrl", &Target::Study(&study), &ctx)
            .is_err());
    }

    #[test]
    fn test_modalities_in_study_distinct_in_order() {
        let study = study();
        assert_eq!(
            modalities_in_study(&study),
            AttributeValue::from(vec!["MR", "SR"])
        );
        let params = UrlParams::new();
        assert_eq!(
            resolve("modality", &Target::Study(&study), &study, &params),
            AttributeValue::from(vec!["MR", "SR"])
        );
        let study = study.with_attribute("Modality", "CT");
        assert_eq!(
            resolve("modality", &Target::Study(&study), &study, &params),
            AttributeValue::from("CT")
        );
    }

    #[test]
    fn test_counts() {
        let study = study();
        let params = UrlParams::new();
        assert_eq!(
            resolve("NumberOfStudyRelatedSeries", &Target::Study(&study), &study, &params),
            AttributeValue::Number(3.0)
        );
        assert_eq!(
            resolve("instanceCount", &Target::Series(&study.series[0]), &study, &params),
            AttributeValue::Number(2.0)
        );
        assert_eq!(
            resolve("instanceCount", &Target::Study(&study), &study, &params),
            AttributeValue::Number(4.0)
        );
    }

    #[test]
    fn test_series_descriptions() {
        let study = study();
        let params = UrlParams::new();
        assert_eq!(
            resolve("seriesDescriptions", &Target::Study(&study), &study, &params),
            AttributeValue::from(vec!["AXIAL T2"])
        );
    }

    #[test]
    fn test_missing_keyword_alias_is_null() {
        let study = study();
        let params = UrlParams::new();
        assert!(resolve("bodyPartExamined", &Target::Series(&study.series[0]), &study, &params)
            .is_null());
    }

    #[test]
    fn test_mammo_position_by_view_position() {
        let lcc = Instance::new("a")
            .with_attribute("ImageLaterality", "L")
            .with_attribute("ViewPosition", "CC");
        let target = Target::Image(&lcc);
        assert!(MammoPosition::new(Laterality::Left, MammoView::CranioCaudal).matches(&target));
        assert!(!MammoPosition::new(Laterality::Right, MammoView::CranioCaudal).matches(&target));
        assert!(!MammoPosition::new(Laterality::Left, MammoView::MedioLateralOblique).matches(&target));
    }

    #[test]
    fn test_mammo_position_by_view_code_sequence() {
        let mut code = BTreeMap::new();
        code.insert("CodeValue".to_string(), AttributeValue::from("399368009"));
        code.insert(
            "CodeMeaning".to_string(),
            AttributeValue::from("medio-lateral oblique"),
        );
        let rmlo = Instance::new("b")
            .with_attribute("Laterality", "R")
            .with_attribute(
                "ViewCodeSequence",
                AttributeValue::List(vec![AttributeValue::Object(code)]),
            );
        let study = Study::new("m").with_series(Series::new("s").with_instances(vec![rmlo]));
        let params = UrlParams::new();
        let series = Target::Series(&study.series[0]);
        assert_eq!(
            resolve("isRightMLO", &series, &study, &params),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            resolve("isLeftMLO", &series, &study, &params),
            AttributeValue::Bool(false)
        );
    }
}
