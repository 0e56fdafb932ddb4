//! Attribute extraction.
//!
//! Rules name an attribute; the [`AttributeRegistry`] turns that name into a
//! value for a study, series or image [`Target`]. Extractors are registered
//! explicitly and typed by the target kinds they accept, so a rule that reads
//! a series-only attribute from a study fails cleanly instead of producing
//! a meaningless value.
//!
//! # Built-ins
//!
//! - keyword aliases: `modality`, `seriesDescription`, `studyDescription`,
//!   `bodyPartExamined`, `seriesNumber`, `instanceNumber`, `patientId`
//! - counts: `instanceCount`, `numberOfDisplaySetsWithImages`,
//!   `NumberOfStudyRelatedSeries`, `NumberOfSeriesRelatedInstances`
//! - study summaries: `ModalitiesInStudy`, `seriesDescriptions`
//! - selection: `isDisplaySetFromUrl`, `isReconstructable`
//! - mammography: `isLeftCC`, `isRightCC`, `isLeftMLO`, `isRightMLO`

mod builtins;
mod registry;
mod types;
mod url_params;

pub use builtins::{
    is_series_from_url, modalities_in_study, number_of_display_sets_with_images, Laterality,
    MammoPosition, MammoView,
};
pub use registry::{AttributeExtractor, AttributeRegistry, FnExtractor};
pub use types::{AttributeMap, AttributeValue, MatchContext, Target, TargetKind};
pub use url_params::{UrlParams, INITIAL_SERIES_PARAM, INITIAL_SOP_PARAM};
