//! Study metadata snapshot: study, series, display sets and instances.

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeMap, AttributeValue};

/// SOP class UID root shared by all DICOM storage classes.
const STORAGE_SOP_CLASS_ROOT: &str = "1.2.840.10008.5.1.4.1.1.";

/// Storage classes below the root that never carry pixel data
/// (structured reports, encapsulated documents, presentation states,
/// waveforms, raw data, spatial registration).
const NON_IMAGE_SOP_CLASS_PREFIXES: &[&str] = &[
    "1.2.840.10008.5.1.4.1.1.88.",
    "1.2.840.10008.5.1.4.1.1.104.",
    "1.2.840.10008.5.1.4.1.1.11.",
    "1.2.840.10008.5.1.4.1.1.9.",
    "1.2.840.10008.5.1.4.1.1.66",
    "1.2.840.10008.5.1.4.1.1.481.",
];

/// Returns `true` if the SOP class UID names an image storage class.
pub fn is_image_sop_class(sop_class_uid: &str) -> bool {
    sop_class_uid.starts_with(STORAGE_SOP_CLASS_ROOT)
        && !NON_IMAGE_SOP_CLASS_PREFIXES
            .iter()
            .any(|prefix| sop_class_uid.starts_with(prefix))
}

/// A single DICOM instance (image, frame source, or non-image object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "SOPInstanceUID")]
    pub sop_instance_uid: String,
    #[serde(default)]
    pub metadata: AttributeMap,
}

impl Instance {
    pub fn new(sop_instance_uid: impl Into<String>) -> Self {
        Self {
            sop_instance_uid: sop_instance_uid.into(),
            metadata: AttributeMap::new(),
        }
    }

    pub fn with_attribute(mut self, keyword: &str, value: impl Into<AttributeValue>) -> Self {
        self.metadata.insert(keyword.to_string(), value.into());
        self
    }

    pub fn tag(&self, keyword: &str) -> Option<&AttributeValue> {
        self.metadata.get(keyword)
    }

    /// Whether the instance carries renderable pixel data: either `Rows` is
    /// present or the SOP class is an image storage class.
    pub fn has_image_data(&self) -> bool {
        if self.metadata.get("Rows").is_some_and(|rows| !rows.is_null()) {
            return true;
        }
        self.metadata
            .get("SOPClassUID")
            .and_then(AttributeValue::as_str)
            .is_some_and(is_image_sop_class)
    }
}

/// A renderable grouping of instances. Assignments refer to display sets by
/// their instance UID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySet {
    #[serde(rename = "displaySetInstanceUID")]
    pub display_set_instance_uid: String,
    #[serde(default)]
    pub images: Vec<Instance>,
    #[serde(default)]
    pub metadata: AttributeMap,
    /// Set by the loader for display sets it could not build.
    #[serde(default)]
    pub unsupported: bool,
}

impl DisplaySet {
    pub fn new(display_set_instance_uid: impl Into<String>) -> Self {
        Self {
            display_set_instance_uid: display_set_instance_uid.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: Vec<Instance>) -> Self {
        self.images = images;
        self
    }

    pub fn with_attribute(mut self, keyword: &str, value: impl Into<AttributeValue>) -> Self {
        self.metadata.insert(keyword.to_string(), value.into());
        self
    }

    pub fn with_unsupported(mut self, unsupported: bool) -> Self {
        self.unsupported = unsupported;
        self
    }

    pub fn has_images(&self) -> bool {
        !self.unsupported && self.images.iter().any(Instance::has_image_data)
    }

    /// `InstanceNumber` of the first image, used for instance ordering.
    pub fn first_instance_number(&self) -> Option<f64> {
        self.images
            .first()
            .and_then(|i| i.tag("InstanceNumber"))
            .and_then(AttributeValue::as_f64)
    }
}

/// A series with its series-level metadata and display sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(rename = "SeriesInstanceUID")]
    pub series_instance_uid: String,
    #[serde(default)]
    pub metadata: AttributeMap,
    #[serde(rename = "displaySets", default)]
    pub display_sets: Vec<DisplaySet>,
}

impl Series {
    pub fn new(series_instance_uid: impl Into<String>) -> Self {
        Self {
            series_instance_uid: series_instance_uid.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, keyword: &str, value: impl Into<AttributeValue>) -> Self {
        self.metadata.insert(keyword.to_string(), value.into());
        self
    }

    pub fn with_display_set(mut self, display_set: DisplaySet) -> Self {
        self.display_sets.push(display_set);
        self
    }

    /// Adds one display set holding `instances`, named after the series UID.
    pub fn with_instances(mut self, instances: Vec<Instance>) -> Self {
        let uid = format!("{}.ds{}", self.series_instance_uid, self.display_sets.len());
        self.display_sets
            .push(DisplaySet::new(uid).with_images(instances));
        self
    }

    /// All instances across the series' display sets, in display set order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.display_sets.iter().flat_map(|ds| ds.images.iter())
    }

    pub fn first_instance(&self) -> Option<&Instance> {
        self.instances().next()
    }

    /// `SeriesNumber` from the series metadata or its first image.
    pub fn series_number(&self) -> Option<f64> {
        self.metadata
            .get("SeriesNumber")
            .or_else(|| self.first_instance().and_then(|i| i.tag("SeriesNumber")))
            .and_then(AttributeValue::as_f64)
    }
}

/// A fully loaded study snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Study {
    #[serde(rename = "StudyInstanceUID")]
    pub study_instance_uid: String,
    #[serde(default)]
    pub metadata: AttributeMap,
    #[serde(default)]
    pub series: Vec<Series>,
}

impl Study {
    pub fn new(study_instance_uid: impl Into<String>) -> Self {
        Self {
            study_instance_uid: study_instance_uid.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, keyword: &str, value: impl Into<AttributeValue>) -> Self {
        self.metadata.insert(keyword.to_string(), value.into());
        self
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn first_instance(&self) -> Option<&Instance> {
        self.series.iter().find_map(Series::first_instance)
    }

    pub fn display_sets(&self) -> impl Iterator<Item = &DisplaySet> {
        self.series.iter().flat_map(|s| s.display_sets.iter())
    }

    /// Parses a study snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
