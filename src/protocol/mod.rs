//! Hanging protocol documents.
//!
//! A [`Protocol`] is a named, ordered list of [`Stage`]s plus study-level
//! matching rules. Each stage lays out a [`ViewportStructure`] and declares
//! one [`Viewport`] per slot, in slot order, each with its own series and
//! image matching rules.
//!
//! Documents are JSON with camelCase keys. They are validated once when the
//! library is loaded and treated as immutable during matching.
//!
//! # Example
//!
//! ```
//! use hanging_protocol::protocol::Protocol;
//!
//! let protocol = Protocol::from_json(r#"{
//!     "id": "ct-chest",
//!     "name": "CT Chest",
//!     "studyMatchingRules": [
//!         {"attribute": "modality", "constraint": {"equals": "CT"}, "required": true}
//!     ],
//!     "stages": [{
//!         "name": "1x2",
//!         "viewportStructure": {"layoutType": "grid", "properties": {"rows": 1, "columns": 2}},
//!         "viewports": [
//!             {"seriesMatchingRules": [{"attribute": "seriesDescription", "constraint": {"contains": "LUNG"}}]},
//!             {"seriesMatchingRules": [{"attribute": "seriesDescription", "constraint": {"contains": "MEDIASTINUM"}}]}
//!         ]
//!     }]
//! }"#).unwrap();
//!
//! assert_eq!(protocol.stages[0].viewport_structure.slot_count(), 2);
//! ```

mod library;
mod types;

pub use library::{load_library, validate_library, warn_unknown_attributes, DEFAULT_PROTOCOL_ID};
pub use types::{
    ActivationRule, LayoutOption, LayoutProperties, MatchMode, Protocol, Stage, StageActivation,
    Viewport, ViewportSort, ViewportStructure,
};
