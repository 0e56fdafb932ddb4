//! Viewport assignment results and policy.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Whether a display set placed in one slot may be placed again in a later
/// slot of the same stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentPolicy {
    /// Every slot takes its best match, even if an earlier slot already
    /// shows it.
    #[default]
    Reusable,
    /// Later slots skip display sets already placed.
    Exclusive,
}

/// What one viewport slot shows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSlot {
    pub viewport_index: usize,
    /// The series the display sets were taken from, if any matched.
    pub series_instance_uid: Option<String>,
    pub display_set_instance_uids: Vec<String>,
    /// Series-level score of the chosen series.
    pub score: f64,
}

impl ViewportSlot {
    pub fn empty(viewport_index: usize) -> Self {
        Self {
            viewport_index,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_set_instance_uids.is_empty()
    }
}

/// Display sets for every slot of a stage, in slot order.
///
/// Serializes as `{"<viewportIndex>": [displaySetInstanceUID, ...]}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewportAssignment {
    slots: Vec<ViewportSlot>,
}

impl ViewportAssignment {
    pub(crate) fn from_slots(slots: Vec<ViewportSlot>) -> Self {
        Self { slots }
    }

    /// Display set UIDs for slot `viewport_index`.
    pub fn get(&self, viewport_index: usize) -> Option<&[String]> {
        self.slots
            .get(viewport_index)
            .map(|slot| slot.display_set_instance_uids.as_slice())
    }

    pub fn slot(&self, viewport_index: usize) -> Option<&ViewportSlot> {
        self.slots.get(viewport_index)
    }

    pub fn slots(&self) -> &[ViewportSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots showing at least one display set.
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }

    pub fn to_map(&self) -> BTreeMap<usize, Vec<String>> {
        self.slots
            .iter()
            .map(|slot| (slot.viewport_index, slot.display_set_instance_uids.clone()))
            .collect()
    }
}

impl Serialize for ViewportAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for slot in &self.slots {
            map.serialize_entry(&slot.viewport_index.to_string(), &slot.display_set_instance_uids)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_index_map() {
        let assignment = ViewportAssignment::from_slots(vec![
            ViewportSlot {
                viewport_index: 0,
                series_instance_uid: Some("1.2".into()),
                display_set_instance_uids: vec!["ds-a".into()],
                score: 2.0,
            },
            ViewportSlot::empty(1),
        ]);
        let json = serde_json::to_value(&assignment).unwrap();
        assert_eq!(json, serde_json::json!({"0": ["ds-a"], "1": []}));
        assert_eq!(assignment.filled_count(), 1);
        assert_eq!(assignment.get(0), Some(&["ds-a".to_string()][..]));
        assert_eq!(assignment.get(2), None);
    }
}
