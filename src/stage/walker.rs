//! Bounded stage navigation.

use serde::{Deserialize, Serialize};

use crate::protocol::StageActivation;

/// Current position within a protocol's stages.
///
/// Indices stay in `[0, count)`. Moving past either bound is a no-op that
/// reports `false`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageWalker {
    current: usize,
    count: usize,
}

impl StageWalker {
    /// A walker at stage 0 of `count` stages.
    pub fn new(count: usize) -> Self {
        Self { current: 0, count }
    }

    /// Restarts at stage 0 for a protocol with `count` stages.
    pub fn reset(&mut self, count: usize) {
        *self = Self::new(count);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.count
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    /// Advances one stage. Returns whether the index changed.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Steps back one stage. Returns whether the index changed.
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Jumps to `index`. Out of range, or already there, is a no-op.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.count || index == self.current {
            return false;
        }
        self.current = index;
        true
    }
}

/// Availability of a stage given how many of its viewports were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    Enabled,
    Passive,
    Disabled,
}

impl StageStatus {
    /// Classifies a stage with `filled` non-empty viewports against its
    /// activation thresholds, or the defaults when it declares none.
    pub fn classify(activation: Option<&StageActivation>, filled: usize) -> Self {
        let activation = activation.copied().unwrap_or_default();
        if filled >= activation.enabled.min_viewports_matched {
            StageStatus::Enabled
        } else if filled >= activation.passive.min_viewports_matched {
            StageStatus::Passive
        } else {
            StageStatus::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ActivationRule;

    #[test]
    fn test_walk_forward_and_back() {
        let mut walker = StageWalker::new(3);
        assert_eq!(walker.count(), 3);
        assert!(!walker.has_previous());
        assert!(walker.next());
        assert!(walker.next());
        assert_eq!(walker.current(), 2);
        assert!(!walker.has_next());
        assert!(!walker.next());
        assert_eq!(walker.current(), 2);
        assert!(walker.previous());
        assert!(walker.previous());
        assert!(!walker.previous());
        assert_eq!(walker.current(), 0);
    }

    #[test]
    fn test_single_stage_is_fixed() {
        let mut walker = StageWalker::new(1);
        assert!(!walker.next());
        assert!(!walker.previous());
        assert_eq!(walker.current(), 0);
    }

    #[test]
    fn test_jump_and_reset() {
        let mut walker = StageWalker::new(4);
        assert!(walker.jump_to(3));
        assert!(!walker.jump_to(3));
        assert!(!walker.jump_to(4));
        assert_eq!(walker.current(), 3);
        walker.reset(2);
        assert_eq!(walker.current(), 0);
        assert_eq!(walker.count(), 2);
    }

    #[test]
    fn test_empty_walker() {
        let mut walker = StageWalker::default();
        assert!(!walker.next());
        assert!(!walker.previous());
        assert!(!walker.jump_to(0));
    }

    #[test]
    fn test_classify_defaults() {
        assert_eq!(StageStatus::classify(None, 1), StageStatus::Enabled);
        assert_eq!(StageStatus::classify(None, 0), StageStatus::Passive);
    }

    #[test]
    fn test_classify_thresholds() {
        let activation = StageActivation {
            enabled: ActivationRule { min_viewports_matched: 3 },
            passive: ActivationRule { min_viewports_matched: 1 },
        };
        assert_eq!(StageStatus::classify(Some(&activation), 4), StageStatus::Enabled);
        assert_eq!(StageStatus::classify(Some(&activation), 2), StageStatus::Passive);
        assert_eq!(StageStatus::classify(Some(&activation), 0), StageStatus::Disabled);
    }
}
