//! Engine configuration.

use crate::assign::AssignmentPolicy;
use crate::protocol::Protocol;
use crate::rule::{Ranker, TieBreaker};

/// Configuration for [`ProtocolEngine`](super::ProtocolEngine).
///
/// # Examples
///
/// ```
/// use hanging_protocol::assign::AssignmentPolicy;
/// use hanging_protocol::engine::EngineConfig;
/// use hanging_protocol::rule::TieBreaker;
///
/// let config = EngineConfig::default()
///     .with_tie_breaker(TieBreaker::SeriesNumber)
///     .with_assignment_policy(AssignmentPolicy::Exclusive)
///     .with_epsilon(1e-6);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How equal scores are ordered.
    pub tie_breaker: TieBreaker,

    /// Whether a display set may fill several slots of one stage.
    pub assignment_policy: AssignmentPolicy,

    /// Scores closer than this are considered equal.
    pub epsilon: f64,

    /// Whether to score protocols and series in parallel using rayon.
    ///
    /// Has no effect unless the `parallel` feature is enabled.
    pub parallel: bool,

    /// Protocol used when no protocol in the library qualifies.
    pub default_protocol: Protocol,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tie_breaker: TieBreaker::DeclarationOrder,
            assignment_policy: AssignmentPolicy::Reusable,
            epsilon: 1e-9,
            parallel: false,
            default_protocol: Protocol::default_protocol(),
        }
    }
}

impl EngineConfig {
    pub fn with_tie_breaker(mut self, tb: TieBreaker) -> Self {
        self.tie_breaker = tb;
        self
    }

    pub fn with_assignment_policy(mut self, policy: AssignmentPolicy) -> Self {
        self.assignment_policy = policy;
        self
    }

    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_default_protocol(mut self, protocol: Protocol) -> Self {
        self.default_protocol = protocol;
        self
    }

    /// The ranker every matching step uses.
    pub fn ranker(&self) -> Ranker {
        Ranker::new()
            .with_tie_breaker(self.tie_breaker)
            .with_epsilon(self.epsilon)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            ));
        }
        self.default_protocol
            .validate()
            .map_err(|e| format!("default protocol: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tie_breaker, TieBreaker::DeclarationOrder);
        assert_eq!(config.assignment_policy, AssignmentPolicy::Reusable);
        assert!((config.epsilon - 1e-9).abs() < 1e-20);
        assert!(!config.parallel);
        assert_eq!(config.default_protocol.id, "default");
    }

    #[test]
    fn test_invalid_epsilon() {
        assert!(EngineConfig::default().with_epsilon(-1.0).validate().is_err());
        assert!(EngineConfig::default().with_epsilon(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_invalid_default_protocol() {
        let config = EngineConfig::default().with_default_protocol(Protocol::new("empty", "Empty"));
        let err = config.validate().unwrap_err();
        assert!(err.contains("default protocol"));
    }
}
