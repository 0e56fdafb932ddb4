//! Protocol selection.

use crate::attribute::{AttributeRegistry, MatchContext, Target};
use crate::protocol::Protocol;
use crate::rule::{score_each, MatchResult, MatchScorer, Ranker};
use crate::study::Study;

/// A protocol chosen for a study, with the score that got it there.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMatch<'p> {
    pub protocol: &'p Protocol,
    /// Position in the library, or `None` for the fallback protocol.
    pub index: Option<usize>,
    pub result: MatchResult,
}

impl ProtocolMatch<'_> {
    pub fn is_default(&self) -> bool {
        self.index.is_none()
    }

    pub fn score(&self) -> f64 {
        self.result.score
    }
}

/// Ranks protocols against a study by their study-level rules.
///
/// Protocols with a failed required rule are gated out; the rest are ordered
/// by descending score with earlier-declared protocols winning ties. A
/// protocol without rules qualifies with score 0.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolSelector<'r> {
    scorer: MatchScorer<'r>,
    ranker: Ranker,
    parallel: bool,
}

impl<'r> ProtocolSelector<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self {
            scorer: MatchScorer::new(registry),
            ranker: Ranker::new(),
            parallel: false,
        }
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Scores protocols on the rayon pool when the `parallel` feature is on.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Every qualifying protocol, best first.
    pub fn rank<'p>(
        &self,
        protocols: &'p [Protocol],
        study: &Study,
        ctx: &MatchContext<'_>,
    ) -> Vec<ProtocolMatch<'p>> {
        let target = Target::Study(study);
        let results = score_each(protocols, self.parallel, |protocol| {
            self.scorer.score(&protocol.study_matching_rules, &target, ctx)
        });

        for (protocol, result) in protocols.iter().zip(&results) {
            log::trace!(
                "ProtocolSelector::rank `{}` score={} required_failed={}",
                protocol.id,
                result.score,
                result.required_failed
            );
        }

        // Series-number tie-breaking has no meaning between protocols.
        self.ranker
            .rank(&results)
            .into_iter()
            .map(|i| ProtocolMatch {
                protocol: &protocols[i],
                index: Some(i),
                result: results[i].clone(),
            })
            .collect()
    }

    /// The best qualifying protocol, or `fallback` when none qualifies.
    pub fn select<'p>(
        &self,
        protocols: &'p [Protocol],
        fallback: &'p Protocol,
        study: &Study,
        ctx: &MatchContext<'_>,
    ) -> ProtocolMatch<'p> {
        match self.rank(protocols, study, ctx).into_iter().next() {
            Some(best) => {
                log::debug!(
                    "ProtocolSelector::select chose `{}` (score {})",
                    best.protocol.id,
                    best.result.score
                );
                best
            }
            None => {
                log::debug!(
                    "ProtocolSelector::select found no qualifying protocol among {}, using `{}`",
                    protocols.len(),
                    fallback.id
                );
                ProtocolMatch {
                    protocol: fallback,
                    index: None,
                    result: MatchResult::default(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::UrlParams;
    use crate::rule::{Constraint, Rule};
    use proptest::prelude::*;

    fn ct_study() -> Study {
        Study::new("1").with_attribute("Modality", "CT")
    }

    #[test]
    fn test_required_rule_gates_out() {
        let registry = AttributeRegistry::with_builtins();
        let selector = ProtocolSelector::new(&registry);
        let mut p1 = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::equals("MR")).required());
        p1.id = "P1".into();
        let mut p2 = Protocol::default_protocol();
        p2.id = "P2".into();
        let library = vec![p1, p2];
        let fallback = Protocol::default_protocol();

        let study = ct_study();
        let params = UrlParams::new();
        let ctx = MatchContext::new(Some(&study), &params);
        let chosen = selector.select(&library, &fallback, &study, &ctx);
        assert_eq!(chosen.protocol.id, "P2");
        assert_eq!(chosen.index, Some(1));
        assert!(!chosen.is_default());
    }

    #[test]
    fn test_highest_score_wins() {
        let registry = AttributeRegistry::with_builtins();
        let selector = ProtocolSelector::new(&registry);
        let mut generic = Protocol::default_protocol();
        generic.id = "generic".into();
        let mut ct = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::equals("CT")).with_weight(5.0));
        ct.id = "ct".into();
        let library = vec![generic, ct];
        let fallback = Protocol::default_protocol();

        let study = ct_study();
        let params = UrlParams::new();
        let ctx = MatchContext::new(Some(&study), &params);
        let ranked = selector.rank(&library, &study, &ctx);
        assert_eq!(
            ranked.iter().map(|m| m.protocol.id.as_str()).collect::<Vec<_>>(),
            vec!["ct", "generic"]
        );
        assert!((ranked[0].score() - 5.0).abs() < 1e-12);
        assert_eq!(selector.select(&library, &fallback, &study, &ctx).protocol.id, "ct");
    }

    #[test]
    fn test_fallback_when_all_gated() {
        let registry = AttributeRegistry::with_builtins();
        let selector = ProtocolSelector::new(&registry);
        let mut mr = Protocol::default_protocol()
            .with_rule(Rule::new("modality", Constraint::equals("MR")).required());
        mr.id = "mr".into();
        let fallback = Protocol::default_protocol();

        let study = ct_study();
        let params = UrlParams::new();
        let ctx = MatchContext::new(Some(&study), &params);
        let chosen = selector.select(std::slice::from_ref(&mr), &fallback, &study, &ctx);
        assert!(chosen.is_default());
        assert_eq!(chosen.protocol.id, "default");

        let chosen = selector.select(&[], &fallback, &study, &ctx);
        assert!(chosen.is_default());
    }

    #[test]
    fn test_study_matching_uses_modalities_in_study() {
        let registry = AttributeRegistry::with_builtins();
        let selector = ProtocolSelector::new(&registry);
        let mut pet = Protocol::default_protocol()
            .with_rule(Rule::new("ModalitiesInStudy", Constraint::contains("PT")).required());
        pet.id = "pet-ct".into();
        let fallback = Protocol::default_protocol();

        let study = Study::new("1")
            .with_series(crate::study::Series::new("a").with_attribute("Modality", "CT"))
            .with_series(crate::study::Series::new("b").with_attribute("Modality", "PT"));
        let params = UrlParams::new();
        let ctx = MatchContext::new(Some(&study), &params);
        let chosen = selector.select(std::slice::from_ref(&pet), &fallback, &study, &ctx);
        assert_eq!(chosen.protocol.id, "pet-ct");
    }

    proptest! {
        #[test]
        fn prop_ties_pick_first_declared(n in 1usize..8, weights in prop::collection::vec(0u8..3, 8)) {
            let registry = AttributeRegistry::with_builtins();
            let selector = ProtocolSelector::new(&registry);
            let library: Vec<Protocol> = (0..n)
                .map(|i| {
                    let mut p = Protocol::default_protocol().with_rule(
                        Rule::new("modality", Constraint::equals("CT")).with_weight(f64::from(weights[i])),
                    );
                    p.id = format!("p{i}");
                    p
                })
                .collect();
            let fallback = Protocol::default_protocol();
            let study = ct_study();
            let params = UrlParams::new();
            let ctx = MatchContext::new(Some(&study), &params);

            let best_weight = weights[..n].iter().copied().max().unwrap_or(0);
            let expected = weights[..n].iter().position(|&w| w == best_weight).unwrap_or(0);

            let first = selector.select(&library, &fallback, &study, &ctx);
            let copy = library.clone();
            let second = selector.select(&copy, &fallback, &study, &ctx);
            prop_assert_eq!(first.index, Some(expected));
            prop_assert_eq!(second.index, Some(expected));
        }
    }
}
