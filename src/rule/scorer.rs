//! Rule-set scoring and candidate ranking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::evaluator::RuleEvaluator;
use super::types::Rule;
use crate::attribute::{AttributeRegistry, MatchContext, Target};

/// Aggregate of one rule set evaluated against one target.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Sum of the contributions of all passed rules.
    pub score: f64,
    /// True if any required rule failed. Such a target is never selected.
    pub required_failed: bool,
    /// Attributes of the rules that passed, in rule order.
    pub passed: Vec<String>,
    /// Attributes of the rules that failed, in rule order.
    pub failed: Vec<String>,
}

impl MatchResult {
    /// Whether the target may be selected at all.
    pub fn qualifies(&self) -> bool {
        !self.required_failed
    }
}

/// Scores targets against rule sets.
#[derive(Debug, Clone, Copy)]
pub struct MatchScorer<'r> {
    evaluator: RuleEvaluator<'r>,
}

impl<'r> MatchScorer<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self {
            evaluator: RuleEvaluator::new(registry),
        }
    }

    pub fn evaluator(&self) -> &RuleEvaluator<'r> {
        &self.evaluator
    }

    /// Evaluates every rule: sums contributions and ORs required failures.
    ///
    /// Every rule is evaluated even after a required failure, so the
    /// passed/failed details stay complete.
    pub fn score(&self, rules: &[Rule], target: &Target<'_>, ctx: &MatchContext<'_>) -> MatchResult {
        let mut result = MatchResult::default();
        for rule in rules {
            let outcome = self.evaluator.evaluate(rule, target, ctx);
            result.score += outcome.contribution;
            result.required_failed |= outcome.required_failed;
            if outcome.passed {
                result.passed.push(rule.attribute.clone());
            } else {
                result.failed.push(rule.attribute.clone());
            }
        }
        result
    }
}

/// Scores every candidate with `score`, in input order.
///
/// With the `parallel` feature and `parallel` set, candidates are scored on
/// the rayon pool; the result order is the same either way.
pub fn score_each<T, F>(candidates: &[T], parallel: bool, score: F) -> Vec<MatchResult>
where
    T: Sync,
    F: Fn(&T) -> MatchResult + Sync + Send,
{
    #[cfg(feature = "parallel")]
    if parallel {
        use rayon::prelude::*;
        return candidates.par_iter().map(&score).collect();
    }

    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    candidates.iter().map(score).collect()
}

/// Strategy for ordering candidates whose scores tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreaker {
    /// The earlier-declared candidate wins.
    #[default]
    DeclarationOrder,

    /// Lower `SeriesNumber` wins, then declaration order. Candidates without
    /// a series number sort after those with one.
    SeriesNumber,
}

/// Orders scored candidates: qualifying candidates only, highest score
/// first, ties broken by the configured [`TieBreaker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranker {
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl Default for Ranker {
    fn default() -> Self {
        Self {
            tie_breaker: TieBreaker::default(),
            epsilon: 1e-9,
        }
    }
}

impl Ranker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tie_breaker(mut self, tb: TieBreaker) -> Self {
        self.tie_breaker = tb;
        self
    }

    /// Sets the epsilon below which two scores are considered equal.
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    pub fn tie_breaker(&self) -> TieBreaker {
        self.tie_breaker
    }

    /// Indices of qualifying results, best first.
    pub fn rank(&self, results: &[MatchResult]) -> Vec<usize> {
        self.rank_with(results, |_| None)
    }

    /// Like [`Ranker::rank`], with `series_number(i)` supplying the
    /// secondary key used by [`TieBreaker::SeriesNumber`].
    pub fn rank_with<K>(&self, results: &[MatchResult], series_number: K) -> Vec<usize>
    where
        K: Fn(usize) -> Option<f64>,
    {
        let mut indices: Vec<usize> = (0..results.len())
            .filter(|&i| results[i].qualifies())
            .collect();

        indices.sort_by(|&a, &b| {
            let (sa, sb) = (results[a].score, results[b].score);
            if (sa - sb).abs() > self.epsilon {
                // Descending score.
                return sb.partial_cmp(&sa).unwrap_or(Ordering::Equal);
            }

            if self.tie_breaker == TieBreaker::SeriesNumber {
                let ord = match (series_number(a), series_number(b)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }

            a.cmp(&b)
        });

        indices
    }

    /// Index of the best qualifying result, if any.
    pub fn best(&self, results: &[MatchResult]) -> Option<usize> {
        self.rank(results).first().copied()
    }
}
