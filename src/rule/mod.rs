//! Matching rules: evaluation, scoring and ranking.
//!
//! A [`Rule`] constrains one attribute. The [`RuleEvaluator`] resolves the
//! attribute and applies the constraint; the [`MatchScorer`] folds a rule set
//! into a [`MatchResult`]; the [`Ranker`] orders scored candidates.
//!
//! - **Weighted rules** are soft preferences: each passing rule adds its
//!   weight to the score.
//! - **Required rules** are hard gates: one failure disqualifies the
//!   candidate regardless of score.
//! - **Ties** are broken deterministically, by declaration order unless
//!   configured otherwise. Nothing depends on map or set iteration order.

mod evaluator;
mod scorer;
mod types;

pub use evaluator::{apply, RuleEvaluator, RuleOutcome};
pub use scorer::{score_each, MatchResult, MatchScorer, Ranker, TieBreaker};
pub use types::{Constraint, RangeBounds, RegexPattern, Rule};
