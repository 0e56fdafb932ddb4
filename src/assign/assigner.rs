//! Series and display set assignment for one stage.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::types::{AssignmentPolicy, ViewportAssignment, ViewportSlot};
use crate::attribute::{AttributeRegistry, MatchContext, Target};
use crate::protocol::{MatchMode, Stage, Viewport, ViewportSort};
use crate::rule::{score_each, MatchResult, MatchScorer, Ranker, Rule};
use crate::study::{DisplaySet, Study};

/// Fills each viewport slot of a stage from the study's series.
///
/// For every slot in declared order:
///
/// 1. Score the slot's series rules against each series and rank the
///    qualifying ones. Series without a selectable display set are skipped;
///    display sets the loader marked unsupported are never selectable.
/// 2. Take the series at the slot's `matchIndex` in that ranking.
/// 3. If the slot has image rules, score the series' display sets by their
///    best qualifying image and drop display sets with no qualifying image.
///    Otherwise every display set qualifies with score 0.
/// 4. Order the display sets by the slot's sort and keep the first one, or
///    all of them for a multi-match slot.
///
/// A slot with no candidate is left empty.
#[derive(Debug, Clone, Copy)]
pub struct ViewportAssigner<'r> {
    scorer: MatchScorer<'r>,
    ranker: Ranker,
    policy: AssignmentPolicy,
    parallel: bool,
}

impl<'r> ViewportAssigner<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self {
            scorer: MatchScorer::new(registry),
            ranker: Ranker::new(),
            policy: AssignmentPolicy::default(),
            parallel: false,
        }
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_policy(mut self, policy: AssignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn assign(&self, stage: &Stage, study: &Study, ctx: &MatchContext<'_>) -> ViewportAssignment {
        let slot_count = stage
            .viewport_structure
            .slot_count()
            .max(stage.viewports.len());
        let mut used: BTreeSet<String> = BTreeSet::new();
        let mut slots = Vec::with_capacity(slot_count);

        for (index, viewport) in stage.viewports.iter().enumerate() {
            let exclusive = self.policy == AssignmentPolicy::Exclusive || viewport.exclusive;
            let available = |ds: &DisplaySet| {
                !ds.unsupported && (!exclusive || !used.contains(&ds.display_set_instance_uid))
            };

            let slot = self.fill_slot(index, viewport, study, ctx, available);
            log::trace!(
                "ViewportAssigner::assign slot {index} -> series {:?}, {} display set(s)",
                slot.series_instance_uid,
                slot.display_set_instance_uids.len()
            );

            used.extend(slot.display_set_instance_uids.iter().cloned());
            slots.push(slot);
        }

        slots.extend((stage.viewports.len()..slot_count).map(ViewportSlot::empty));
        ViewportAssignment::from_slots(slots)
    }

    fn fill_slot<A>(
        &self,
        index: usize,
        viewport: &Viewport,
        study: &Study,
        ctx: &MatchContext<'_>,
        available: A,
    ) -> ViewportSlot
    where
        A: Fn(&DisplaySet) -> bool,
    {
        let series_results = score_each(&study.series, self.parallel, |series| {
            self.scorer
                .score(&viewport.series_matching_rules, &Target::Series(series), ctx)
        });

        let ranked: Vec<usize> = self
            .ranker
            .rank_with(&series_results, |i| study.series[i].series_number())
            .into_iter()
            .filter(|&i| study.series[i].display_sets.iter().any(&available))
            .collect();

        let Some(&chosen) = ranked.get(viewport.match_index) else {
            return ViewportSlot::empty(index);
        };
        let series = &study.series[chosen];

        let candidates: Vec<&DisplaySet> = series
            .display_sets
            .iter()
            .filter(|ds| available(*ds))
            .collect();
        let ordered = match &viewport.image_matching_rules {
            Some(rules) => self.order_by_images(rules, &candidates, viewport.sort, ctx),
            None => self.order_unscored(&candidates, viewport.sort),
        };

        let take = match viewport.match_mode {
            MatchMode::Single => 1,
            MatchMode::Multiple => ordered.len(),
        };

        ViewportSlot {
            viewport_index: index,
            series_instance_uid: Some(series.series_instance_uid.clone()),
            display_set_instance_uids: ordered
                .into_iter()
                .take(take)
                .map(|ds| ds.display_set_instance_uid.clone())
                .collect(),
            score: series_results[chosen].score,
        }
    }

    /// Qualifying display sets ordered by `sort`. A display set's result is
    /// that of its best qualifying image; only images with pixel data count.
    fn order_by_images<'s>(
        &self,
        rules: &[Rule],
        candidates: &[&'s DisplaySet],
        sort: ViewportSort,
        ctx: &MatchContext<'_>,
    ) -> Vec<&'s DisplaySet> {
        let results: Vec<MatchResult> = candidates
            .iter()
            .map(|ds| self.best_image(rules, ds, ctx))
            .collect();

        match sort {
            ViewportSort::Score => self
                .ranker
                .rank(&results)
                .into_iter()
                .map(|i| candidates[i])
                .collect(),
            ViewportSort::InstanceNumber => {
                let qualifying: Vec<&DisplaySet> = candidates
                    .iter()
                    .zip(&results)
                    .filter(|(_, result)| result.qualifies())
                    .map(|(ds, _)| *ds)
                    .collect();
                by_instance_number(qualifying)
            }
        }
    }

    fn order_unscored<'s>(&self, candidates: &[&'s DisplaySet], sort: ViewportSort) -> Vec<&'s DisplaySet> {
        match sort {
            ViewportSort::Score => candidates.to_vec(),
            ViewportSort::InstanceNumber => by_instance_number(candidates.to_vec()),
        }
    }

    fn best_image(&self, rules: &[Rule], display_set: &DisplaySet, ctx: &MatchContext<'_>) -> MatchResult {
        let results: Vec<MatchResult> = display_set
            .images
            .iter()
            .filter(|image| image.has_image_data())
            .map(|image| self.scorer.score(rules, &Target::Image(image), ctx))
            .collect();

        match self.ranker.best(&results) {
            Some(i) => results[i].clone(),
            None => MatchResult {
                required_failed: true,
                ..MatchResult::default()
            },
        }
    }
}

/// Stable ascending sort by first-image `InstanceNumber`; display sets
/// without one go last.
fn by_instance_number(mut display_sets: Vec<&DisplaySet>) -> Vec<&DisplaySet> {
    display_sets.sort_by(|a, b| match (a.first_instance_number(), b.first_instance_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    display_sets
}
