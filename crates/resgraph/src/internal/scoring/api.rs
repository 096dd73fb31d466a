use std::collections::BTreeMap;

use crate::internal::scoring::evals::{EvalGroup, Evals};
use crate::internal::scoring::fold::Fold;
use crate::{SubsystemId, TypeKey};

/// Per-vertex evaluation state of one traversal step: candidate groups of each
/// (subsystem, type), plus the score and available amount handed to the parent.
#[derive(Debug, Clone, Default)]
pub struct ScoringApi {
    evals: BTreeMap<(SubsystemId, TypeKey), Evals>,
    hier_constrain_now: bool,
    overall_score: i64,
    avail: i64,
}

impl ScoringApi {
    pub fn add(&mut self, subsystem: SubsystemId, key: TypeKey, group: EvalGroup) -> i64 {
        self.evals.entry((subsystem, key)).or_default().add(group)
    }

    pub fn evals(&self, subsystem: SubsystemId, key: TypeKey) -> Option<&Evals> {
        self.evals.get(&(subsystem, key))
    }

    pub fn qualified_count(&self, subsystem: SubsystemId, key: TypeKey) -> i64 {
        self.evals(subsystem, key)
            .map(|evals| evals.qualified_count())
            .unwrap_or(0)
    }

    pub fn qualified_granules(&self, subsystem: SubsystemId, key: TypeKey) -> usize {
        self.evals(subsystem, key)
            .map(|evals| evals.qualified_granules())
            .unwrap_or(0)
    }

    pub fn total_count(&self, subsystem: SubsystemId, key: TypeKey) -> i64 {
        self.evals(subsystem, key)
            .map(|evals| evals.total_count())
            .unwrap_or(0)
    }

    pub fn best_k(&self, subsystem: SubsystemId, key: TypeKey) -> i64 {
        self.evals(subsystem, key)
            .map(|evals| evals.best_k())
            .unwrap_or(0)
    }

    pub fn best_i(&self, subsystem: SubsystemId, key: TypeKey) -> usize {
        self.evals(subsystem, key)
            .map(|evals| evals.best_i())
            .unwrap_or(0)
    }

    /// Selects the best `k` units of the type and returns the accumulated score of the
    /// selection. Marks the evaluation as hierarchically constrained.
    pub fn choose_accum_best_k(
        &mut self,
        subsystem: SubsystemId,
        key: TypeKey,
        k: i64,
        fold: Fold,
    ) -> Option<i64> {
        let evals = self.evals.entry((subsystem, key)).or_default();
        evals.choose_best_k(k, fold)?;
        self.hier_constrain_now = true;
        Some(evals.accum_best_k())
    }

    pub fn choose_accum_all(&mut self, subsystem: SubsystemId, key: TypeKey, fold: Fold) -> i64 {
        let evals = self.evals.entry((subsystem, key)).or_default();
        self.hier_constrain_now = true;
        evals.choose_accum_all(fold)
    }

    /// Keys with at least one candidate group in the subsystem.
    pub fn resource_types(&self, subsystem: SubsystemId) -> Vec<TypeKey> {
        self.evals
            .keys()
            .filter(|(s, _)| *s == subsystem)
            .map(|(_, key)| *key)
            .collect()
    }

    pub fn subsystems(&self) -> Vec<SubsystemId> {
        let mut subsystems: Vec<SubsystemId> = self.evals.keys().map(|(s, _)| *s).collect();
        subsystems.dedup();
        subsystems
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(SubsystemId, TypeKey), &Evals)> {
        self.evals.iter()
    }

    pub fn merge(&mut self, other: ScoringApi) {
        for (key, evals) in other.evals {
            self.evals.entry(key).or_default().merge(evals);
        }
    }

    #[inline]
    pub fn hier_constrain_now(&self) -> bool {
        self.hier_constrain_now
    }

    #[inline]
    pub fn overall_score(&self) -> i64 {
        self.overall_score
    }

    #[inline]
    pub fn set_overall_score(&mut self, score: i64) {
        self.overall_score = score;
    }

    #[inline]
    pub fn avail(&self) -> i64 {
        self.avail
    }

    #[inline]
    pub fn set_avail(&mut self, avail: i64) {
        self.avail = avail;
    }
}
