use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::VertexId;

/// How scores of candidates are combined and ranked.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fold {
    /// Values are added; higher totals are preferred.
    Sum,
    /// Lowest value is kept and preferred.
    #[default]
    Less,
    /// Highest value is kept and preferred.
    Greater,
    /// Like `Less`, but candidates whose scores form a contiguous run are ranked first.
    IntervalLess,
    /// Like `Greater`, but candidates whose scores form a contiguous run are ranked first.
    IntervalGreater,
}

impl Fold {
    pub fn combine(&self, current: i64, value: i64) -> i64 {
        match self {
            Fold::Sum => current.saturating_add(value),
            Fold::Less | Fold::IntervalLess => current.min(value),
            Fold::Greater | Fold::IntervalGreater => current.max(value),
        }
    }

    #[inline]
    fn prefers_low(&self) -> bool {
        matches!(self, Fold::Less | Fold::IntervalLess)
    }

    #[inline]
    pub fn is_interval(&self) -> bool {
        matches!(self, Fold::IntervalLess | Fold::IntervalGreater)
    }

    /// Order of two scores, the preferred one first.
    pub fn compare(&self, a: i64, b: i64) -> Ordering {
        if self.prefers_low() { a.cmp(&b) } else { b.cmp(&a) }
    }

    /// Returns the positions of `items` from the most to the least preferred.
    /// Ties are broken by the candidate id.
    pub fn rank(&self, items: &[(i64, VertexId)]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..items.len()).collect();
        if !self.is_interval() {
            order.sort_by(|&a, &b| {
                self.compare(items[a].0, items[b].0)
                    .then(items[a].1.cmp(&items[b].1))
            });
            return order;
        }

        order.sort_by_key(|&i| (items[i].0, items[i].1));
        // (run length, run start, run end) for every item
        let mut runs = vec![(0usize, 0i64, 0i64); items.len()];
        let mut begin = 0;
        while begin < order.len() {
            let mut end = begin + 1;
            while end < order.len()
                && items[order[end]].0 <= items[order[end - 1]].0.saturating_add(1)
            {
                end += 1;
            }
            let run = (end - begin, items[order[begin]].0, items[order[end - 1]].0);
            for &i in &order[begin..end] {
                runs[i] = run;
            }
            begin = end;
        }
        let low = self.prefers_low();
        order.sort_by(|&a, &b| {
            let (len_a, start_a, end_a) = runs[a];
            let (len_b, start_b, end_b) = runs[b];
            let position = if low {
                start_a.cmp(&start_b)
            } else {
                end_b.cmp(&end_a)
            };
            len_b
                .cmp(&len_a)
                .then(position)
                .then(self.compare(items[a].0, items[b].0))
                .then(items[a].1.cmp(&items[b].1))
        });
        order
    }
}

/// Per-match score aggregates of candidates.
#[derive(Debug, Clone, Default)]
pub struct ScoreAccumulator {
    fold: Fold,
    scores: BTreeMap<VertexId, i64>,
}

impl ScoreAccumulator {
    pub fn new(fold: Fold) -> Self {
        ScoreAccumulator {
            fold,
            scores: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn fold(&self) -> Fold {
        self.fold
    }

    pub fn accumulate(&mut self, candidate: VertexId, value: i64) {
        let fold = self.fold;
        self.scores
            .entry(candidate)
            .and_modify(|score| *score = fold.combine(*score, value))
            .or_insert(value);
    }

    pub fn get(&self, candidate: VertexId) -> Option<i64> {
        self.scores.get(&candidate).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn total(&self) -> i64 {
        self.scores
            .values()
            .fold(0i64, |acc, score| acc.saturating_add(*score))
    }

    /// The most preferred of the given candidates that have a score.
    pub fn best_of(&self, candidates: impl IntoIterator<Item = VertexId>) -> Option<VertexId> {
        let items: Vec<(i64, VertexId)> = candidates
            .into_iter()
            .filter_map(|c| self.get(c).map(|score| (score, c)))
            .collect();
        self.fold.rank(&items).first().map(|&i| items[i].1)
    }

    pub fn best(&self) -> Option<VertexId> {
        self.best_of(self.scores.keys().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u32) -> VertexId {
        VertexId::new(id)
    }

    #[test]
    fn accumulate_per_fold() {
        let mut sum = ScoreAccumulator::new(Fold::Sum);
        let mut less = ScoreAccumulator::new(Fold::Less);
        let mut greater = ScoreAccumulator::new(Fold::Greater);
        for value in [5, 2, 9] {
            sum.accumulate(v(1), value);
            less.accumulate(v(1), value);
            greater.accumulate(v(1), value);
        }
        assert_eq!(sum.get(v(1)), Some(16));
        assert_eq!(less.get(v(1)), Some(2));
        assert_eq!(greater.get(v(1)), Some(9));
        assert_eq!(sum.get(v(2)), None);
    }

    #[test]
    fn best_of_breaks_ties_by_id() {
        let mut acc = ScoreAccumulator::new(Fold::Greater);
        acc.accumulate(v(7), 3);
        acc.accumulate(v(2), 3);
        acc.accumulate(v(4), 1);
        assert_eq!(acc.best(), Some(v(2)));
        assert_eq!(acc.best_of([v(4), v(7)]), Some(v(7)));
        assert_eq!(acc.best_of([v(9)]), None);
        assert_eq!(acc.total(), 7);
    }

    #[test]
    fn less_prefers_low_scores() {
        let items = [(4, v(0)), (1, v(1)), (3, v(2)), (1, v(3))];
        assert_eq!(Fold::Less.rank(&items), vec![1, 3, 2, 0]);
        assert_eq!(Fold::Greater.rank(&items), vec![0, 2, 1, 3]);
    }

    #[test]
    fn interval_prefers_long_runs() {
        // runs: {1, 2, 3}, {7, 8}, {20}
        let items = [
            (20, v(0)),
            (7, v(1)),
            (2, v(2)),
            (8, v(3)),
            (1, v(4)),
            (3, v(5)),
        ];
        let greater: Vec<i64> = Fold::IntervalGreater
            .rank(&items)
            .into_iter()
            .map(|i| items[i].0)
            .collect();
        assert_eq!(greater, vec![3, 2, 1, 8, 7, 20]);
        let less: Vec<i64> = Fold::IntervalLess
            .rank(&items)
            .into_iter()
            .map(|i| items[i].0)
            .collect();
        assert_eq!(less, vec![1, 2, 3, 7, 8, 20]);
    }

    #[test]
    fn interval_equal_runs_ordered_by_position() {
        let items = [(1, v(0)), (2, v(1)), (10, v(2)), (11, v(3))];
        let first = Fold::IntervalGreater.rank(&items)[0];
        assert_eq!(items[first].0, 11);
        let first = Fold::IntervalLess.rank(&items)[0];
        assert_eq!(items[first].0, 1);
    }
}
