use smallvec::SmallVec;

use crate::internal::scoring::fold::Fold;
use crate::{EdgeId, VertexId};

/// Edge leading to a candidate vertex, with what will be taken from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalEdge {
    /// `None` for the virtual edge leading into a subsystem root.
    pub edge: Option<EdgeId>,
    pub target: VertexId,
    pub count: i64,
    pub needs: i64,
    pub exclusive: bool,
    /// The target matched a specification node without children.
    pub leaf: bool,
}

/// One schedulable unit among the candidates of a resource type: a single child vertex,
/// or all vertices forming one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalGroup {
    pub score: i64,
    pub count: i64,
    pub needs: i64,
    pub exclusive: bool,
    pub root: bool,
    pub candidate: VertexId,
    pub edges: SmallVec<[EvalEdge; 1]>,
}

impl EvalGroup {
    pub fn single(score: i64, edge: EvalEdge) -> Self {
        EvalGroup {
            score,
            count: edge.count,
            needs: 0,
            exclusive: edge.exclusive,
            root: false,
            candidate: edge.target,
            edges: smallvec::smallvec![edge],
        }
    }
}

/// Candidate groups of one resource type and the selection made among them.
#[derive(Debug, Clone, Default)]
pub struct Evals {
    groups: Vec<EvalGroup>,
    cutline: i64,
    qual_count: i64,
    total_count: i64,
    best_k: i64,
    best_i: usize,
}

impl Evals {
    /// Adds a group; returns the new qualified count.
    pub fn add(&mut self, group: EvalGroup) -> i64 {
        self.total_count += group.count;
        if group.score > self.cutline {
            self.qual_count += group.count;
        }
        self.groups.push(group);
        self.qual_count
    }

    #[inline]
    pub fn qualified_count(&self) -> i64 {
        self.qual_count
    }

    /// Number of qualified groups; the granularity at which the type can be handed out.
    pub fn qualified_granules(&self) -> usize {
        self.groups
            .iter()
            .filter(|group| group.score > self.cutline)
            .count()
    }

    #[inline]
    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    #[inline]
    pub fn cutline(&self) -> i64 {
        self.cutline
    }

    #[inline]
    pub fn best_k(&self) -> i64 {
        self.best_k
    }

    #[inline]
    pub fn best_i(&self) -> usize {
        self.best_i
    }

    pub fn groups(&self) -> &[EvalGroup] {
        &self.groups
    }

    /// Groups picked by the last selection.
    pub fn selected(&self) -> &[EvalGroup] {
        &self.groups[..self.best_i]
    }

    fn sort(&mut self, fold: Fold) {
        let cutline = self.cutline;
        let (mut qualified, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.groups)
            .into_iter()
            .partition(|group| group.score > cutline);
        let items: Vec<(i64, VertexId)> = qualified
            .iter()
            .map(|group| (group.score, group.candidate))
            .collect();
        let order = fold.rank(&items);
        let mut slots: Vec<Option<EvalGroup>> = qualified.drain(..).map(Some).collect();
        self.groups = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .chain(rest)
            .collect();
    }

    fn assign_edge_needs(group: &mut EvalGroup) {
        if group.exclusive {
            for edge in group.edges.iter_mut() {
                edge.needs = edge.count;
            }
        } else if group.edges.len() == 1 {
            group.edges[0].needs = group.needs;
        }
    }

    /// Picks the best groups until `k` units are covered. Returns the number of groups
    /// picked, or `None` when fewer than `k` qualified units exist.
    pub fn choose_best_k(&mut self, k: i64, fold: Fold) -> Option<usize> {
        if k <= 0 || k > self.qual_count {
            return None;
        }
        self.sort(fold);
        let mut remaining = k;
        let mut i = 0;
        while remaining > 0 {
            let group = &mut self.groups[i];
            group.needs = remaining.min(group.count);
            Self::assign_edge_needs(group);
            remaining -= group.count;
            i += 1;
        }
        self.best_k = k;
        self.best_i = i;
        Some(i)
    }

    /// Sum of the scores of the selected groups.
    pub fn accum_best_k(&self) -> i64 {
        self.selected()
            .iter()
            .fold(0i64, |acc, group| acc.saturating_add(group.score))
    }

    /// Selects every qualified group in full and returns the sum of their scores.
    pub fn choose_accum_all(&mut self, fold: Fold) -> i64 {
        self.sort(fold);
        let cutline = self.cutline;
        let mut best_i = 0;
        let mut total = 0i64;
        let mut k = 0;
        for group in self.groups.iter_mut().filter(|g| g.score > cutline) {
            group.needs = group.count;
            Self::assign_edge_needs(group);
            total = total.saturating_add(group.score);
            k += group.count;
            best_i += 1;
        }
        self.best_k = k;
        self.best_i = best_i;
        total
    }

    pub fn merge(&mut self, other: Evals) {
        self.qual_count += other.qual_count;
        self.total_count += other.total_count;
        self.groups.extend(other.groups);
    }
}
