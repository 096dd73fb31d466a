use smallvec::SmallVec;

use crate::internal::common::error::RgError;
use crate::internal::common::{Map, Set};
use crate::internal::graph::{PoolStatus, ResourceGraph, ResourcePool, X_CHECKER_NJOBS};
use crate::internal::jobspec::Exclusivity;
use crate::internal::policy::{MatchPolicy, SubsystemSelector};
use crate::internal::scoring::{EvalEdge, EvalGroup, MATCH_MET, ScoringApi};
use crate::internal::traverser::meta::{CancelToken, JobMeta};
use crate::internal::traverser::primed::SpecNode;
use crate::{EdgeId, SubsystemId, TypeKey, VertexId};

/// What the commit does with a selected edge's target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct EdgeMark {
    pub needs: i64,
    pub exclusive: bool,
    pub leaf: bool,
}

/// Outcome of a successful search: the edges to follow from the root and what to take
/// from their targets. Holds no references into the graph.
#[derive(Debug, Clone)]
pub struct Selection {
    pub(crate) root: VertexId,
    pub(crate) root_mark: EdgeMark,
    pub(crate) marks: Map<EdgeId, EdgeMark>,
    pub(crate) score: i64,
}

impl Selection {
    #[inline]
    pub fn root(&self) -> VertexId {
        self.root
    }

    #[inline]
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Number of selected edges below the root.
    pub fn edge_count(&self) -> usize {
        self.marks.len()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MatchKind {
    Resource,
    Slot,
    /// Nothing matched yet; the vertex is passed through.
    PristineNone,
}

struct Frame<'a> {
    vertex: VertexId,
    via: Option<EdgeId>,
    next: &'a [SpecNode<'a>],
    matched: Option<&'a SpecNode<'a>>,
    kind: MatchKind,
    pristine: bool,
    x_in: bool,
    child_excl: bool,
    dfu: ScoringApi,
    slot_dfu: ScoringApi,
    edge_index: usize,
}

/// Result of a finished vertex, handed to its parent.
struct Outcome {
    vertex: VertexId,
    via: Option<EdgeId>,
    score: i64,
    avail: i64,
    exclusive: bool,
    leaf: bool,
    merged: Option<ScoringApi>,
}

/// State of one depth-first search. Lives only for a single select call.
pub(crate) struct Search<'g> {
    graph: &'g ResourceGraph,
    policy: &'g dyn MatchPolicy,
    dom: SubsystemId,
    dom_selector: &'g SubsystemSelector,
    aux: &'g [(SubsystemId, SubsystemSelector)],
    meta: JobMeta,
    cancel: Option<&'g CancelToken>,
    marks: Map<EdgeId, EdgeMark>,
    visited: Set<VertexId>,
}

impl<'g> Search<'g> {
    pub fn new(
        graph: &'g ResourceGraph,
        policy: &'g dyn MatchPolicy,
        dom: (SubsystemId, &'g SubsystemSelector),
        aux: &'g [(SubsystemId, SubsystemSelector)],
        meta: JobMeta,
        cancel: Option<&'g CancelToken>,
    ) -> Self {
        Search {
            graph,
            policy,
            dom: dom.0,
            dom_selector: dom.1,
            aux,
            meta,
            cancel,
            marks: Map::default(),
            visited: Set::default(),
        }
    }

    fn check_cancelled(&self) -> crate::Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(RgError::Cancelled),
            _ => Ok(()),
        }
    }

    fn pool(&self, vertex: VertexId) -> crate::Result<&'g ResourcePool> {
        self.graph
            .pool(vertex)
            .ok_or_else(|| RgError::GraphError(format!("unknown pool {vertex}")))
    }

    /// Free units of the pool during the window; its size in satisfiability mode.
    fn pool_avail(&self, pool: &ResourcePool) -> crate::Result<i64> {
        if self.meta.satisfiability {
            Ok(pool.size())
        } else {
            pool.planner()
                .avail_resources_during(self.meta.at, self.meta.duration)
        }
    }

    fn usable(&self, pool: &ResourcePool) -> crate::Result<bool> {
        if !self.meta.satisfiability && pool.status() != PoolStatus::Up {
            return Ok(false);
        }
        Ok(self.pool_avail(pool)? > 0)
    }

    fn dom_targets(&self, vertex: VertexId) -> impl Iterator<Item = (EdgeId, VertexId)> + '_ {
        self.graph
            .out_edges(vertex, self.dom)
            .iter()
            .filter_map(|edge| {
                self.graph
                    .relation(*edge)
                    .filter(|relation| self.dom_selector.accepts(&relation.relation))
                    .map(|relation| (*edge, relation.target))
            })
    }

    /// Searches the subtree of `root`. Returns `None` when the specification does not fit.
    pub fn run<'a>(
        &mut self,
        root: VertexId,
        resources: &'a [SpecNode<'a>],
    ) -> crate::Result<Option<Selection>> {
        self.marks.clear();
        self.visited.clear();
        let Some(outcome) = self.dom_dfv(root, resources)? else {
            return Ok(None);
        };
        let dom = self.dom;
        let root_key = TypeKey::Resource(self.pool(root)?.type_id());
        let mut dfu = outcome.merged.unwrap_or_default();
        let root_edge = EvalEdge {
            edge: None,
            target: root,
            count: outcome.avail,
            needs: outcome.avail,
            exclusive: outcome.exclusive,
            leaf: outcome.leaf,
        };
        let mut root_group = EvalGroup::single(outcome.score, root_edge);
        root_group.root = true;
        dfu.add(dom, root_key, root_group);

        let fold = self.policy.root_fold();
        for resource in resources {
            let qualified = dfu.qualified_count(dom, resource.key);
            let count = resource.spec.count.calc_count(qualified);
            if count == 0 {
                log::trace!(
                    "Top level {} needs {}, {qualified} qualified",
                    resource.spec.resource_type,
                    resource.spec.count
                );
                return Ok(None);
            }
            dfu.choose_accum_best_k(dom, resource.key, count, fold);
        }

        let mut needs = 1;
        for resource in resources.iter().filter(|r| r.key == root_key) {
            let count = resource.spec.count.calc_count(outcome.avail);
            if count == 0 {
                return Ok(None);
            }
            needs = count;
        }

        for key in dfu.resource_types(dom) {
            if dfu.qualified_count(dom, key) == 0 {
                return Ok(None);
            }
            if dfu.best_k(dom, key) == 0 {
                dfu.choose_accum_all(dom, key, fold);
            }
        }
        self.enforce(&dfu);

        Ok(Some(Selection {
            root,
            root_mark: EdgeMark {
                needs,
                exclusive: outcome.exclusive,
                leaf: outcome.leaf,
            },
            marks: std::mem::take(&mut self.marks),
            score: outcome.score,
        }))
    }

    fn dom_dfv<'a>(
        &mut self,
        root: VertexId,
        resources: &'a [SpecNode<'a>],
    ) -> crate::Result<Option<Outcome>> {
        let mut stack: Vec<Frame<'a>> = Vec::new();
        match self.enter(root, None, resources, true, false)? {
            Some(frame) => stack.push(frame),
            None => return Ok(None),
        }
        while let Some(frame) = stack.last_mut() {
            self.check_cancelled()?;
            if let Some((edge, target)) = self.next_child(frame) {
                let (next, pristine, excl) = (frame.next, frame.pristine, frame.child_excl);
                if let Some(child) = self.enter(target, Some(edge), next, pristine, excl)? {
                    stack.push(child);
                }
                continue;
            }
            let Some(frame) = stack.pop() else {
                break;
            };
            let outcome = self.finish(frame)?;
            match (stack.last_mut(), outcome) {
                (Some(parent), Some(outcome)) => self.absorb(parent, outcome)?,
                (Some(_), None) => {}
                (None, outcome) => return Ok(outcome),
            }
        }
        Ok(None)
    }

    fn next_child(&self, frame: &mut Frame<'_>) -> Option<(EdgeId, VertexId)> {
        if self.enough_found(frame) {
            return None;
        }
        let edges = self.graph.out_edges(frame.vertex, self.dom);
        while frame.edge_index < edges.len() {
            let edge = edges[frame.edge_index];
            frame.edge_index += 1;
            let Some(relation) = self.graph.relation(edge) else {
                continue;
            };
            if self.dom_selector.accepts(&relation.relation)
                && !self.visited.contains(&relation.target)
            {
                return Some((edge, relation.target));
            }
        }
        None
    }

    /// Early stop for policies that take the first sufficient set of children.
    fn enough_found(&self, frame: &Frame<'_>) -> bool {
        self.policy.stop_on_first_match()
            && frame.kind != MatchKind::Slot
            && !frame.next.is_empty()
            && frame.next.iter().all(|spec| {
                frame.dfu.qualified_count(self.dom, spec.key) >= i64::from(spec.spec.count.min)
            })
    }

    fn test<'a>(
        &self,
        pool: &ResourcePool,
        resources: &'a [SpecNode<'a>],
        pristine: bool,
    ) -> (Option<MatchKind>, &'a [SpecNode<'a>], Option<&'a SpecNode<'a>>) {
        let type_key = TypeKey::Resource(pool.type_id());
        let mut matched = None;
        let mut slot = None;
        for resource in resources {
            if resource.key == type_key {
                matched = Some(resource);
                slot = resource.with.iter().find(|c| c.key == TypeKey::Slot);
                break;
            }
            if resource.key == TypeKey::Slot {
                slot = Some(resource);
                break;
            }
        }
        if let Some(slot) = slot.filter(|slot| self.slot_match(pool.uniq_id(), slot)) {
            return (Some(MatchKind::Slot), slot.with.as_slice(), matched);
        }
        if let Some(resource) = matched {
            return (Some(MatchKind::Resource), resource.with.as_slice(), matched);
        }
        let kind = pristine.then_some(MatchKind::PristineNone);
        (kind, resources, None)
    }

    /// Every type of the slot shape is directly below the vertex.
    fn slot_match(&self, vertex: VertexId, slot: &SpecNode<'_>) -> bool {
        slot.with.iter().all(|shape| {
            self.dom_targets(vertex).any(|(_, target)| {
                self.graph
                    .pool(target)
                    .is_some_and(|pool| TypeKey::Resource(pool.type_id()) == shape.key)
            })
        })
    }

    fn enter<'a>(
        &mut self,
        vertex: VertexId,
        via: Option<EdgeId>,
        resources: &'a [SpecNode<'a>],
        pristine: bool,
        excl_in: bool,
    ) -> crate::Result<Option<Frame<'a>>> {
        let pool = self.pool(vertex)?;
        let (kind, next, matched) = self.test(pool, resources, pristine);
        let Some(kind) = kind else {
            return Ok(None);
        };
        let requested = matched.is_some_and(|m| m.spec.exclusive == Exclusivity::Exclusive);
        let x_req = excl_in || requested;
        let x_in = x_req || pool.is_exclusive();
        if !self.prune(pool, x_req, x_in, resources)? {
            return Ok(None);
        }
        if let Some(resource) = matched {
            if !self.policy.is_admissible(pool, resource.spec) {
                return Ok(None);
            }
        }
        if !self.aux_feasible(vertex)? {
            return Ok(None);
        }
        self.visited.insert(vertex);
        Ok(Some(Frame {
            vertex,
            via,
            next,
            matched,
            kind,
            pristine: pristine && kind == MatchKind::PristineNone,
            x_in,
            child_excl: kind == MatchKind::Slot || x_in,
            dfu: ScoringApi::default(),
            slot_dfu: ScoringApi::default(),
            edge_index: 0,
        }))
    }

    fn prune(
        &self,
        pool: &ResourcePool,
        x_req: bool,
        x_in: bool,
        resources: &[SpecNode<'_>],
    ) -> crate::Result<bool> {
        if !self.usable(pool)? {
            return Ok(false);
        }
        let type_key = TypeKey::Resource(pool.type_id());
        let mut check_x = pool.is_exclusive();
        for resource in resources.iter().filter(|r| r.key == type_key) {
            if resource.spec.exclusive == Exclusivity::Shared {
                if x_req {
                    return Err(RgError::InvalidSpecification(format!(
                        "shared '{}' requested inside an exclusive resource at {}",
                        resource.spec.resource_type,
                        pool.name()
                    )));
                }
                if pool.is_exclusive() {
                    return Ok(false);
                }
            }
            check_x |= x_in || resource.spec.exclusive == Exclusivity::Exclusive;
            if !self.by_subplan(pool, resource)? {
                return Ok(false);
            }
        }
        if check_x && !self.meta.satisfiability {
            let free = pool
                .x_checker()
                .avail_resources_during(self.meta.at, self.meta.duration)?;
            if free < X_CHECKER_NJOBS {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Subtree aggregates have to cover the minimum the node asks for below it.
    fn by_subplan(&self, pool: &ResourcePool, resource: &SpecNode<'_>) -> crate::Result<bool> {
        let Some(plan) = pool.subtree_planner(self.dom) else {
            return Ok(true);
        };
        let request = resource.aggregates_for(plan.resource_types());
        if request.iter().all(|count| *count == 0) {
            return Ok(true);
        }
        if self.meta.satisfiability {
            return Ok(request
                .iter()
                .enumerate()
                .all(|(i, count)| plan.resource_total_at(i).unwrap_or(0) >= *count));
        }
        plan.avail_during(self.meta.at, self.meta.duration, &request)
    }

    /// For every auxiliary subsystem the vertex takes part in, some chain of usable
    /// pools has to lead from it to a terminal pool.
    fn aux_feasible(&self, vertex: VertexId) -> crate::Result<bool> {
        for (subsystem, selector) in self.aux {
            let targets = |v: VertexId| -> SmallVec<[VertexId; 4]> {
                self.graph
                    .out_edges(v, *subsystem)
                    .iter()
                    .filter_map(|edge| self.graph.relation(*edge))
                    .filter(|relation| selector.accepts(&relation.relation))
                    .map(|relation| relation.target)
                    .collect()
            };
            let mut stack = targets(vertex);
            if stack.is_empty() {
                continue;
            }
            let mut seen: Set<VertexId> = Set::default();
            let mut found = false;
            while let Some(current) = stack.pop() {
                if !seen.insert(current) || !self.usable(self.pool(current)?)? {
                    continue;
                }
                let next = targets(current);
                if next.is_empty() {
                    found = true;
                    break;
                }
                stack.extend(next);
            }
            if !found {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn absorb(&self, parent: &mut Frame<'_>, outcome: Outcome) -> crate::Result<()> {
        let Outcome {
            vertex,
            via,
            score,
            avail,
            exclusive,
            leaf,
            merged,
        } = outcome;
        let key = TypeKey::Resource(self.pool(vertex)?.type_id());
        let dfu = if parent.kind == MatchKind::Slot {
            &mut parent.slot_dfu
        } else {
            &mut parent.dfu
        };
        if let Some(merged) = merged {
            dfu.merge(merged);
        }
        let edge = EvalEdge {
            edge: via,
            target: vertex,
            count: avail,
            needs: avail,
            exclusive,
            leaf,
        };
        dfu.add(self.dom, key, EvalGroup::single(score, edge));
        Ok(())
    }

    fn finish(&mut self, frame: Frame<'_>) -> crate::Result<Option<Outcome>> {
        let Frame {
            vertex,
            via,
            next,
            matched,
            kind,
            x_in,
            mut dfu,
            slot_dfu,
            ..
        } = frame;
        let pool = self.pool(vertex)?;
        if kind == MatchKind::Slot {
            self.dom_slot(vertex, next, slot_dfu, &mut dfu);
        }
        let avail = self.pool_avail(pool)?;
        if avail <= 0 {
            return Ok(None);
        }

        if let Some(resource) = matched {
            for child in &resource.with {
                let qualified = dfu.qualified_count(self.dom, child.key);
                let count = child.spec.count.calc_count(qualified);
                if count == 0 {
                    log::trace!(
                        "{} lacks {} (needs {}, {qualified} qualified)",
                        pool.name(),
                        child.spec.resource_type,
                        child.spec.count
                    );
                    return Ok(None);
                }
                dfu.choose_accum_best_k(self.dom, child.key, count, self.policy.fold());
            }
        }
        let score = MATCH_MET + self.policy.score(pool, matched.map(|m| m.spec)).max(0);
        dfu.set_overall_score(score);
        dfu.set_avail(avail);

        let merged = if dfu.hier_constrain_now() {
            self.enforce(&dfu);
            None
        } else {
            Some(dfu)
        };
        Ok(Some(Outcome {
            vertex,
            via,
            score,
            avail,
            exclusive: x_in,
            leaf: kind == MatchKind::Resource && matched.is_some_and(|m| m.with.is_empty()),
            merged,
        }))
    }

    /// Turns the children found below a slot host into whole slots.
    fn dom_slot(
        &self,
        vertex: VertexId,
        shape: &[SpecNode<'_>],
        mut slot_dfu: ScoringApi,
        dfu: &mut ScoringApi,
    ) {
        let dom = self.dom;
        let fold = self.policy.fold();
        for key in slot_dfu.resource_types(dom) {
            slot_dfu.choose_accum_all(dom, key, fold);
        }

        // The most constrained element decides, both by amount and by granularity.
        let mut slots = if shape.is_empty() { 0 } else { i64::MAX };
        for element in shape {
            let qualified = slot_dfu.qualified_count(dom, element.key);
            let granules = slot_dfu.qualified_granules(dom, element.key) as i64;
            let count = element.spec.count.calc_count(qualified);
            let fit = if count == 0 { 0 } else { qualified / count };
            slots = slots.min(fit.min(granules));
        }

        let mut cursors: Map<TypeKey, usize> = Map::default();
        for _ in 0..slots {
            let mut group = EvalGroup {
                score: MATCH_MET,
                count: 1,
                needs: 0,
                exclusive: true,
                root: false,
                candidate: vertex,
                edges: SmallVec::new(),
            };
            for element in shape {
                let Some(evals) = slot_dfu.evals(dom, element.key) else {
                    continue;
                };
                let count = element.spec.count.calc_count(evals.qualified_count());
                let cursor = cursors.entry(element.key).or_insert(0);
                let mut taken = 0;
                while taken < count {
                    let Some(member) = evals.selected().get(*cursor) else {
                        break;
                    };
                    *cursor += 1;
                    for edge in &member.edges {
                        taken += edge.count;
                        group.edges.push(EvalEdge {
                            needs: edge.count,
                            exclusive: true,
                            ..edge.clone()
                        });
                    }
                    group.score = group.score.saturating_add(member.score);
                }
            }
            if let Some(first) = group.edges.first() {
                group.candidate = first.target;
            }
            dfu.add(dom, TypeKey::Slot, group);
        }
    }

    /// Records the edges of every selected group.
    fn enforce(&mut self, dfu: &ScoringApi) {
        for (_, evals) in dfu.iter() {
            for group in evals.selected().iter().filter(|group| !group.root) {
                for edge in &group.edges {
                    if let Some(id) = edge.edge {
                        self.marks.insert(
                            id,
                            EdgeMark {
                                needs: edge.needs,
                                exclusive: edge.exclusive,
                                leaf: edge.leaf,
                            },
                        );
                    }
                }
            }
        }
    }
}
