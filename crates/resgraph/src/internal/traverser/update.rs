use smallvec::SmallVec;

use crate::internal::common::error::RgError;
use crate::internal::common::{Map, Set};
use crate::internal::graph::{ResourceGraph, ResourcePool};
use crate::internal::policy::{PruneFilters, SubsystemSelector};
use crate::internal::traverser::meta::{JobMeta, MatchedPool};
use crate::internal::traverser::select::{EdgeMark, Selection};
use crate::{JobId, SpanId, SubsystemId, VertexId};

/// Change made by a commit; replayed backwards when a later step fails.
#[derive(Debug)]
enum Undo {
    Plan { vertex: VertexId, span: SpanId },
    Exclusivity { vertex: VertexId, span: SpanId },
    Subplan { vertex: VertexId, span: SpanId },
}

struct Step {
    vertex: VertexId,
    mark: EdgeMark,
    children: SmallVec<[(VertexId, EdgeMark); 4]>,
    index: usize,
    planned_below: usize,
    aggregates: Map<String, i64>,
}

/// Writes a selection into the planners of the graph.
pub(crate) struct Commit<'g> {
    graph: &'g mut ResourceGraph,
    dom: SubsystemId,
    selector: &'g SubsystemSelector,
    filters: &'g PruneFilters,
    job_id: JobId,
    meta: JobMeta,
    allocate: bool,
    undo: Vec<Undo>,
    pools: Vec<MatchedPool>,
}

fn pool_mut(graph: &mut ResourceGraph, vertex: VertexId) -> crate::Result<&mut ResourcePool> {
    graph
        .pool_mut(vertex)
        .ok_or_else(|| RgError::GraphError(format!("unknown pool {vertex}")))
}

impl<'g> Commit<'g> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'g mut ResourceGraph,
        dom: SubsystemId,
        selector: &'g SubsystemSelector,
        filters: &'g PruneFilters,
        job_id: JobId,
        meta: JobMeta,
        allocate: bool,
    ) -> Self {
        Commit {
            graph,
            dom,
            selector,
            filters,
            job_id,
            meta,
            allocate,
            undo: Vec::new(),
            pools: Vec::new(),
        }
    }

    /// Plans every marked pool. Either the whole selection is written or nothing is.
    pub fn apply(mut self, selection: &Selection) -> crate::Result<Vec<MatchedPool>> {
        let root = self
            .graph
            .pool(selection.root)
            .ok_or_else(|| RgError::GraphError(format!("unknown pool {}", selection.root)))?;
        if root.is_tagged(self.job_id) {
            return Err(RgError::InvalidArgument(format!(
                "job {} already holds resources",
                self.job_id
            )));
        }
        match self.walk(selection) {
            Ok(()) => {
                let mut pools = std::mem::take(&mut self.pools);
                pools.sort_by_key(|pool| pool.vertex);
                Ok(pools)
            }
            Err(error) => {
                self.rollback();
                Err(error)
            }
        }
    }

    fn step(&self, selection: &Selection, vertex: VertexId, mark: EdgeMark) -> Step {
        let children = self
            .graph
            .out_edges(vertex, self.dom)
            .iter()
            .filter_map(|edge| {
                let mark = selection.marks.get(edge)?;
                let relation = self.graph.relation(*edge)?;
                self.selector
                    .accepts(&relation.relation)
                    .then_some((relation.target, *mark))
            })
            .collect();
        Step {
            vertex,
            mark,
            children,
            index: 0,
            planned_below: 0,
            aggregates: Map::default(),
        }
    }

    fn walk(&mut self, selection: &Selection) -> crate::Result<()> {
        let mut visited: Set<VertexId> = Set::default();
        visited.insert(selection.root);
        let mut stack = vec![self.step(selection, selection.root, selection.root_mark)];
        while let Some(step) = stack.last_mut() {
            if step.index < step.children.len() {
                let (child, mark) = step.children[step.index];
                step.index += 1;
                if visited.insert(child) {
                    let next = self.step(selection, child, mark);
                    stack.push(next);
                }
                continue;
            }
            let Some(step) = stack.pop() else {
                break;
            };
            let (planned, aggregates) = self.plan_vertex(step)?;
            if let Some(parent) = stack.last_mut() {
                parent.planned_below += planned;
                for (resource_type, count) in aggregates {
                    *parent.aggregates.entry(resource_type).or_insert(0) += count;
                }
            }
        }
        Ok(())
    }

    /// Returns the number of planned pools in the subtree and the pruning type amounts
    /// consumed by it.
    fn plan_vertex(&mut self, step: Step) -> crate::Result<(usize, Map<String, i64>)> {
        let Step {
            vertex,
            mark,
            planned_below,
            mut aggregates,
            ..
        } = step;
        let (at, duration) = (self.meta.at, self.meta.duration);
        let (job_id, dom, allocate) = (self.job_id, self.dom, self.allocate);
        let pool = pool_mut(self.graph, vertex)?;

        let mut planned = planned_below;
        let mut consumed = 0;
        if mark.exclusive || mark.leaf {
            let amount = if mark.exclusive {
                pool.planner().avail_resources_during(at, duration)?
            } else {
                mark.needs
            };
            if amount > 0 {
                let span = pool.schedule.plans.add_span(at, duration, amount)?;
                if allocate {
                    pool.schedule.allocations.insert(job_id, span);
                } else {
                    pool.schedule.reservations.insert(job_id, span);
                }
                self.undo.push(Undo::Plan { vertex, span });
                consumed = amount;
                planned += 1;
            }
        }
        if planned == 0 {
            return Ok((0, Map::default()));
        }

        let span = pool.job_data.x_checker.add_span(at, duration, 1)?;
        pool.job_data.x_spans.insert(job_id, span);
        pool.job_data.tags.insert(job_id);
        self.undo.push(Undo::Exclusivity { vertex, span });

        if let Some(plan) = pool.job_data.subplans.get_mut(&dom) {
            let request: Vec<i64> = plan
                .resource_types()
                .map(|t| aggregates.get(t).copied().unwrap_or(0))
                .collect();
            if request.iter().any(|count| *count > 0) {
                let span = plan.add_span(at, duration, &request)?;
                pool.job_data.job2span.insert((dom, job_id), span);
                self.undo.push(Undo::Subplan { vertex, span });
            }
        }

        if consumed > 0 && self.filters.is_pruning_type(pool.resource_type()) {
            *aggregates
                .entry(pool.resource_type().to_string())
                .or_insert(0) += consumed;
        }
        self.pools.push(MatchedPool {
            vertex,
            name: pool.name().to_string(),
            resource_type: pool.resource_type().to_string(),
            count: consumed,
            exclusive: mark.exclusive,
        });
        Ok((planned, aggregates))
    }

    fn rollback(&mut self) {
        let (job_id, dom) = (self.job_id, self.dom);
        for undo in self.undo.drain(..).rev() {
            let (vertex, result) = match undo {
                Undo::Plan { vertex, span } => match self.graph.pool_mut(vertex) {
                    Some(pool) => {
                        pool.schedule.allocations.remove(&job_id);
                        pool.schedule.reservations.remove(&job_id);
                        (vertex, pool.schedule.plans.rem_span(span))
                    }
                    None => continue,
                },
                Undo::Exclusivity { vertex, span } => match self.graph.pool_mut(vertex) {
                    Some(pool) => {
                        pool.job_data.x_spans.remove(&job_id);
                        pool.job_data.tags.remove(&job_id);
                        (vertex, pool.job_data.x_checker.rem_span(span))
                    }
                    None => continue,
                },
                Undo::Subplan { vertex, span } => match self.graph.pool_mut(vertex) {
                    Some(pool) => {
                        pool.job_data.job2span.remove(&(dom, job_id));
                        match pool.job_data.subplans.get_mut(&dom) {
                            Some(plan) => (vertex, plan.rem_span(span)),
                            None => continue,
                        }
                    }
                    None => continue,
                },
            };
            if let Err(error) = result {
                log::error!("Rollback of job {job_id} on pool {vertex} failed: {error}");
            }
        }
    }
}

/// Drops everything the job holds in the subsystem. Returns the number of released pools.
pub(crate) fn remove(
    graph: &mut ResourceGraph,
    dom: SubsystemId,
    job_id: JobId,
) -> crate::Result<usize> {
    let mut stack: Vec<VertexId> = graph
        .roots(dom)
        .into_iter()
        .filter(|root| graph.pool(*root).is_some_and(|pool| pool.is_tagged(job_id)))
        .collect();
    if stack.is_empty() {
        return Err(RgError::InconsistentRelease(format!(
            "job {job_id} holds no resources"
        )));
    }
    let mut released = 0;
    while let Some(vertex) = stack.pop() {
        let pool = pool_mut(graph, vertex)?;
        if !pool.job_data.tags.remove(&job_id) {
            continue;
        }
        if let Some(span) = pool.job_data.x_spans.remove(&job_id) {
            pool.job_data.x_checker.rem_span(span)?;
        }
        if let Some(span) = pool.job_data.job2span.remove(&(dom, job_id)) {
            if let Some(plan) = pool.job_data.subplans.get_mut(&dom) {
                plan.rem_span(span)?;
            }
        }
        let span = pool
            .schedule
            .allocations
            .remove(&job_id)
            .or_else(|| pool.schedule.reservations.remove(&job_id));
        if let Some(span) = span {
            pool.schedule.plans.rem_span(span)?;
        }
        released += 1;
        stack.extend(graph.children(vertex, dom));
    }
    log::debug!("Released {released} pools of job {job_id}");
    Ok(released)
}
