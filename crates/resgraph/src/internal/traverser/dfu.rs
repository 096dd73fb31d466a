use std::collections::BTreeSet;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::internal::common::error::RgError;
use crate::internal::common::utils::window_end;
use crate::internal::common::{Map, Set};
use crate::internal::graph::ResourceGraph;
use crate::internal::jobspec::JobSpec;
use crate::internal::planner::MultiPlanner;
use crate::internal::policy::{MatchPolicy, MatcherData, SubsystemSelector};
use crate::internal::scoring::ScoreAccumulator;
use crate::internal::traverser::meta::{
    CancelToken, JobMeta, MatchOp, MatchResult, MatchStatus,
};
use crate::internal::traverser::primed::{SpecNode, prime};
use crate::internal::traverser::select::{Search, Selection};
use crate::internal::traverser::update::{Commit, remove};
use crate::{Duration, JobId, SubsystemId, Time, VertexId};

/// Outcome of the read-only half of a match. Nothing in the graph has changed yet;
/// [`DfuTraverser::commit`] writes it.
#[derive(Debug, Clone)]
pub struct PreparedMatch {
    pub(crate) status: MatchStatus,
    pub(crate) at: Time,
    pub(crate) duration: Duration,
    pub(crate) selection: Option<Selection>,
}

impl PreparedMatch {
    #[inline]
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    #[inline]
    pub fn at(&self) -> Time {
        self.at
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }
}

/// Depth-first matcher over the dominant subsystem of a resource graph.
#[derive(Debug)]
pub struct DfuTraverser {
    matcher: MatcherData,
    policy: Arc<dyn MatchPolicy>,
    dom: Option<SubsystemId>,
    aux: Vec<(SubsystemId, SubsystemSelector)>,
    default_duration: Duration,
    max_duration: Duration,
}

/// Everything one select attempt needs besides the window.
struct Attempt<'a> {
    traverser: &'a DfuTraverser,
    graph: &'a ResourceGraph,
    policy: &'a dyn MatchPolicy,
    dom: SubsystemId,
    nodes: &'a [SpecNode<'a>],
    cancel: Option<&'a CancelToken>,
}

impl Attempt<'_> {
    /// Best selection over all roots of the dominant subsystem.
    fn select(&self, meta: JobMeta) -> crate::Result<Option<Selection>> {
        let mut found: Vec<Selection> = Vec::new();
        for root in self.graph.roots(self.dom) {
            let mut search = Search::new(
                self.graph,
                self.policy,
                (self.dom, self.traverser.matcher.dominant()),
                &self.traverser.aux,
                meta,
                self.cancel,
            );
            if let Some(selection) = search.run(root, self.nodes)? {
                found.push(selection);
            }
        }
        if found.len() <= 1 {
            return Ok(found.pop());
        }
        let mut scores = ScoreAccumulator::new(self.policy.root_fold());
        for selection in &found {
            scores.accumulate(selection.root, selection.score);
        }
        let best = scores.best_of(found.iter().map(|selection| selection.root));
        Ok(found
            .into_iter()
            .find(|selection| Some(selection.root) == best))
    }

    /// Earliest start after `at` at which the request fits.
    fn reserve(
        &self,
        totals: &Map<&str, i64>,
        at: Time,
        duration: Duration,
    ) -> crate::Result<Option<(Time, Selection)>> {
        let length = i64::try_from(duration)
            .map_err(|_| RgError::InvalidArgument(format!("duration {duration} is too long")))?;
        let latest = self.graph.plan_end().saturating_sub(length);
        if at >= latest {
            return Ok(None);
        }
        let mut starts: BTreeSet<Time> = BTreeSet::new();

        // Subtree planners of the roots know when enough capacity is free in aggregate.
        for root in self.graph.roots(self.dom) {
            let Some(plan) = self
                .graph
                .pool(root)
                .and_then(|pool| pool.subtree_planner(self.dom))
            else {
                continue;
            };
            let request: Vec<i64> = plan
                .resource_types()
                .map(|t| totals.get(t).copied().unwrap_or(0))
                .collect();
            if request.iter().all(|count| *count == 0) {
                continue;
            }
            let mut plan: MultiPlanner = plan.clone();
            let mut next = plan.avail_time_first(at + 1, duration, &request)?;
            while let Some(start) = next {
                if start > latest {
                    break;
                }
                starts.insert(start);
                next = plan.avail_time_next()?;
            }
        }

        // Every time at which some span ends is a candidate as well.
        for pool in self.graph.pools() {
            starts.extend(pool.planner().spans().map(|span| span.end()));
            starts.extend(pool.x_checker().spans().map(|span| span.end()));
        }
        for start in starts.range(at + 1..=latest) {
            if let Some(selection) = self.select(JobMeta::new(*start, duration))? {
                return Ok(Some((*start, selection)));
            }
        }
        Ok(None)
    }
}

impl DfuTraverser {
    pub fn new(matcher: MatcherData, policy: Arc<dyn MatchPolicy>) -> Self {
        DfuTraverser {
            matcher,
            policy,
            dom: None,
            aux: Vec::new(),
            default_duration: crate::SYSTEM_DEFAULT_DURATION,
            max_duration: crate::SYSTEM_MAX_DURATION,
        }
    }

    /// Duration used for specifications without one, and the longest one accepted.
    pub fn with_duration_limits(mut self, default_duration: Duration, max_duration: Duration) -> Self {
        self.default_duration = default_duration;
        self.max_duration = max_duration;
        self
    }

    #[inline]
    pub fn matcher(&self) -> &MatcherData {
        &self.matcher
    }

    #[inline]
    pub fn policy(&self) -> &Arc<dyn MatchPolicy> {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: Arc<dyn MatchPolicy>) {
        log::debug!("Match policy set to '{}'", policy.name());
        self.policy = policy;
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.dom.is_some()
    }

    pub fn dominant_subsystem(&self) -> crate::Result<SubsystemId> {
        self.dom
            .ok_or_else(|| RgError::GraphError("traverser is not initialized".into()))
    }

    fn dom_children(
        &self,
        graph: &ResourceGraph,
        dom: SubsystemId,
        vertex: VertexId,
    ) -> SmallVec<[VertexId; 8]> {
        let selector = self.matcher.dominant();
        graph
            .out_edges(vertex, dom)
            .iter()
            .filter_map(|edge| graph.relation(*edge))
            .filter(|relation| selector.accepts(&relation.relation))
            .map(|relation| relation.target)
            .collect()
    }

    /// Resolves the configured subsystems against the graph and builds the subtree
    /// planners of the pruning filters. Has to be called again whenever the shape of the
    /// graph changes.
    pub fn initialize(&mut self, graph: &mut ResourceGraph) -> crate::Result<()> {
        let dom_name = &self.matcher.dominant().name;
        let dom = graph.subsystem_id(dom_name).ok_or_else(|| {
            RgError::GraphError(format!("dominant subsystem '{dom_name}' is not in the graph"))
        })?;
        let mut aux = Vec::with_capacity(self.matcher.auxiliary().len());
        for selector in self.matcher.auxiliary() {
            let id = graph.subsystem_id(&selector.name).ok_or_else(|| {
                RgError::GraphError(format!("subsystem '{}' is not in the graph", selector.name))
            })?;
            aux.push((id, selector.clone()));
        }
        if let Some(pool) = graph.pools().find(|pool| pool.job_count() > 0) {
            return Err(RgError::GraphError(format!(
                "pool {} is in use, the traverser cannot be initialized",
                pool.name()
            )));
        }
        let planners = trace_time!("traverser", "initialize", {
            self.prime_subplans(graph, dom)?
        });
        log::debug!(
            "Traverser initialized on subsystem '{dom_name}' with {} auxiliary subsystems, {planners} subtree planners",
            aux.len()
        );
        self.dom = Some(dom);
        self.aux = aux;
        graph.bump_generation();
        Ok(())
    }

    /// Creates a subtree planner on every anchor vertex whose descendants hold some
    /// pruning type. Returns the number of created planners.
    fn prime_subplans(&self, graph: &mut ResourceGraph, dom: SubsystemId) -> crate::Result<usize> {
        let members: Vec<VertexId> = graph
            .pools()
            .filter(|pool| pool.is_member_of(dom))
            .map(|pool| pool.uniq_id())
            .collect();
        for vertex in &members {
            if let Some(pool) = graph.pool_mut(*vertex) {
                pool.job_data.subplans.remove(&dom);
            }
        }
        let filters = self.matcher.prune_filters();
        if filters.is_empty() {
            return Ok(0);
        }

        let mut order: Vec<VertexId> = Vec::with_capacity(members.len());
        let mut visited: Set<VertexId> = Set::default();
        for root in graph.roots(dom) {
            let mut stack = vec![root];
            while let Some(vertex) = stack.pop() {
                if !visited.insert(vertex) {
                    continue;
                }
                order.push(vertex);
                stack.extend(self.dom_children(graph, dom, vertex));
            }
        }

        // Totals of each subtree, the vertex itself included.
        let mut subtree: Map<VertexId, Map<String, i64>> = Map::default();
        let mut created = 0;
        for vertex in order.into_iter().rev() {
            let mut below: Map<String, i64> = Map::default();
            for child in self.dom_children(graph, dom, vertex) {
                if let Some(sums) = subtree.get(&child) {
                    for (resource_type, count) in sums {
                        *below.entry(resource_type.clone()).or_insert(0) += count;
                    }
                }
            }
            let Some(pool) = graph.pool(vertex) else {
                continue;
            };
            let resource_type = pool.resource_type().to_string();
            let size = pool.size();

            let anchored = filters.pruning_types_of(&resource_type);
            let totals: Vec<i64> = anchored
                .iter()
                .map(|t| below.get(*t).copied().unwrap_or(0))
                .collect();
            if totals.iter().any(|total| *total > 0) {
                let planner = MultiPlanner::new(
                    graph.plan_start(),
                    graph.plan_duration(),
                    &totals,
                    &anchored,
                )?;
                if let Some(pool) = graph.pool_mut(vertex) {
                    pool.job_data.subplans.insert(dom, planner);
                    created += 1;
                }
            }

            if filters.is_pruning_type(&resource_type) {
                *below.entry(resource_type).or_insert(0) += size;
            }
            subtree.insert(vertex, below);
        }
        Ok(created)
    }

    fn check_window(graph: &ResourceGraph, at: Time, duration: Duration) -> crate::Result<()> {
        match window_end(at, duration) {
            Some(end) if at >= graph.plan_start() && end <= graph.plan_end() => Ok(()),
            _ => Err(RgError::InvalidArgument(format!(
                "window {at}+{duration} is outside of the planning horizon [{}, {})",
                graph.plan_start(),
                graph.plan_end()
            ))),
        }
    }

    /// Searches for a match without changing the graph. `policy` overrides the
    /// traverser's policy for this request only.
    pub fn prepare(
        &self,
        graph: &ResourceGraph,
        jobspec: &JobSpec,
        op: MatchOp,
        at: Time,
        policy: Option<&dyn MatchPolicy>,
        cancel: Option<&CancelToken>,
    ) -> crate::Result<PreparedMatch> {
        let dom = self.dominant_subsystem()?;
        let duration = jobspec.validate(self.default_duration, self.max_duration)?;
        Self::check_window(graph, at, duration)?;
        let (nodes, totals) = prime(graph, self.matcher.prune_filters(), &jobspec.resources)?;
        let attempt = Attempt {
            traverser: self,
            graph,
            policy: policy.unwrap_or(self.policy.as_ref()),
            dom,
            nodes: &nodes,
            cancel,
        };
        let prepared = |status, at, selection| PreparedMatch {
            status,
            at,
            duration,
            selection,
        };

        trace_time!("traverser", "prepare", {
            match op {
                MatchOp::Satisfiability => {
                    match attempt.select(JobMeta::satisfiability(at, duration))? {
                        Some(_) => Ok(prepared(MatchStatus::Satisfiable, at, None)),
                        None => Err(RgError::Unsatisfiable(
                            "request exceeds the capacity of the graph".into(),
                        )),
                    }
                }
                MatchOp::Allocate => match attempt.select(JobMeta::new(at, duration))? {
                    Some(selection) => Ok(prepared(MatchStatus::Allocated, at, Some(selection))),
                    None => Err(RgError::NoFeasibleMatch(format!("no resources free at {at}"))),
                },
                MatchOp::AllocateWithSatisfiability => {
                    if let Some(selection) = attempt.select(JobMeta::new(at, duration))? {
                        return Ok(prepared(MatchStatus::Allocated, at, Some(selection)));
                    }
                    match attempt.select(JobMeta::satisfiability(at, duration))? {
                        Some(_) => Err(RgError::NoFeasibleMatch(format!("no resources free at {at}"))),
                        None => Err(RgError::Unsatisfiable(
                            "request exceeds the capacity of the graph".into(),
                        )),
                    }
                }
                MatchOp::AllocateOrElseReserve => {
                    if let Some(selection) = attempt.select(JobMeta::new(at, duration))? {
                        return Ok(prepared(MatchStatus::Allocated, at, Some(selection)));
                    }
                    match attempt.reserve(&totals, at, duration)? {
                        Some((start, selection)) => {
                            Ok(prepared(MatchStatus::Reserved, start, Some(selection)))
                        }
                        None => Err(RgError::NoFeasibleMatch(format!(
                            "no resources free at {at} or later"
                        ))),
                    }
                }
            }
        })
    }

    /// Writes a prepared match into the graph. Satisfiability checks change nothing.
    pub fn commit(
        &self,
        graph: &mut ResourceGraph,
        job_id: JobId,
        prepared: &PreparedMatch,
    ) -> crate::Result<MatchResult> {
        let dom = self.dominant_subsystem()?;
        let pools = match &prepared.selection {
            None => Vec::new(),
            Some(selection) => {
                let meta = JobMeta::new(prepared.at, prepared.duration);
                let allocate = prepared.status == MatchStatus::Allocated;
                let pools = trace_time!("traverser", "commit", {
                    Commit::new(
                        graph,
                        dom,
                        self.matcher.dominant(),
                        self.matcher.prune_filters(),
                        job_id,
                        meta,
                        allocate,
                    )
                    .apply(selection)?
                });
                graph.bump_generation();
                pools
            }
        };
        Ok(MatchResult {
            job_id,
            status: prepared.status,
            at: prepared.at,
            duration: prepared.duration,
            pools,
        })
    }

    /// Prepares and commits in one step.
    pub fn run(
        &self,
        graph: &mut ResourceGraph,
        job_id: JobId,
        jobspec: &JobSpec,
        op: MatchOp,
        at: Time,
    ) -> crate::Result<MatchResult> {
        let prepared = self.prepare(graph, jobspec, op, at, None, None)?;
        self.commit(graph, job_id, &prepared)
    }

    /// Releases everything the job holds. Returns the number of released pools.
    pub fn remove(&self, graph: &mut ResourceGraph, job_id: JobId) -> crate::Result<usize> {
        let dom = self.dominant_subsystem()?;
        let released = trace_time!("traverser", "remove", { remove(graph, dom, job_id)? });
        graph.bump_generation();
        Ok(released)
    }
}
