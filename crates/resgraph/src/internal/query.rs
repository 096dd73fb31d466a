use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::internal::common::Map;
use crate::internal::common::error::RgError;
use crate::internal::common::trace::{trace_job_release, trace_match_outcome};
use crate::internal::config::QueryConfig;
use crate::internal::graph::{PoolStatus, ResourceGraph, ResourcePool};
use crate::internal::jobspec::JobSpec;
use crate::internal::policy::{MatchPolicy, create_policy};
use crate::internal::traverser::{
    CancelToken, DfuTraverser, MatchOp, MatchResult, MatchStatus, PreparedMatch,
};
use crate::{Duration, JobId, Time, VertexId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub job_id: JobId,
    pub jobspec: JobSpec,
    pub op: MatchOp,
    pub at: Time,
    /// Overrides the configured policy for this request.
    #[serde(default)]
    pub policy: Option<String>,
}

impl MatchRequest {
    pub fn new(job_id: JobId, jobspec: JobSpec, op: MatchOp, at: Time) -> Self {
        MatchRequest {
            job_id,
            jobspec,
            op,
            at,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: &str) -> Self {
        self.policy = Some(policy.to_string());
        self
    }
}

/// A match found but not yet written. Tied to the graph generation it was found at.
#[derive(Debug, Clone)]
pub struct PendingMatch {
    job_id: JobId,
    generation: u64,
    prepared: PreparedMatch,
}

impl PendingMatch {
    #[inline]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn status(&self) -> MatchStatus {
        self.prepared.status()
    }

    #[inline]
    pub fn at(&self) -> Time {
        self.prepared.at()
    }
}

/// Resource graph together with its traverser and the jobs matched on it.
#[derive(Debug)]
pub struct ResourceQuery {
    graph: ResourceGraph,
    traverser: DfuTraverser,
    config: QueryConfig,
    jobs: Map<JobId, MatchResult>,
}

impl ResourceQuery {
    pub fn new(mut graph: ResourceGraph, config: QueryConfig) -> crate::Result<Self> {
        config.validate()?;
        if graph.plan_start() != config.plan_start || graph.plan_duration() != config.plan_duration {
            log::warn!(
                "Graph horizon {}+{} differs from the configured {}+{}",
                graph.plan_start(),
                graph.plan_duration(),
                config.plan_start,
                config.plan_duration
            );
        }
        let policy = create_policy(&config.policy)?;
        let mut traverser = DfuTraverser::new(config.matcher_data()?, policy)
            .with_duration_limits(config.default_duration, config.max_duration);
        traverser.initialize(&mut graph)?;
        Ok(ResourceQuery {
            graph,
            traverser,
            config,
            jobs: Map::default(),
        })
    }

    /// Empty graph spanning the horizon of the configuration.
    pub fn graph_for(config: &QueryConfig) -> crate::Result<ResourceGraph> {
        ResourceGraph::new(config.plan_start, config.plan_duration)
    }

    #[inline]
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    #[inline]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    #[inline]
    pub fn traverser(&self) -> &DfuTraverser {
        &self.traverser
    }

    pub fn job(&self, job_id: JobId) -> Option<&MatchResult> {
        self.jobs.get(&job_id)
    }

    /// Matched jobs ordered by id.
    pub fn jobs(&self) -> Vec<&MatchResult> {
        let mut jobs: Vec<&MatchResult> = self.jobs.values().collect();
        jobs.sort_by_key(|job| job.job_id);
        jobs
    }

    fn request_policy(&self, request: &MatchRequest) -> crate::Result<Option<Arc<dyn MatchPolicy>>> {
        request
            .policy
            .as_deref()
            .filter(|name| *name != self.traverser.policy().name())
            .map(create_policy)
            .transpose()
    }

    /// Searches for a match of the request. The graph is not modified.
    pub fn prepare(
        &self,
        request: &MatchRequest,
        cancel: Option<&CancelToken>,
    ) -> crate::Result<PendingMatch> {
        if self.jobs.contains_key(&request.job_id) {
            return Err(RgError::InvalidArgument(format!(
                "job {} is already matched",
                request.job_id
            )));
        }
        let policy = self.request_policy(request)?;
        let prepared = self.traverser.prepare(
            &self.graph,
            &request.jobspec,
            request.op,
            request.at,
            policy.as_deref(),
            cancel,
        )?;
        Ok(PendingMatch {
            job_id: request.job_id,
            generation: self.graph.generation(),
            prepared,
        })
    }

    /// Writes a pending match. Rejected when anything changed the graph since it was
    /// prepared.
    pub fn commit(&mut self, pending: PendingMatch) -> crate::Result<MatchResult> {
        let current = self.graph.generation();
        if pending.generation != current {
            return Err(RgError::StaleMatch {
                prepared: pending.generation,
                current,
            });
        }
        if self.jobs.contains_key(&pending.job_id) {
            return Err(RgError::InvalidArgument(format!(
                "job {} is already matched",
                pending.job_id
            )));
        }
        let result = self
            .traverser
            .commit(&mut self.graph, pending.job_id, &pending.prepared)?;
        trace_match_outcome(
            result.job_id.as_num(),
            result.status.as_str(),
            result.at,
            result.pools.len(),
        );
        if result.status != MatchStatus::Satisfiable {
            self.jobs.insert(result.job_id, result.clone());
        }
        Ok(result)
    }

    /// Drops a pending match without writing it.
    pub fn cancel(&self, pending: PendingMatch) {
        log::debug!("Pending match of job {} discarded", pending.job_id);
    }

    pub fn match_request(&mut self, request: &MatchRequest) -> crate::Result<MatchResult> {
        let pending = trace_time!("query", "match", { self.prepare(request, None)? });
        self.commit(pending)
    }

    /// Releases the resources of a job and returns what it held.
    pub fn release(&mut self, job_id: JobId) -> crate::Result<MatchResult> {
        let Some(result) = self.jobs.remove(&job_id) else {
            return Err(RgError::InconsistentRelease(format!(
                "job {job_id} is not known"
            )));
        };
        if let Err(error) = self.traverser.remove(&mut self.graph, job_id) {
            self.jobs.insert(job_id, result);
            return Err(error);
        }
        trace_job_release(job_id.as_num());
        Ok(result)
    }

    /// Sets the status of the pool at `path` and of everything below it.
    pub fn mark(&mut self, path: &str, status: PoolStatus) -> crate::Result<usize> {
        let dom = self.traverser.dominant_subsystem()?;
        let vertex = self
            .graph
            .find_by_path(dom, path)
            .ok_or_else(|| RgError::GraphError(format!("no pool at path '{path}'")))?;
        self.graph.mark(vertex, dom, status)
    }

    pub fn mark_vertex(&mut self, vertex: VertexId, status: PoolStatus) -> crate::Result<usize> {
        let dom = self.traverser.dominant_subsystem()?;
        self.graph.mark(vertex, dom, status)
    }

    fn pool(&self, vertex: VertexId) -> crate::Result<&ResourcePool> {
        self.graph
            .pool(vertex)
            .ok_or_else(|| RgError::GraphError(format!("unknown pool {vertex}")))
    }

    /// Free units of the pool at the given time.
    pub fn avail_at(&self, vertex: VertexId, at: Time) -> crate::Result<i64> {
        self.pool(vertex)?.planner().avail_resources_at(at)
    }

    /// Minimum free units of the pool over the window.
    pub fn avail_during(&self, vertex: VertexId, at: Time, duration: Duration) -> crate::Result<i64> {
        self.pool(vertex)?.planner().avail_resources_during(at, duration)
    }
}
