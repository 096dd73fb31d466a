use smallvec::{SmallVec, smallvec};

use crate::common::index::IndexVec;
use crate::internal::common::error::RgError;
use crate::internal::common::{Map, Set};
use crate::internal::graph::names::NameMap;
use crate::internal::graph::pool::{
    PoolDescriptor, PoolJobData, PoolSchedule, PoolStatus, ResourcePool, X_CHECKER_JOBS_TYPE,
    X_CHECKER_NJOBS,
};
use crate::internal::graph::relation::ResourceRelation;
use crate::internal::planner::Planner;
use crate::{Duration, EdgeId, ResourceTypeId, SubsystemId, Time, VertexId};

pub const SLOT_TYPE: &str = "slot";

type EdgeList = SmallVec<[EdgeId; 4]>;

/// Resource pools connected by relation edges, partitioned into subsystems.
///
/// Edges are stored in per (vertex, subsystem) tables, so each subsystem is an
/// independent view over the shared set of pools. Each subsystem view is kept acyclic
/// and every pool has at most one "contains" parent per subsystem.
#[derive(Debug)]
pub struct ResourceGraph {
    pools: IndexVec<VertexId, ResourcePool>,
    relations: IndexVec<EdgeId, ResourceRelation>,
    out_edges: Map<(VertexId, SubsystemId), EdgeList>,
    in_edges: Map<(VertexId, SubsystemId), EdgeList>,
    subsystems: NameMap<SubsystemId>,
    types: NameMap<ResourceTypeId>,
    plan_start: Time,
    plan_duration: Duration,
    generation: u64,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        ResourceGraph {
            pools: Default::default(),
            relations: Default::default(),
            out_edges: Default::default(),
            in_edges: Default::default(),
            subsystems: Default::default(),
            types: Default::default(),
            plan_start: 0,
            plan_duration: crate::DEFAULT_PLAN_HORIZON,
            generation: 0,
        }
    }
}

impl ResourceGraph {
    /// Creates an empty graph whose pool planners cover `[plan_start, plan_start + plan_duration)`.
    pub fn new(plan_start: Time, plan_duration: Duration) -> crate::Result<Self> {
        if plan_duration == 0
            || crate::internal::common::utils::window_end(plan_start, plan_duration).is_none()
        {
            return Err(RgError::GraphError(format!(
                "invalid planning horizon {plan_start}+{plan_duration}"
            )));
        }
        Ok(ResourceGraph {
            plan_start,
            plan_duration,
            ..Default::default()
        })
    }

    #[inline]
    pub fn plan_start(&self) -> Time {
        self.plan_start
    }

    #[inline]
    pub fn plan_duration(&self) -> Duration {
        self.plan_duration
    }

    /// End of the planning horizon (exclusive).
    pub fn plan_end(&self) -> Time {
        crate::internal::common::utils::window_end(self.plan_start, self.plan_duration)
            .unwrap_or(Time::MAX)
    }

    /// Counter bumped on every change of matching-relevant state.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    pub fn add_subsystem(&mut self, name: &str) -> SubsystemId {
        self.subsystems.get_or_allocate_id("subsystem", name)
    }

    #[inline]
    pub fn subsystem_id(&self, name: &str) -> Option<SubsystemId> {
        self.subsystems.get_id(name)
    }

    #[inline]
    pub fn subsystem_name(&self, id: SubsystemId) -> Option<&str> {
        self.subsystems.get_name(id)
    }

    pub fn subsystems(&self) -> impl Iterator<Item = (SubsystemId, &str)> {
        self.subsystems.iter()
    }

    #[inline]
    pub fn resource_type_id(&self, name: &str) -> Option<ResourceTypeId> {
        self.types.get_id(name)
    }

    #[inline]
    pub fn resource_type_name(&self, id: ResourceTypeId) -> Option<&str> {
        self.types.get_name(id)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = (ResourceTypeId, &str)> {
        self.types.iter()
    }

    pub fn add_vertex(&mut self, descriptor: PoolDescriptor) -> crate::Result<VertexId> {
        let PoolDescriptor {
            resource_type,
            basename,
            name,
            id,
            size,
            unit,
            exclusive,
            properties,
            subsystems,
        } = descriptor;
        if resource_type.is_empty() || resource_type == SLOT_TYPE {
            return Err(RgError::GraphError(format!(
                "'{resource_type}' cannot be used as a pool type"
            )));
        }
        if size < 0 {
            return Err(RgError::GraphError(format!(
                "pool size must not be negative, got {size}"
            )));
        }
        let mut member_of: SmallVec<[SubsystemId; 2]> = SmallVec::new();
        for subsystem in &subsystems {
            let subsystem = self.add_subsystem(subsystem);
            if !member_of.contains(&subsystem) {
                member_of.push(subsystem);
            }
        }
        let type_id = self.types.get_or_allocate_id("resource type", &resource_type);
        let uniq_id = VertexId::from(self.pools.len());
        let basename = basename.unwrap_or_else(|| resource_type.clone());
        let name = name.unwrap_or_else(|| {
            if id >= 0 {
                format!("{basename}{id}")
            } else {
                format!("{basename}{uniq_id}")
            }
        });
        let plans = Planner::new(self.plan_start, self.plan_duration, size, &resource_type)?;
        let x_checker = Planner::new(
            self.plan_start,
            self.plan_duration,
            X_CHECKER_NJOBS,
            X_CHECKER_JOBS_TYPE,
        )?;
        log::trace!("Adding pool {name} ({resource_type}, size {size}) as {uniq_id}");
        let pool = ResourcePool {
            uniq_id,
            type_id,
            resource_type,
            basename,
            name,
            id,
            size,
            unit,
            exclusive,
            properties,
            status: PoolStatus::Up,
            member_of,
            schedule: PoolSchedule {
                plans,
                allocations: Map::default(),
                reservations: Map::default(),
            },
            job_data: PoolJobData {
                x_checker,
                x_spans: Map::default(),
                tags: Set::default(),
                subplans: Map::default(),
                job2span: Map::default(),
            },
        };
        Ok(self.pools.push(pool))
    }

    /// Makes the vertex a member of the subsystem. A member without incoming edges is a
    /// root of the subsystem.
    pub fn add_to_subsystem(&mut self, vertex: VertexId, subsystem: SubsystemId) -> crate::Result<()> {
        if self.subsystems.get_name(subsystem).is_none() {
            return Err(RgError::GraphError(format!("unknown subsystem {subsystem}")));
        }
        let Some(pool) = self.pools.get_mut(vertex) else {
            return Err(RgError::GraphError(format!("unknown pool {vertex}")));
        };
        if !pool.member_of.contains(&subsystem) {
            pool.member_of.push(subsystem);
        }
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        parent: VertexId,
        child: VertexId,
        subsystem: SubsystemId,
        relation: &str,
    ) -> crate::Result<EdgeId> {
        if self.pools.get(parent).is_none() || self.pools.get(child).is_none() {
            return Err(RgError::GraphError(format!(
                "edge {parent} -> {child} refers to an unknown pool"
            )));
        }
        if self.subsystems.get_name(subsystem).is_none() {
            return Err(RgError::GraphError(format!("unknown subsystem {subsystem}")));
        }
        if parent == child {
            return Err(RgError::GraphError(format!("self loop on pool {parent}")));
        }
        let edge = ResourceRelation {
            source: parent,
            target: child,
            subsystem,
            relation: relation.to_string(),
        };
        if edge.is_containment() && self.parent(child, subsystem).is_some() {
            return Err(RgError::GraphError(format!(
                "pool {} already has a containment parent in subsystem {}",
                self.pools[child].name,
                self.subsystem_name(subsystem).unwrap_or_default()
            )));
        }
        if self.reaches(child, parent, subsystem) {
            return Err(RgError::GraphError(format!(
                "edge {} -> {} would create a cycle",
                self.pools[parent].name, self.pools[child].name
            )));
        }
        let edge_id = self.relations.push(edge);
        self.out_edges
            .entry((parent, subsystem))
            .or_insert_with(|| smallvec![])
            .push(edge_id);
        self.in_edges
            .entry((child, subsystem))
            .or_insert_with(|| smallvec![])
            .push(edge_id);
        for vertex in [parent, child] {
            let member_of = &mut self.pools[vertex].member_of;
            if !member_of.contains(&subsystem) {
                member_of.push(subsystem);
            }
        }
        Ok(edge_id)
    }

    /// True if `to` is reachable from `from` in the subsystem.
    fn reaches(&self, from: VertexId, to: VertexId, subsystem: SubsystemId) -> bool {
        let mut stack = vec![from];
        let mut visited: Set<VertexId> = Set::default();
        while let Some(vertex) = stack.pop() {
            if vertex == to {
                return true;
            }
            if visited.insert(vertex) {
                stack.extend(self.children(vertex, subsystem));
            }
        }
        false
    }

    #[inline]
    pub fn pool(&self, vertex: VertexId) -> Option<&ResourcePool> {
        self.pools.get(vertex)
    }

    #[inline]
    pub(crate) fn pool_mut(&mut self, vertex: VertexId) -> Option<&mut ResourcePool> {
        self.pools.get_mut(vertex)
    }

    pub fn pools(&self) -> impl Iterator<Item = &ResourcePool> {
        self.pools.iter()
    }

    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    #[inline]
    pub fn relation(&self, edge: EdgeId) -> Option<&ResourceRelation> {
        self.relations.get(edge)
    }

    pub fn out_edges(&self, vertex: VertexId, subsystem: SubsystemId) -> &[EdgeId] {
        self.out_edges
            .get(&(vertex, subsystem))
            .map(|edges| edges.as_slice())
            .unwrap_or_default()
    }

    pub fn in_edges(&self, vertex: VertexId, subsystem: SubsystemId) -> &[EdgeId] {
        self.in_edges
            .get(&(vertex, subsystem))
            .map(|edges| edges.as_slice())
            .unwrap_or_default()
    }

    pub fn children(
        &self,
        vertex: VertexId,
        subsystem: SubsystemId,
    ) -> impl Iterator<Item = VertexId> + '_ {
        self.out_edges(vertex, subsystem)
            .iter()
            .map(|edge| self.relations[*edge].target)
    }

    /// Containment parent of the vertex in the subsystem.
    pub fn parent(&self, vertex: VertexId, subsystem: SubsystemId) -> Option<VertexId> {
        self.in_edges(vertex, subsystem)
            .iter()
            .map(|edge| &self.relations[*edge])
            .find(|relation| relation.is_containment())
            .map(|relation| relation.source)
    }

    pub fn vertices_in_subsystem(&self, name: &str) -> impl Iterator<Item = VertexId> + '_ {
        let subsystem = self.subsystem_id(name);
        self.pools
            .iter()
            .filter(move |pool| subsystem.is_some_and(|s| pool.is_member_of(s)))
            .map(|pool| pool.uniq_id)
    }

    /// Members of the subsystem without incoming edges, ordered by vertex id.
    pub fn roots(&self, subsystem: SubsystemId) -> Vec<VertexId> {
        self.pools
            .iter()
            .filter(|pool| pool.is_member_of(subsystem))
            .map(|pool| pool.uniq_id)
            .filter(|vertex| self.in_edges(*vertex, subsystem).is_empty())
            .collect()
    }

    /// Slash separated names from the subsystem root down to the vertex.
    pub fn path(&self, vertex: VertexId, subsystem: SubsystemId) -> Option<String> {
        let mut names = vec![self.pools.get(vertex)?.name.as_str()];
        let mut current = vertex;
        while let Some(edge) = self.in_edges(current, subsystem).first() {
            current = self.relations[*edge].source;
            names.push(&self.pools[current].name);
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Some(path)
    }

    pub fn find_by_path(&self, subsystem: SubsystemId, path: &str) -> Option<VertexId> {
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let first = parts.next()?;
        let mut current = self
            .roots(subsystem)
            .into_iter()
            .find(|root| self.pools[*root].name == first)?;
        for part in parts {
            current = self
                .children(current, subsystem)
                .find(|child| self.pools[*child].name == part)?;
        }
        Some(current)
    }

    pub fn find_by_name(&self, name: &str) -> Option<VertexId> {
        self.pools
            .iter()
            .find(|pool| pool.name == name)
            .map(|pool| pool.uniq_id)
    }

    /// Sets the status of the vertex and everything below it in the subsystem.
    /// Returns the number of pools whose status changed.
    pub fn mark(
        &mut self,
        vertex: VertexId,
        subsystem: SubsystemId,
        status: PoolStatus,
    ) -> crate::Result<usize> {
        if self.pools.get(vertex).is_none() {
            return Err(RgError::GraphError(format!("unknown pool {vertex}")));
        }
        let mut changed = 0;
        let mut stack = vec![vertex];
        let mut visited: Set<VertexId> = Set::default();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let pool = &mut self.pools[current];
            if pool.status != status {
                pool.status = status;
                changed += 1;
            }
            stack.extend(self.children(current, subsystem));
        }
        log::debug!(
            "Marked {changed} pools under {} as {status:?}",
            self.pools[vertex].name
        );
        self.bump_generation();
        Ok(changed)
    }

    /// Removes every edge of an unused vertex and marks it down. The pool itself stays
    /// in the arena so that ids remain stable.
    pub fn detach_vertex(&mut self, vertex: VertexId) -> crate::Result<()> {
        let Some(pool) = self.pools.get(vertex) else {
            return Err(RgError::GraphError(format!("unknown pool {vertex}")));
        };
        if pool.job_count() > 0 || pool.schedule.plans.span_count() > 0 {
            return Err(RgError::GraphError(format!(
                "pool {} is in use and cannot be detached",
                pool.name
            )));
        }
        let subsystems = pool.member_of.clone();
        for subsystem in subsystems {
            let outgoing = self.out_edges.remove(&(vertex, subsystem)).unwrap_or_default();
            for edge in outgoing {
                let target = self.relations[edge].target;
                if let Some(edges) = self.in_edges.get_mut(&(target, subsystem)) {
                    edges.retain(|e| *e != edge);
                }
            }
            let incoming = self.in_edges.remove(&(vertex, subsystem)).unwrap_or_default();
            for edge in incoming {
                let source = self.relations[edge].source;
                if let Some(edges) = self.out_edges.get_mut(&(source, subsystem)) {
                    edges.retain(|e| *e != edge);
                }
            }
        }
        let pool = &mut self.pools[vertex];
        log::debug!("Detached pool {}", pool.name);
        pool.member_of.clear();
        pool.status = PoolStatus::Down;
        self.bump_generation();
        Ok(())
    }
}
