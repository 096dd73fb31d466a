use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::internal::common::error::RgError;
use crate::internal::common::{Map, Set};
use crate::internal::planner::{MultiPlanner, Planner};
use crate::{JobId, ResourceTypeId, SpanId, SubsystemId, VertexId};

/// Capacity of the exclusivity checker planner; a vertex is used by nobody during a
/// window iff the checker reports the full amount as free.
pub const X_CHECKER_NJOBS: i64 = 0x4000_0000;
pub const X_CHECKER_JOBS_TYPE: &str = "jobs";

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    #[default]
    Up,
    Down,
}

/// Description of a pool handed to [`crate::graph::ResourceGraph::add_vertex`].
#[derive(Builder, Debug, Clone, Serialize, Deserialize)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate", error = "RgError"))]
pub struct PoolDescriptor {
    #[builder(setter(into))]
    pub resource_type: String,
    /// Defaults to the resource type.
    #[builder(setter(into, strip_option), default)]
    pub basename: Option<String>,
    /// Defaults to basename followed by the logical id.
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    /// Logical id, e.g. the index of a core within its socket.
    #[builder(default = "-1")]
    pub id: i64,
    #[builder(default = "1")]
    pub size: i64,
    #[builder(setter(into), default)]
    pub unit: String,
    #[builder(default)]
    pub exclusive: bool,
    #[builder(default)]
    pub properties: Map<String, String>,
    /// Subsystems the pool belongs to even without any edge in them.
    #[builder(default)]
    #[serde(default)]
    pub subsystems: Vec<String>,
}

impl PoolDescriptorBuilder {
    pub fn subsystem(mut self, name: &str) -> Self {
        self.subsystems
            .get_or_insert_with(Vec::new)
            .push(name.to_string());
        self
    }

    pub fn property(mut self, name: &str, value: &str) -> Self {
        self.properties
            .get_or_insert_with(Map::default)
            .insert(name.to_string(), value.to_string());
        self
    }

    fn validate(&self) -> Result<(), RgError> {
        if let Some(size) = self.size {
            if size < 0 {
                return Err(RgError::GraphError(format!(
                    "pool size must not be negative, got {size}"
                )));
            }
        }
        if let Some(resource_type) = &self.resource_type {
            if resource_type.is_empty() {
                return Err(RgError::GraphError("pool type must not be empty".into()));
            }
        }
        Ok(())
    }
}

impl From<derive_builder::UninitializedFieldError> for RgError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        RgError::GraphError(e.to_string())
    }
}

impl PoolDescriptor {
    pub fn new(resource_type: &str, size: i64) -> Self {
        PoolDescriptor {
            resource_type: resource_type.to_string(),
            basename: None,
            name: None,
            id: -1,
            size,
            unit: String::new(),
            exclusive: false,
            properties: Map::default(),
            subsystems: Vec::new(),
        }
    }
}

/// Temporal state of the pool's own capacity.
#[derive(Debug, Clone)]
pub struct PoolSchedule {
    pub(crate) plans: Planner,
    pub(crate) allocations: Map<JobId, SpanId>,
    pub(crate) reservations: Map<JobId, SpanId>,
}

/// Per-job bookkeeping used by matching: which jobs touch this pool or its subtree.
#[derive(Debug, Clone)]
pub struct PoolJobData {
    pub(crate) x_checker: Planner,
    pub(crate) x_spans: Map<JobId, SpanId>,
    pub(crate) tags: Set<JobId>,
    pub(crate) subplans: Map<SubsystemId, MultiPlanner>,
    pub(crate) job2span: Map<(SubsystemId, JobId), SpanId>,
}

#[derive(Debug, Clone)]
pub struct ResourcePool {
    pub(crate) uniq_id: VertexId,
    pub(crate) type_id: ResourceTypeId,
    pub(crate) resource_type: String,
    pub(crate) basename: String,
    pub(crate) name: String,
    pub(crate) id: i64,
    pub(crate) size: i64,
    pub(crate) unit: String,
    pub(crate) exclusive: bool,
    pub(crate) properties: Map<String, String>,
    pub(crate) status: PoolStatus,
    pub(crate) member_of: SmallVec<[SubsystemId; 2]>,
    pub(crate) schedule: PoolSchedule,
    pub(crate) job_data: PoolJobData,
}

impl ResourcePool {
    #[inline]
    pub fn uniq_id(&self) -> VertexId {
        self.uniq_id
    }

    #[inline]
    pub fn type_id(&self) -> ResourceTypeId {
        self.type_id
    }

    #[inline]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[inline]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn size(&self) -> i64 {
        self.size
    }

    #[inline]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[inline]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    #[inline]
    pub fn status(&self) -> PoolStatus {
        self.status
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|v| v.as_str())
    }

    #[inline]
    pub fn properties(&self) -> &Map<String, String> {
        &self.properties
    }

    pub fn is_member_of(&self, subsystem: SubsystemId) -> bool {
        self.member_of.contains(&subsystem)
    }

    pub fn subsystems(&self) -> &[SubsystemId] {
        &self.member_of
    }

    /// Planner tracking the pool's own capacity.
    #[inline]
    pub fn planner(&self) -> &Planner {
        &self.schedule.plans
    }

    /// Planner counting the jobs that use this pool or anything below it.
    #[inline]
    pub fn x_checker(&self) -> &Planner {
        &self.job_data.x_checker
    }

    pub fn subtree_planner(&self, subsystem: SubsystemId) -> Option<&MultiPlanner> {
        self.job_data.subplans.get(&subsystem)
    }

    pub fn allocation(&self, job_id: JobId) -> Option<SpanId> {
        self.schedule.allocations.get(&job_id).copied()
    }

    pub fn reservation(&self, job_id: JobId) -> Option<SpanId> {
        self.schedule.reservations.get(&job_id).copied()
    }

    #[inline]
    pub fn is_tagged(&self, job_id: JobId) -> bool {
        self.job_data.tags.contains(&job_id)
    }

    pub fn job_count(&self) -> usize {
        self.job_data.tags.len()
    }
}
