#[macro_use]
pub mod common;

#[macro_use]
pub mod internal;

pub use crate::internal::common::error::RgError;
pub use crate::internal::common::ids::{
    EdgeId, JobId, ResourceTypeId, SpanId, SubsystemId, TypeKey, VertexId,
};
pub use crate::internal::common::utils::format_comma_delimited;
pub use crate::internal::common::{Map, Set};

/// Seconds since an arbitrary epoch chosen by the caller.
pub type Time = i64;
/// Length of a window in seconds.
pub type Duration = u64;

pub type Error = RgError;
pub type Result<T> = std::result::Result<T, Error>;

pub const SYSTEM_DEFAULT_DURATION: Duration = 43200;
pub const SYSTEM_MAX_DURATION: Duration = 604800;
pub const DEFAULT_PLAN_HORIZON: Duration = (i64::MAX / 2) as Duration;
pub const DEFAULT_SUBSYSTEM: &str = "containment";

pub mod planner {
    pub use crate::internal::planner::{
        MultiPlanner, Planner, Quantity, ResourceCounts, ScheduledPoint, Span,
    };
}

pub mod graph {
    pub use crate::internal::graph::{
        CONTAINS_RELATION, IN_RELATION, PoolDescriptor, PoolDescriptorBuilder, PoolStatus,
        ResourceGraph, ResourcePool, ResourceRelation, SLOT_TYPE, X_CHECKER_NJOBS,
    };
}

pub mod jobspec {
    pub use crate::internal::jobspec::{
        Count, CountOperator, Exclusivity, JobSpec, PropertyConstraint, ResourceSpec,
    };
}

pub mod scoring {
    pub use crate::internal::scoring::{
        EvalEdge, EvalGroup, Evals, Fold, MATCH_MET, MATCH_UNMET, ScoreAccumulator, ScoringApi,
    };
}

pub mod policy {
    pub use crate::internal::policy::{
        DEFAULT_PERF_CLASS, FirstMatch, HighIdFirst, LocalityAware, LowIdFirst, MatchPolicy,
        MatcherData, PERF_CLASS_PROPERTY, POLICY_NAMES, PruneAnchor, PruneFilters,
        SubsystemSelector, VariationAware, create_policy, satisfies_requirements,
    };
}

pub mod traverser {
    pub use crate::internal::traverser::{
        CancelToken, DfuTraverser, MatchOp, MatchResult, MatchStatus, MatchedPool, PreparedMatch,
        Selection,
    };
}

pub mod query {
    pub use crate::internal::config::QueryConfig;
    pub use crate::internal::query::{MatchRequest, PendingMatch, ResourceQuery};
}
