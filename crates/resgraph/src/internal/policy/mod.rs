//! Pluggable selection policies.
//!
//! The traverser asks the policy whether a pool may be used for a specification node,
//! how to score it, and how to rank candidate groups against each other.

mod factory;
mod id_based;
mod locality;
mod matcher;
mod variation;

use std::fmt;

use crate::internal::graph::ResourcePool;
use crate::internal::jobspec::ResourceSpec;
use crate::internal::scoring::Fold;

pub use factory::{POLICY_NAMES, create_policy};
pub use id_based::{FirstMatch, HighIdFirst, LowIdFirst};
pub use locality::LocalityAware;
pub use matcher::{MatcherData, PruneAnchor, PruneFilters, SubsystemSelector};
pub use variation::{DEFAULT_PERF_CLASS, PERF_CLASS_PROPERTY, VariationAware};

pub trait MatchPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Fold used to rank candidate groups below a matched vertex.
    fn fold(&self) -> Fold;

    /// Fold used to rank candidates of the top level specification.
    fn root_fold(&self) -> Fold {
        self.fold()
    }

    /// Score of a pool whose requirements are met. Must not be negative.
    fn score(&self, pool: &ResourcePool, spec: Option<&ResourceSpec>) -> i64;

    fn is_admissible(&self, pool: &ResourcePool, spec: &ResourceSpec) -> bool {
        satisfies_requirements(pool, spec)
    }

    /// Stop descending into further children once the minimum counts are reached.
    fn stop_on_first_match(&self) -> bool {
        false
    }
}

/// Checks the property constraints of the specification node against the pool.
pub fn satisfies_requirements(pool: &ResourcePool, spec: &ResourceSpec) -> bool {
    spec.requires
        .iter()
        .all(|constraint| match (pool.property(&constraint.name), &constraint.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        })
}

/// Logical id of the pool if it has one, its vertex id otherwise.
pub(crate) fn pool_ordinal(pool: &ResourcePool) -> i64 {
    if pool.id() >= 0 {
        pool.id()
    } else {
        pool.uniq_id().as_num() as i64
    }
}
