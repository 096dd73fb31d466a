use crate::internal::graph::ResourcePool;
use crate::internal::jobspec::ResourceSpec;
use crate::internal::policy::{MatchPolicy, pool_ordinal};
use crate::internal::scoring::Fold;

/// Packs top level selections into contiguous ranges of ids.
#[derive(Debug, Default, Clone)]
pub struct LocalityAware;

impl MatchPolicy for LocalityAware {
    fn name(&self) -> &'static str {
        "locality"
    }

    fn fold(&self) -> Fold {
        Fold::Greater
    }

    fn root_fold(&self) -> Fold {
        Fold::IntervalGreater
    }

    fn score(&self, pool: &ResourcePool, _spec: Option<&ResourceSpec>) -> i64 {
        pool_ordinal(pool) + 1
    }
}
