use crate::internal::graph::ResourcePool;
use crate::internal::jobspec::ResourceSpec;
use crate::internal::policy::{MatchPolicy, pool_ordinal};
use crate::internal::scoring::Fold;

/// Prefers pools with low ids.
#[derive(Debug, Default, Clone)]
pub struct LowIdFirst;

impl MatchPolicy for LowIdFirst {
    fn name(&self) -> &'static str {
        "low"
    }

    fn fold(&self) -> Fold {
        Fold::Less
    }

    fn score(&self, pool: &ResourcePool, _spec: Option<&ResourceSpec>) -> i64 {
        pool_ordinal(pool) + 1
    }
}

/// Prefers pools with high ids.
#[derive(Debug, Default, Clone)]
pub struct HighIdFirst;

impl MatchPolicy for HighIdFirst {
    fn name(&self) -> &'static str {
        "high"
    }

    fn fold(&self) -> Fold {
        Fold::Greater
    }

    fn score(&self, pool: &ResourcePool, _spec: Option<&ResourceSpec>) -> i64 {
        pool_ordinal(pool) + 1
    }
}

/// Low id first, but stops exploring as soon as enough candidates were found.
#[derive(Debug, Default, Clone)]
pub struct FirstMatch;

impl MatchPolicy for FirstMatch {
    fn name(&self) -> &'static str {
        "first"
    }

    fn fold(&self) -> Fold {
        Fold::Less
    }

    fn score(&self, pool: &ResourcePool, _spec: Option<&ResourceSpec>) -> i64 {
        pool_ordinal(pool) + 1
    }

    fn stop_on_first_match(&self) -> bool {
        true
    }
}
