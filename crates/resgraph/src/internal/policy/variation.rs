use crate::internal::graph::ResourcePool;
use crate::internal::jobspec::ResourceSpec;
use crate::internal::policy::MatchPolicy;
use crate::internal::scoring::Fold;

pub const PERF_CLASS_PROPERTY: &str = "perf_class";
pub const DEFAULT_PERF_CLASS: i64 = 9999;

/// Prefers pools of the lowest performance class, so that a job does not spread across
/// pools with different performance.
#[derive(Debug, Default, Clone)]
pub struct VariationAware;

impl VariationAware {
    pub fn perf_class(pool: &ResourcePool) -> i64 {
        pool.property(PERF_CLASS_PROPERTY)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|class| (0..=DEFAULT_PERF_CLASS).contains(class))
            .unwrap_or(DEFAULT_PERF_CLASS)
    }
}

impl MatchPolicy for VariationAware {
    fn name(&self) -> &'static str {
        "variation"
    }

    fn fold(&self) -> Fold {
        Fold::Less
    }

    fn score(&self, pool: &ResourcePool, _spec: Option<&ResourceSpec>) -> i64 {
        Self::perf_class(pool)
    }
}
