use crate::internal::common::Map;
use crate::internal::common::error::RgError;
use crate::internal::graph::ResourceGraph;
use crate::internal::jobspec::ResourceSpec;
use crate::internal::policy::PruneFilters;
use crate::TypeKey;

/// Specification node with its type resolved against the graph.
#[derive(Debug)]
pub(crate) struct SpecNode<'a> {
    pub spec: &'a ResourceSpec,
    pub key: TypeKey,
    pub with: Vec<SpecNode<'a>>,
    /// Minimum amounts of pruning types requested below this node.
    pub aggregates: Map<&'a str, i64>,
}

impl SpecNode<'_> {
    /// Requested aggregates aligned to the given type order.
    pub fn aggregates_for<'t>(&self, types: impl Iterator<Item = &'t str>) -> Vec<i64> {
        types
            .map(|t| self.aggregates.get(t).copied().unwrap_or(0))
            .collect()
    }
}

fn accum_if<'a>(filters: &PruneFilters, accum: &mut Map<&'a str, i64>, t: &'a str, count: i64) {
    if filters.is_pruning_type(t) {
        let entry = accum.entry(t).or_insert(0);
        *entry = entry.saturating_add(count);
    }
}

/// Resolves types and computes the minimum aggregates of every node. Returns the nodes
/// together with the aggregates of the whole level.
pub(crate) fn prime<'a>(
    graph: &ResourceGraph,
    filters: &PruneFilters,
    resources: &'a [ResourceSpec],
) -> crate::Result<(Vec<SpecNode<'a>>, Map<&'a str, i64>)> {
    let mut nodes = Vec::with_capacity(resources.len());
    let mut to_parent: Map<&'a str, i64> = Map::default();
    for spec in resources {
        let key = if spec.is_slot() {
            TypeKey::Slot
        } else {
            let type_id = graph.resource_type_id(&spec.resource_type).ok_or_else(|| {
                RgError::InvalidSpecification(format!(
                    "resource type '{}' does not exist in the graph",
                    spec.resource_type
                ))
            })?;
            TypeKey::Resource(type_id)
        };
        let (with, aggregates) = prime(graph, filters, &spec.with)?;
        let min = i64::from(spec.count.min);
        accum_if(filters, &mut to_parent, &spec.resource_type, min);
        for (t, count) in &aggregates {
            accum_if(filters, &mut to_parent, *t, min.saturating_mul(*count));
        }
        nodes.push(SpecNode {
            spec,
            key,
            with,
            aggregates,
        });
    }
    Ok((nodes, to_parent))
}
