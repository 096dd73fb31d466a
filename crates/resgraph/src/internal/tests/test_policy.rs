use crate::internal::graph::{CONTAINS_RELATION, PoolDescriptorBuilder, PoolStatus, ResourceGraph};
use crate::internal::jobspec::{JobSpec, ResourceSpec};
use crate::internal::policy::{POLICY_NAMES, VariationAware, create_policy};
use crate::internal::tests::utils::graph::{ClusterBuilder, create_query, vertex};
use crate::internal::tests::utils::jobspec::{TEST_DURATION, allocate, cores, node_cores};
use crate::internal::tests::utils::sorted_vec;
use crate::internal::traverser::MatchResult;

fn pools_of_type(result: &MatchResult, resource_type: &str) -> Vec<String> {
    sorted_vec(
        result
            .pools
            .iter()
            .filter(|pool| pool.resource_type == resource_type)
            .map(|pool| pool.name.clone())
            .collect(),
    )
}

/// Three nodes with one core each; node perf classes are 2, 1, 1.
fn perf_class_graph() -> ResourceGraph {
    let mut graph = ResourceGraph::default();
    let dom = graph.add_subsystem("containment");
    let cluster = graph
        .add_vertex(PoolDescriptorBuilder::default().resource_type("cluster").id(0).build().unwrap())
        .unwrap();
    for (n, class) in ["2", "1", "1"].into_iter().enumerate() {
        let node = graph
            .add_vertex(
                PoolDescriptorBuilder::default()
                    .resource_type("node")
                    .id(n as i64)
                    .property("perf_class", class)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        graph.add_edge(cluster, node, dom, CONTAINS_RELATION).unwrap();
        let core = graph
            .add_vertex(PoolDescriptorBuilder::default().resource_type("core").id(0).build().unwrap())
            .unwrap();
        graph.add_edge(node, core, dom, CONTAINS_RELATION).unwrap();
    }
    graph
}

#[test]
fn test_low_and_high_pick_opposite_ends() {
    let mut query = create_query(ClusterBuilder::new().cores(8).build(), "low");
    let result = query.match_request(&allocate(1, node_cores(2))).unwrap();
    assert_eq!(pools_of_type(&result, "core"), vec!["core0", "core1"]);

    let mut query = create_query(ClusterBuilder::new().cores(8).build(), "high");
    let result = query.match_request(&allocate(1, node_cores(2))).unwrap();
    assert_eq!(pools_of_type(&result, "core"), vec!["core6", "core7"]);
}

#[test]
fn test_first_match_takes_lowest_ids() {
    let mut query = ClusterBuilder::new().nodes(3).cores(2).query();
    let result = query.match_request(&allocate(1, cores(3))).unwrap();
    let nodes: Vec<String> = result
        .pools
        .iter()
        .filter(|pool| pool.resource_type == "node")
        .map(|pool| pool.name.clone())
        .collect();
    assert_eq!(nodes, vec!["node0", "node1"]);
    assert_eq!(result.count_of_type("core"), 3);
}

#[test]
fn test_request_policy_override() {
    let mut query = create_query(ClusterBuilder::new().cores(4).build(), "low");
    let result = query
        .match_request(&allocate(1, node_cores(1)).with_policy("high"))
        .unwrap();
    assert_eq!(pools_of_type(&result, "core"), vec!["core3"]);
    assert_eq!(query.traverser().policy().name(), "low");
    assert!(query.match_request(&allocate(2, node_cores(1)).with_policy("random")).is_err());
}

#[test]
fn test_locality_keeps_nodes_together() {
    let spec = || {
        JobSpec::new(vec![
            ResourceSpec::new("node", 2).child(ResourceSpec::new("core", 1)),
        ])
        .with_duration(TEST_DURATION)
    };

    let mut query = create_query(ClusterBuilder::new().nodes(5).cores(1).build(), "locality");
    query.mark("/cluster0/node3", PoolStatus::Down).unwrap();
    let result = query.match_request(&allocate(1, spec())).unwrap();
    assert_eq!(pools_of_type(&result, "node"), vec!["node1", "node2"]);

    let mut query = create_query(ClusterBuilder::new().nodes(5).cores(1).build(), "high");
    query.mark("/cluster0/node3", PoolStatus::Down).unwrap();
    let result = query.match_request(&allocate(1, spec())).unwrap();
    assert_eq!(pools_of_type(&result, "node"), vec!["node2", "node4"]);
}

#[test]
fn test_variation_prefers_low_perf_class() {
    let graph = perf_class_graph();
    let node0 = vertex(&graph, "/cluster0/node0");
    assert_eq!(VariationAware::perf_class(graph.pool(node0).unwrap()), 2);

    let mut query = create_query(graph, "variation");
    let result = query.match_request(&allocate(1, node_cores(1))).unwrap();
    assert_eq!(pools_of_type(&result, "node"), vec!["node1"]);
}

#[test]
fn test_property_constraints_filter_pools() {
    let mut query = create_query(perf_class_graph(), "low");
    let spec = JobSpec::new(vec![
        ResourceSpec::new("node", 1)
            .requires("perf_class", Some("1"))
            .child(ResourceSpec::new("core", 1)),
    ])
    .with_duration(TEST_DURATION);
    let result = query.match_request(&allocate(1, spec)).unwrap();
    assert_eq!(pools_of_type(&result, "node"), vec!["node1"]);

    let spec = JobSpec::new(vec![
        ResourceSpec::new("node", 1)
            .requires("rack", None)
            .child(ResourceSpec::new("core", 1)),
    ])
    .with_duration(TEST_DURATION);
    assert!(query.match_request(&allocate(2, spec)).is_err());
}

#[test]
fn test_factory_names() {
    for name in POLICY_NAMES {
        assert_eq!(create_policy(name).unwrap().name(), name);
    }
    assert!(create_policy("").is_err());
}
