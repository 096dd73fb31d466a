use resgraph::graph::{CONTAINS_RELATION, PoolDescriptorBuilder, ResourceGraph};
use resgraph::jobspec::{JobSpec, ResourceSpec};
use resgraph::query::{QueryConfig, ResourceQuery};
use resgraph::VertexId;

fn add(graph: &mut ResourceGraph, resource_type: &str, id: usize) -> VertexId {
    let descriptor = PoolDescriptorBuilder::default()
        .resource_type(resource_type)
        .id(id as i64)
        .build()
        .unwrap();
    graph.add_vertex(descriptor).unwrap()
}

/// `cluster0 -> node{n} -> socket{s} -> core{c}` with `cores` cores per socket.
pub fn build_cluster(nodes: usize, sockets: usize, cores: usize) -> ResourceGraph {
    let mut graph = ResourceGraph::default();
    let dom = graph.add_subsystem(resgraph::DEFAULT_SUBSYSTEM);
    let cluster = add(&mut graph, "cluster", 0);
    for n in 0..nodes {
        let node = add(&mut graph, "node", n);
        graph.add_edge(cluster, node, dom, CONTAINS_RELATION).unwrap();
        for s in 0..sockets {
            let socket = add(&mut graph, "socket", s);
            graph.add_edge(node, socket, dom, CONTAINS_RELATION).unwrap();
            for c in 0..cores {
                let core = add(&mut graph, "core", s * cores + c);
                graph.add_edge(socket, core, dom, CONTAINS_RELATION).unwrap();
            }
        }
    }
    graph
}

pub fn create_query(graph: ResourceGraph, policy: &str) -> ResourceQuery {
    let config = QueryConfig {
        policy: policy.to_string(),
        ..Default::default()
    };
    ResourceQuery::new(graph, config).unwrap()
}

pub fn node_cores(nodes: u32, cores: u32) -> JobSpec {
    JobSpec::new(vec![
        ResourceSpec::new("node", nodes).child(ResourceSpec::new("core", cores)),
    ])
    .with_duration(60)
}
