use crate::internal::graph::{CONTAINS_RELATION, PoolDescriptorBuilder, ResourceGraph};
use crate::internal::query::ResourceQuery;
use crate::internal::config::QueryConfig;
use crate::{SubsystemId, VertexId};

/// Builds `cluster0 -> node{i} -> [socket{j} ->] core{k}` hierarchies in the
/// containment subsystem. Core and gpu ids run per node.
pub struct ClusterBuilder {
    nodes: usize,
    sockets: usize,
    cores: usize,
    gpus: usize,
    memory: i64,
    exclusive_nodes: bool,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        ClusterBuilder {
            nodes: 1,
            sockets: 0,
            cores: 4,
            gpus: 0,
            memory: 0,
            exclusive_nodes: false,
        }
    }
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    /// With zero sockets, cores hang directly below the node.
    pub fn sockets(mut self, sockets: usize) -> Self {
        self.sockets = sockets;
        self
    }

    /// Cores per socket, or per node without sockets.
    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    pub fn gpus(mut self, gpus: usize) -> Self {
        self.gpus = gpus;
        self
    }

    pub fn memory(mut self, memory: i64) -> Self {
        self.memory = memory;
        self
    }

    pub fn exclusive_nodes(mut self) -> Self {
        self.exclusive_nodes = true;
        self
    }

    pub fn build(self) -> ResourceGraph {
        let mut graph = ResourceGraph::default();
        let dom = graph.add_subsystem(crate::DEFAULT_SUBSYSTEM);
        let cluster = add(&mut graph, PoolDescriptorBuilder::default().resource_type("cluster").id(0));
        for n in 0..self.nodes {
            let node = add(
                &mut graph,
                PoolDescriptorBuilder::default()
                    .resource_type("node")
                    .id(n as i64)
                    .exclusive(self.exclusive_nodes),
            );
            link(&mut graph, cluster, node, dom);
            let mut parents = Vec::new();
            if self.sockets == 0 {
                parents.push(node);
            }
            for s in 0..self.sockets {
                let socket = add(
                    &mut graph,
                    PoolDescriptorBuilder::default().resource_type("socket").id(s as i64),
                );
                link(&mut graph, node, socket, dom);
                parents.push(socket);
            }
            let mut core_id = 0;
            for parent in parents {
                for _ in 0..self.cores {
                    let core = add(
                        &mut graph,
                        PoolDescriptorBuilder::default().resource_type("core").id(core_id),
                    );
                    link(&mut graph, parent, core, dom);
                    core_id += 1;
                }
            }
            for g in 0..self.gpus {
                let gpu = add(
                    &mut graph,
                    PoolDescriptorBuilder::default().resource_type("gpu").id(g as i64),
                );
                link(&mut graph, node, gpu, dom);
            }
            if self.memory > 0 {
                let memory = add(
                    &mut graph,
                    PoolDescriptorBuilder::default()
                        .resource_type("memory")
                        .id(0)
                        .size(self.memory)
                        .unit("GB"),
                );
                link(&mut graph, node, memory, dom);
            }
        }
        graph
    }

    pub fn query(self) -> ResourceQuery {
        create_query(self.build(), "first")
    }
}

fn add(graph: &mut ResourceGraph, builder: PoolDescriptorBuilder) -> VertexId {
    graph.add_vertex(builder.build().unwrap()).unwrap()
}

fn link(graph: &mut ResourceGraph, parent: VertexId, child: VertexId, dom: SubsystemId) {
    graph.add_edge(parent, child, dom, CONTAINS_RELATION).unwrap();
}

pub fn containment(graph: &ResourceGraph) -> SubsystemId {
    graph.subsystem_id(crate::DEFAULT_SUBSYSTEM).unwrap()
}

pub fn vertex(graph: &ResourceGraph, path: &str) -> VertexId {
    graph
        .find_by_path(containment(graph), path)
        .unwrap_or_else(|| panic!("no pool at {path}"))
}

pub fn create_query(graph: ResourceGraph, policy: &str) -> ResourceQuery {
    let config = QueryConfig {
        policy: policy.to_string(),
        ..Default::default()
    };
    ResourceQuery::new(graph, config).unwrap()
}

/// Free units of every pool of the type during the window, summed.
pub fn free_of_type(graph: &ResourceGraph, resource_type: &str, at: i64, duration: u64) -> i64 {
    graph
        .pools()
        .filter(|pool| pool.resource_type() == resource_type)
        .map(|pool| pool.planner().avail_resources_during(at, duration).unwrap())
        .sum()
}
