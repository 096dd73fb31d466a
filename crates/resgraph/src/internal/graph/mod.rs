//! Resource graph store.
//!
//! Pools are vertices, relations are edges. Every edge belongs to exactly one subsystem
//! (for example the "containment" hierarchy), and matching walks one subsystem at a time.

mod names;
mod pool;
mod relation;
mod resource_graph;

pub(crate) use names::NameMap;
pub use pool::{
    PoolDescriptor, PoolDescriptorBuilder, PoolJobData, PoolSchedule, PoolStatus, ResourcePool,
    X_CHECKER_JOBS_TYPE, X_CHECKER_NJOBS,
};
pub use relation::{CONTAINS_RELATION, IN_RELATION, ResourceRelation};
pub use resource_graph::{ResourceGraph, SLOT_TYPE};
