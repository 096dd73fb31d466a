use serde::{Deserialize, Serialize};

use crate::{SubsystemId, VertexId};

pub const CONTAINS_RELATION: &str = "contains";
pub const IN_RELATION: &str = "in";

/// Directed edge between two pools, visible only in one subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelation {
    pub source: VertexId,
    pub target: VertexId,
    pub subsystem: SubsystemId,
    pub relation: String,
}

impl ResourceRelation {
    #[inline]
    pub fn is_containment(&self) -> bool {
        self.relation == CONTAINS_RELATION
    }
}
