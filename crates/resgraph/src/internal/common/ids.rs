use crate::define_id_type;

define_id_type!(VertexId, u32);
define_id_type!(EdgeId, u32);
define_id_type!(SubsystemId, u32);
define_id_type!(ResourceTypeId, u32);
define_id_type!(SpanId, u64);
define_id_type!(JobId, u64);

/// What a specification node matches against: a concrete resource type or a slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum TypeKey {
    Resource(ResourceTypeId),
    Slot,
}
