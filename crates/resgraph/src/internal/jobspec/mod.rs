//! In-memory resource requests.

mod count;
mod spec;

pub use count::{Count, CountOperator};
pub use spec::{Exclusivity, JobSpec, PropertyConstraint, ResourceSpec};
