//! Temporal availability planners.
//!
//! A planner keeps a timeline of scheduled points ordered by time. Each point records how
//! much is used and how much is free from its timestamp up to the next point. Spans
//! (reservations) modify the points in their range; removing a span restores the exact
//! point set that existed before it was inserted.

mod multi;
mod quantity;
mod single;
mod timeline;

pub use multi::MultiPlanner;
pub use quantity::{Quantity, ResourceCounts};
pub use single::Planner;
pub use timeline::{ScheduledPoint, Span};
