#[macro_use]
pub mod index;

pub use crate::internal::common::{Map, Set};
