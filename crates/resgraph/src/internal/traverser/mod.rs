//! Depth-first matching of job specifications against the resource graph.
//!
//! A match is done in two halves. [`DfuTraverser::prepare`] walks the dominant
//! subsystem without touching it and produces a [`PreparedMatch`]; [`DfuTraverser::commit`]
//! writes the selected pools into their planners.

mod dfu;
mod meta;
mod primed;
mod select;
mod update;

pub use dfu::{DfuTraverser, PreparedMatch};
pub use meta::{CancelToken, MatchOp, MatchResult, MatchStatus, MatchedPool};
pub use select::Selection;
