//! Score bookkeeping used while matching.

mod api;
mod evals;
mod fold;

pub use api::ScoringApi;
pub use evals::{EvalEdge, EvalGroup, Evals};
pub use fold::{Fold, ScoreAccumulator};

/// Overall score of a vertex whose requirements are not met.
pub const MATCH_UNMET: i64 = 0;
/// Base score of a vertex whose requirements are met.
pub const MATCH_MET: i64 = 1;
