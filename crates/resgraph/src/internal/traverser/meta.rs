use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Duration, JobId, Time, VertexId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    /// Allocate at the requested time or fail.
    Allocate,
    /// Allocate at the requested time, otherwise reserve at the earliest later time.
    AllocateOrElseReserve,
    /// Like `Allocate`, but report requests that can never fit as unsatisfiable.
    AllocateWithSatisfiability,
    /// Only check whether the request could ever fit; nothing is changed.
    Satisfiability,
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchOp::Allocate => "allocate",
            MatchOp::AllocateOrElseReserve => "allocate_orelse_reserve",
            MatchOp::AllocateWithSatisfiability => "allocate_with_satisfiability",
            MatchOp::Satisfiability => "satisfiability",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Allocated,
    Reserved,
    Satisfiable,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Allocated => "allocated",
            MatchStatus::Reserved => "reserved",
            MatchStatus::Satisfiable => "satisfiable",
        }
    }
}

/// Window and mode of one traversal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct JobMeta {
    pub at: Time,
    pub duration: Duration,
    /// Compare against total capacity and ignore status and current usage.
    pub satisfiability: bool,
}

impl JobMeta {
    pub fn new(at: Time, duration: Duration) -> Self {
        JobMeta {
            at,
            duration,
            satisfiability: false,
        }
    }

    pub fn satisfiability(at: Time, duration: Duration) -> Self {
        JobMeta {
            at,
            duration,
            satisfiability: true,
        }
    }
}

/// A pool taken by a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPool {
    pub vertex: VertexId,
    pub name: String,
    pub resource_type: String,
    /// Units of the pool's own capacity reserved; zero for pools that are only on the
    /// path to consumed pools.
    pub count: i64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub job_id: JobId,
    pub status: MatchStatus,
    pub at: Time,
    pub duration: Duration,
    pub pools: Vec<MatchedPool>,
}

impl MatchResult {
    pub fn pool(&self, vertex: VertexId) -> Option<&MatchedPool> {
        self.pools.iter().find(|pool| pool.vertex == vertex)
    }

    /// Units reserved on pools of the given type.
    pub fn count_of_type(&self, resource_type: &str) -> i64 {
        self.pools
            .iter()
            .filter(|pool| pool.resource_type == resource_type)
            .map(|pool| pool.count)
            .sum()
    }
}

/// Shared flag that aborts a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
