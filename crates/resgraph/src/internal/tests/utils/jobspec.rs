use crate::internal::jobspec::{JobSpec, ResourceSpec};
use crate::internal::query::MatchRequest;
use crate::internal::traverser::MatchOp;
use crate::{Duration, JobId, Time};

pub const TEST_DURATION: Duration = 10;

/// `node[1] -> core[cores]`
pub fn node_cores(cores: u32) -> JobSpec {
    JobSpec::new(vec![
        ResourceSpec::new("node", 1).child(ResourceSpec::new("core", cores)),
    ])
    .with_duration(TEST_DURATION)
}

/// Cores anywhere in the graph.
pub fn cores(cores: u32) -> JobSpec {
    JobSpec::new(vec![ResourceSpec::new("core", cores)]).with_duration(TEST_DURATION)
}

pub fn request(job_id: u64, jobspec: JobSpec, op: MatchOp, at: Time) -> MatchRequest {
    MatchRequest::new(JobId::new(job_id), jobspec, op, at)
}

pub fn allocate(job_id: u64, jobspec: JobSpec) -> MatchRequest {
    request(job_id, jobspec, MatchOp::Allocate, 0)
}
