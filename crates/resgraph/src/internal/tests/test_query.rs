use crate::internal::common::error::RgError;
use crate::internal::config::QueryConfig;
use crate::internal::graph::PoolStatus;
use crate::internal::jobspec::{JobSpec, ResourceSpec};
use crate::internal::query::{MatchRequest, ResourceQuery};
use crate::internal::tests::utils::graph::{ClusterBuilder, vertex};
use crate::internal::tests::utils::jobspec::{TEST_DURATION, allocate, node_cores, request};
use crate::internal::tests::utils::{expect_error_message, sorted_vec};
use crate::internal::traverser::{CancelToken, MatchOp, MatchStatus};
use crate::JobId;

fn matched_names(query: &ResourceQuery, job_id: u64, resource_type: &str) -> Vec<String> {
    sorted_vec(
        query
            .job(JobId::new(job_id))
            .unwrap()
            .pools
            .iter()
            .filter(|pool| pool.resource_type == resource_type)
            .map(|pool| pool.name.clone())
            .collect(),
    )
}

#[test]
fn test_commit_of_stale_match_is_rejected() {
    let mut query = ClusterBuilder::new().cores(4).query();
    let first = query.prepare(&allocate(1, node_cores(1)), None).unwrap();
    let second = query.prepare(&allocate(2, node_cores(1)), None).unwrap();
    assert_eq!(first.generation(), second.generation());
    let generation = first.generation();

    query.commit(first).unwrap();
    match query.commit(second) {
        Err(RgError::StaleMatch { prepared, current }) => {
            assert_eq!(prepared, generation);
            assert!(current > generation);
        }
        other => panic!("Expected stale match, got {other:?}"),
    }
    assert!(query.job(JobId::new(2)).is_none());

    let again = query.prepare(&allocate(2, node_cores(1)), None).unwrap();
    query.commit(again).unwrap();
    assert_eq!(matched_names(&query, 1, "core"), vec!["core0"]);
    assert_eq!(matched_names(&query, 2, "core"), vec!["core1"]);
}

#[test]
fn test_cancelled_pending_match() {
    let mut query = ClusterBuilder::new().cores(4).query();
    let generation = query.graph().generation();
    let pending = query.prepare(&allocate(1, node_cores(2)), None).unwrap();
    assert_eq!(pending.status(), MatchStatus::Allocated);
    assert_eq!(pending.job_id(), JobId::new(1));
    query.cancel(pending);
    assert_eq!(query.graph().generation(), generation);
    assert!(query.jobs().is_empty());

    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
        query.prepare(&allocate(1, node_cores(2)), Some(&token)),
        Err(RgError::Cancelled)
    ));
    query.match_request(&allocate(1, node_cores(4))).unwrap();
}

#[test]
fn test_duplicate_job_is_rejected() {
    let mut query = ClusterBuilder::new().cores(4).query();
    query.match_request(&allocate(1, node_cores(1))).unwrap();
    expect_error_message(
        query.match_request(&allocate(1, node_cores(1))),
        "already matched",
    );
    assert_eq!(query.jobs().len(), 1);
}

#[test]
fn test_release() {
    let mut query = ClusterBuilder::new().nodes(2).cores(2).query();
    query.match_request(&allocate(3, node_cores(2))).unwrap();
    query.match_request(&allocate(1, node_cores(2))).unwrap();
    let error = query.match_request(&allocate(2, node_cores(1))).unwrap_err();
    assert!(matches!(error, RgError::NoFeasibleMatch(_)));
    assert!(error.is_retryable());
    let ids: Vec<JobId> = query.jobs().iter().map(|job| job.job_id).collect();
    assert_eq!(ids, vec![JobId::new(1), JobId::new(3)]);

    let released = query.release(JobId::new(3)).unwrap();
    assert_eq!(released.job_id, JobId::new(3));
    assert_eq!(released.count_of_type("core"), 2);
    assert!(query.job(JobId::new(3)).is_none());

    let result = query.match_request(&allocate(2, node_cores(1))).unwrap();
    assert_eq!(result.count_of_type("core"), 1);

    assert!(matches!(
        query.release(JobId::new(3)),
        Err(RgError::InconsistentRelease(_))
    ));
    let error = query.release(JobId::new(42)).unwrap_err();
    assert!(matches!(error, RgError::InconsistentRelease(_)));
    assert!(!error.is_retryable());
}

#[test]
fn test_reservation_is_tracked_and_released() {
    let mut query = ClusterBuilder::new().cores(2).query();
    query.match_request(&allocate(1, node_cores(2))).unwrap();
    let result = query
        .match_request(&request(2, node_cores(2), MatchOp::AllocateOrElseReserve, 0))
        .unwrap();
    assert_eq!(result.status, MatchStatus::Reserved);
    assert_eq!(result.at, TEST_DURATION as i64);
    assert_eq!(query.job(JobId::new(2)).unwrap().status, MatchStatus::Reserved);

    query.release(JobId::new(2)).unwrap();
    let result = query
        .match_request(&request(3, node_cores(2), MatchOp::Allocate, 10))
        .unwrap();
    assert_eq!(result.status, MatchStatus::Allocated);
}

#[test]
fn test_satisfiability_is_not_stored() {
    let mut query = ClusterBuilder::new().cores(4).query();
    let result = query
        .match_request(&request(1, node_cores(4), MatchOp::Satisfiability, 0))
        .unwrap();
    assert_eq!(result.status, MatchStatus::Satisfiable);
    assert!(result.pools.is_empty());
    assert!(query.job(JobId::new(1)).is_none());
    // The same id can be used for a real allocation afterwards.
    query.match_request(&allocate(1, node_cores(4))).unwrap();
    assert!(matches!(
        query.match_request(&request(2, node_cores(8), MatchOp::Satisfiability, 0)),
        Err(RgError::Unsatisfiable(_))
    ));
}

#[test]
fn test_mark_down_and_up() {
    let mut query = ClusterBuilder::new().nodes(2).cores(1).query();
    assert_eq!(query.mark("/cluster0/node0", PoolStatus::Down).unwrap(), 2);
    assert_eq!(query.mark("/cluster0/node0", PoolStatus::Down).unwrap(), 0);

    query.match_request(&allocate(1, node_cores(1))).unwrap();
    assert_eq!(matched_names(&query, 1, "node"), vec!["node1"]);
    assert!(matches!(
        query.match_request(&allocate(2, node_cores(1))),
        Err(RgError::NoFeasibleMatch(_))
    ));

    let node0 = vertex(query.graph(), "/cluster0/node0");
    query.mark_vertex(node0, PoolStatus::Up).unwrap();
    query.match_request(&allocate(2, node_cores(1))).unwrap();
    assert_eq!(matched_names(&query, 2, "node"), vec!["node0"]);

    expect_error_message(query.mark("/cluster0/node7", PoolStatus::Down), "no pool");
}

#[test]
fn test_down_pools_still_count_for_satisfiability() {
    let mut query = ClusterBuilder::new().cores(2).query();
    query.mark("/cluster0", PoolStatus::Down).unwrap();
    let result = query
        .match_request(&request(1, node_cores(2), MatchOp::Satisfiability, 0))
        .unwrap();
    assert_eq!(result.status, MatchStatus::Satisfiable);
    assert!(matches!(
        query.match_request(&request(1, node_cores(2), MatchOp::AllocateWithSatisfiability, 0)),
        Err(RgError::NoFeasibleMatch(_))
    ));
}

#[test]
fn test_pool_availability() {
    let mut query = ClusterBuilder::new().cores(4).query();
    query.match_request(&allocate(1, node_cores(1))).unwrap();
    let core0 = vertex(query.graph(), "/cluster0/node0/core0");
    let core1 = vertex(query.graph(), "/cluster0/node0/core1");
    assert_eq!(query.avail_at(core0, 5).unwrap(), 0);
    assert_eq!(query.avail_at(core0, 10).unwrap(), 1);
    assert_eq!(query.avail_at(core1, 5).unwrap(), 1);
    assert_eq!(query.avail_during(core0, 5, 10).unwrap(), 0);
    assert_eq!(query.avail_during(core0, 10, 10).unwrap(), 1);

    query.release(JobId::new(1)).unwrap();
    assert_eq!(query.avail_at(core0, 5).unwrap(), 1);
}

#[test]
fn test_query_from_toml_config() {
    let config = QueryConfig::from_toml_str(
        r#"
        policy = "high"
        prune_filters = "ALL:core"
        default_duration = 100
        max_duration = 1000
        "#,
    )
    .unwrap();
    let empty = ResourceQuery::graph_for(&config).unwrap();
    assert_eq!(empty.plan_duration(), config.plan_duration);
    assert_eq!(empty.pool_count(), 0);

    let graph = ClusterBuilder::new().cores(4).build();
    let mut query = ResourceQuery::new(graph, config).unwrap();
    assert_eq!(query.traverser().policy().name(), "high");

    let spec = JobSpec::new(vec![
        ResourceSpec::new("node", 1).child(ResourceSpec::new("core", 1)),
    ]);
    let result = query.match_request(&allocate(1, spec)).unwrap();
    assert_eq!(result.duration, 100);
    assert_eq!(matched_names(&query, 1, "core"), vec!["core3"]);

    let too_long = node_cores(1).with_duration(1001);
    assert!(matches!(
        query.match_request(&allocate(2, too_long)),
        Err(RgError::InvalidSpecification(_))
    ));
}

#[test]
fn test_invalid_configurations() {
    assert!(matches!(
        QueryConfig::from_toml_str("policy = \"random\""),
        Err(RgError::ConfigError(_))
    ));
    assert!(matches!(
        QueryConfig::from_toml_str("prune_filters = \"core\""),
        Err(RgError::ConfigError(_))
    ));
    let config = QueryConfig {
        subsystems: vec!["power".into()],
        ..Default::default()
    };
    expect_error_message(
        ResourceQuery::new(ClusterBuilder::new().build(), config),
        "not in the graph",
    );
}

#[test]
fn test_match_result_json() {
    let mut query = ClusterBuilder::new().cores(2).query();
    let result = query.match_request(&allocate(7, node_cores(1))).unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["job_id"], 7);
    assert_eq!(value["status"], "allocated");
    assert_eq!(value["duration"], TEST_DURATION);
    let names: Vec<&str> = value["pools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|pool| pool["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["cluster0", "node0", "core0"]);
}

#[test]
fn test_match_request_from_json() {
    let request: MatchRequest = serde_json::from_str(
        r#"{
            "job_id": 5,
            "op": "allocate_or_else_reserve",
            "at": 0,
            "policy": "low",
            "jobspec": {
                "duration": 20,
                "resources": [
                    {"type": "node", "count": 1, "with": [{"type": "core", "count": {"min": 1, "max": 3}}]}
                ]
            }
        }"#,
    )
    .unwrap();
    assert_eq!(request.op, MatchOp::AllocateOrElseReserve);
    let mut query = ClusterBuilder::new().cores(2).query();
    let result = query.match_request(&request).unwrap();
    assert_eq!(result.duration, 20);
    assert_eq!(result.count_of_type("core"), 2);
}
