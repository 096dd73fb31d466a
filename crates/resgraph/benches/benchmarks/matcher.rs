use criterion::{BatchSize, BenchmarkId, Criterion};

use resgraph::query::MatchRequest;
use resgraph::traverser::MatchOp;
use resgraph::JobId;

use crate::{build_cluster, create_query, node_cores};

fn bench_allocate(c: &mut Criterion) {
    for policy in ["first", "low", "locality"] {
        for nodes in [16, 256] {
            c.bench_with_input(
                BenchmarkId::new(format!("allocate {policy}"), nodes),
                &nodes,
                |b, &nodes| {
                    b.iter_batched_ref(
                        || create_query(build_cluster(nodes, 2, 16), policy),
                        |query| {
                            let request = MatchRequest::new(
                                JobId::new(1),
                                node_cores(4, 8),
                                MatchOp::Allocate,
                                0,
                            );
                            query.match_request(&request).unwrap();
                        },
                        BatchSize::SmallInput,
                    );
                },
            );
        }
    }
}

fn bench_fill_and_release(c: &mut Criterion) {
    for nodes in [16, 128] {
        c.bench_with_input(
            BenchmarkId::new("fill and release", nodes),
            &nodes,
            |b, &nodes| {
                b.iter_batched_ref(
                    || create_query(build_cluster(nodes, 2, 8), "first"),
                    |query| {
                        for id in 0..nodes as u64 {
                            let request =
                                MatchRequest::new(JobId::new(id), node_cores(1, 16), MatchOp::Allocate, 0);
                            query.match_request(&request).unwrap();
                        }
                        for id in 0..nodes as u64 {
                            query.release(JobId::new(id)).unwrap();
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

fn bench_reserve(c: &mut Criterion) {
    for nodes in [16, 128] {
        c.bench_with_input(BenchmarkId::new("reserve", nodes), &nodes, |b, &nodes| {
            b.iter_batched_ref(
                || {
                    let mut query = create_query(build_cluster(nodes, 2, 8), "first");
                    for id in 0..nodes as u64 {
                        let request =
                            MatchRequest::new(JobId::new(id), node_cores(1, 16), MatchOp::Allocate, 0);
                        query.match_request(&request).unwrap();
                    }
                    query
                },
                |query| {
                    let request = MatchRequest::new(
                        JobId::new(nodes as u64),
                        node_cores(2, 16),
                        MatchOp::AllocateOrElseReserve,
                        0,
                    );
                    query.match_request(&request).unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }
}

pub fn benchmark(c: &mut Criterion) {
    bench_allocate(c);
    bench_fill_and_release(c);
    bench_reserve(c);
}
