use criterion::{BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

use resgraph::planner::{MultiPlanner, Planner};

const HORIZON: u64 = 1_000_000;

fn planner_with_spans(span_count: usize) -> Planner {
    let mut planner = Planner::new(0, HORIZON, 64, "core").unwrap();
    for i in 0..span_count {
        let start = (i as i64 * 37) % (HORIZON as i64 - 1000);
        let _ = planner.add_span(start, 100, 1);
    }
    planner
}

fn bench_add_span(c: &mut Criterion) {
    for span_count in [10, 1_000, 10_000] {
        c.bench_with_input(
            BenchmarkId::new("add span", span_count),
            &span_count,
            |b, &span_count| {
                b.iter_batched_ref(
                    || planner_with_spans(span_count),
                    |planner| {
                        let _ = planner.add_span(500, 100, 1);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

fn bench_rem_span(c: &mut Criterion) {
    for span_count in [10, 1_000, 10_000] {
        c.bench_with_input(
            BenchmarkId::new("remove span", span_count),
            &span_count,
            |b, &span_count| {
                b.iter_batched_ref(
                    || {
                        let mut planner = planner_with_spans(span_count);
                        let span = planner.add_span(500, 100, 1).unwrap();
                        (planner, span)
                    },
                    |(planner, span)| {
                        planner.rem_span(*span).unwrap();
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

fn bench_avail_time_first(c: &mut Criterion) {
    for span_count in [10, 1_000, 10_000] {
        c.bench_with_input(
            BenchmarkId::new("earliest fit", span_count),
            &span_count,
            |b, &span_count| {
                b.iter_batched_ref(
                    || planner_with_spans(span_count),
                    |planner| {
                        black_box(planner.avail_time_first(0, 1000, 60).unwrap());
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

fn bench_multi_avail_during(c: &mut Criterion) {
    for span_count in [10, 1_000, 10_000] {
        c.bench_with_input(
            BenchmarkId::new("multi planner window check", span_count),
            &span_count,
            |b, &span_count| {
                let mut planner =
                    MultiPlanner::new(0, HORIZON, &[128, 16, 4096], &["core", "gpu", "memory"])
                        .unwrap();
                for i in 0..span_count {
                    let start = (i as i64 * 53) % (HORIZON as i64 - 1000);
                    let _ = planner.add_span(start, 200, &[2, 1, 64]);
                }
                b.iter(|| black_box(planner.avail_during(1000, 5000, &[64, 8, 1024]).unwrap()));
            },
        );
    }
}

pub fn benchmark(c: &mut Criterion) {
    bench_add_span(c);
    bench_rem_span(c);
    bench_avail_time_first(c);
    bench_multi_avail_during(c);
}
