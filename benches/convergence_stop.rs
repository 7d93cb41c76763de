//! Benchmarks for the convergence engine `stop` path.
//!
//! Each iteration of a benchmark builds a fresh engine and feeds it a full run
//! of values, so the numbers cover recording, running statistics and the
//! criterion evaluation together.
//!
//! ```bash
//! cargo bench --bench convergence_stop
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion as Bench};
use radcoupler::domain::models::{Criterion, TrackedQuantity};
use radcoupler::services::ConvergenceEngine;

const ITERATIONS: usize = 20;

fn values(zones: usize, iteration: usize) -> Vec<Vec<f64>> {
    let wobble = 1.0 + 0.5 / (iteration as f64 + 1.0);
    vec![
        (0..zones).map(|zone| (zone as f64 + 1.0) * wobble).collect(),
        (0..zones).map(|zone| (zone as f64 + 2.0) * wobble).collect(),
    ]
}

fn run_engine(criterion: Criterion, zones: usize) -> usize {
    let mut engine = ConvergenceEngine::new(
        vec![
            TrackedQuantity::single("v500", 500.0, 1e-6),
            TrackedQuantity::band("optical", 400.0, 700.0, 1e-6),
        ],
        criterion,
        zones,
        ITERATIONS,
        1,
    )
    .unwrap();

    let mut stops = 0;
    for iteration in 0..=ITERATIONS {
        let verdict = engine
            .stop_with_values(iteration, &values(zones, iteration))
            .unwrap();
        stops += 1;
        if verdict.should_stop() {
            break;
        }
    }
    stops
}

fn bench_criteria(c: &mut Bench) {
    let mut group = c.benchmark_group("stop_by_criterion");
    for criterion in [
        Criterion::Previous,
        Criterion::Variance,
        Criterion::Statistic,
        Criterion::Both,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(criterion),
            &criterion,
            |b, &criterion| b.iter(|| run_engine(black_box(criterion), black_box(16))),
        );
    }
    group.finish();
}

fn bench_zone_scaling(c: &mut Bench) {
    let mut group = c.benchmark_group("stop_by_zones");
    for zones in [4usize, 32, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(zones), &zones, |b, &zones| {
            b.iter(|| run_engine(Criterion::Statistic, black_box(zones)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_criteria, bench_zone_scaling);
criterion_main!(benches);
