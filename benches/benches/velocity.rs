// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kurbo::Point;
use understory_velocity::{
    IosScrollViewFlingVelocityTracker, LeastSquaresSolver, MacOsScrollViewFlingVelocityTracker,
    VelocityEstimator, VelocityTracker,
};

/// A decelerating swipe sampled every 8ms.
fn swipe(count: u64) -> Vec<(Duration, Point)> {
    (0..count)
        .map(|i| {
            let t = i as f64 * 0.008;
            let x = 2_000.0 * t - 4_000.0 * t * t;
            (Duration::from_millis(i * 8), Point::new(x, x * 0.5))
        })
        .collect()
}

fn bench_solver(c: &mut Criterion) {
    let samples = swipe(20);
    let x: Vec<f64> = samples.iter().map(|(t, _)| -t.as_secs_f64()).collect();
    let y: Vec<f64> = samples.iter().map(|(_, p)| p.x).collect();
    let w = vec![1.0; x.len()];

    let mut group = c.benchmark_group("lsq_solver");
    for degree in [1_usize, 2] {
        group.bench_function(format!("degree_{degree}"), |b| {
            b.iter(|| {
                let solver = LeastSquaresSolver::new(black_box(&x), black_box(&y), &w);
                black_box(solver.solve(degree))
            });
        });
    }
    group.finish();
}

fn bench_estimators(c: &mut Criterion) {
    let samples = swipe(40);
    let now = samples.last().map_or(Duration::ZERO, |(t, _)| *t);

    let mut group = c.benchmark_group("velocity_estimate");
    let builders: [(&str, fn() -> Box<dyn VelocityEstimator>); 3] = [
        ("least_squares", || Box::new(VelocityTracker::new())),
        ("ios", || Box::new(IosScrollViewFlingVelocityTracker::new())),
        ("macos", || Box::new(MacOsScrollViewFlingVelocityTracker::new())),
    ];
    for (name, build) in builders {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let mut estimator = build();
                    for (t, p) in &samples {
                        estimator.add_position(*t, *p);
                    }
                    estimator
                },
                |estimator| black_box(estimator.velocity_estimate(now)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    c.bench_function("velocity_tracker_add_position", |b| {
        let mut tracker = VelocityTracker::new();
        let mut i = 0_u64;
        b.iter(|| {
            i += 1;
            tracker.add_position(Duration::from_millis(i), black_box(Point::new(i as f64, 0.0)));
        });
    });
}

criterion_group!(benches, bench_solver, bench_estimators);
criterion_main!(benches);
