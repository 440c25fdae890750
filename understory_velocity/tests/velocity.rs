// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_velocity` crate.
//!
//! These feed realistic pointer traces through each estimator and check the
//! estimates against the motion that produced them.

use core::time::Duration;

use kurbo::{Point, Vec2};
use understory_velocity::{
    IosScrollViewFlingVelocityTracker, MacOsScrollViewFlingVelocityTracker, Velocity,
    VelocityEstimator, VelocityTracker,
};

fn trace(estimator: &mut dyn VelocityEstimator, start_ms: u64, step_ms: u64, points: &[Point]) {
    for (i, point) in points.iter().enumerate() {
        let t = Duration::from_millis(start_ms + step_ms * i as u64);
        estimator.add_position(t, *point);
    }
}

fn diagonal(count: usize, step: f64) -> Vec<Point> {
    (0..count)
        .map(|i| Point::new(i as f64 * step, i as f64 * -step))
        .collect()
}

#[test]
fn least_squares_tracks_diagonal_motion() {
    let mut tracker = VelocityTracker::new();
    // 8px per 8ms on each axis.
    trace(&mut tracker, 1_000, 8, &diagonal(10, 8.0));

    let now = Duration::from_millis(1_072);
    let estimate = tracker.velocity_estimate(now).unwrap();
    assert!((estimate.pixels_per_second.x - 1000.0).abs() < 1e-6);
    assert!((estimate.pixels_per_second.y + 1000.0).abs() < 1e-6);
    assert!(estimate.confidence > 0.99);
    assert_eq!(estimate.offset, Vec2::new(72.0, -72.0));
}

#[test]
fn least_squares_follows_acceleration() {
    let mut tracker = VelocityTracker::new();
    // x = t² / 10 with t in ms: instantaneous velocity at the newest sample is 2t/10 px/ms.
    let points: Vec<Point> = (0..6)
        .map(|i| {
            let t = f64::from(i) * 10.0;
            Point::new(t * t / 10.0, 0.0)
        })
        .collect();
    trace(&mut tracker, 0, 10, &points);

    let estimate = tracker
        .velocity_estimate(Duration::from_millis(50))
        .unwrap();
    assert!((estimate.pixels_per_second.x - 10_000.0).abs() < 1e-3);
}

#[test]
fn every_estimator_reports_stopped_after_pause() {
    let mut estimators: Vec<Box<dyn VelocityEstimator>> = vec![
        Box::new(VelocityTracker::new()),
        Box::new(IosScrollViewFlingVelocityTracker::new()),
        Box::new(MacOsScrollViewFlingVelocityTracker::new()),
    ];
    for estimator in &mut estimators {
        trace(estimator.as_mut(), 0, 10, &diagonal(5, 10.0));
        assert_ne!(estimator.velocity(Duration::from_millis(40)), Velocity::ZERO);
        assert_eq!(estimator.velocity(Duration::from_millis(200)), Velocity::ZERO);
    }
}

#[test]
fn platform_estimators_agree_on_uniform_motion() {
    let mut ios = IosScrollViewFlingVelocityTracker::new();
    let mut mac = MacOsScrollViewFlingVelocityTracker::new();
    let points = diagonal(6, 5.0);
    trace(&mut ios, 0, 5, &points);
    trace(&mut mac, 0, 5, &points);

    let now = Duration::from_millis(25);
    let a = ios.velocity(now).pixels_per_second;
    let b = mac.velocity(now).pixels_per_second;
    assert!((a - b).hypot() < 1e-6);
    assert!((a.x - 1000.0).abs() < 1e-6);
}

#[test]
fn fling_clamp_applies_to_estimates() {
    let mut tracker = VelocityTracker::new();
    trace(&mut tracker, 0, 1, &diagonal(5, 20.0));
    let velocity = tracker
        .velocity(Duration::from_millis(4))
        .clamp_magnitude(50.0, 8000.0);
    assert!((velocity.magnitude() - 8000.0).abs() < 1e-6);
}
