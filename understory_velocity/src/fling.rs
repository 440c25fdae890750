// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fling velocity estimators that mimic platform scroll views.
//!
//! Both estimators keep the same ring buffer as [`VelocityTracker`](crate::VelocityTracker)
//! but, instead of fitting a polynomial, take a weighted average of the
//! velocities of the three most recent segments between samples. Their
//! estimates always carry full confidence and no window information.

use core::time::Duration;

use kurbo::{Point, Vec2};

use crate::tracker::{ASSUME_POINTER_MOVE_STOPPED, HISTORY_SIZE, PointAtTime};
use crate::{VelocityEstimate, VelocityEstimator};

/// Ring buffer with segment velocity lookups.
#[derive(Clone, Debug)]
struct SegmentRing {
    samples: [Option<PointAtTime>; HISTORY_SIZE],
    index: usize,
}

impl SegmentRing {
    const fn new() -> Self {
        Self {
            samples: [None; HISTORY_SIZE],
            index: 0,
        }
    }

    fn push(&mut self, time: Duration, point: Point) {
        self.index = (self.index + 1) % HISTORY_SIZE;
        self.samples[self.index] = Some(PointAtTime { time, point });
    }

    fn newest(&self) -> Option<PointAtTime> {
        self.samples[self.index]
    }

    fn sample_back(&self, back: usize) -> Option<PointAtTime> {
        self.samples[(self.index + HISTORY_SIZE - back % HISTORY_SIZE) % HISTORY_SIZE]
    }

    /// Velocity of the segment ending `back` samples before the newest.
    fn segment_velocity(&self, back: usize) -> Vec2 {
        let (Some(end), Some(start)) = (self.sample_back(back), self.sample_back(back + 1)) else {
            return Vec2::ZERO;
        };
        let dt = end.time.saturating_sub(start.time);
        if dt.is_zero() {
            return Vec2::ZERO;
        }
        (end.point - start.point) / dt.as_secs_f64()
    }

    /// Weighted segment average; `weights[0]` applies to the oldest segment.
    fn estimate(&self, now: Duration, weights: [f64; 3]) -> Option<VelocityEstimate> {
        let newest = self.newest()?;
        if now.saturating_sub(newest.time) > ASSUME_POINTER_MOVE_STOPPED {
            return Some(VelocityEstimate::STOPPED);
        }
        let pixels_per_second = self.segment_velocity(2) * weights[0]
            + self.segment_velocity(1) * weights[1]
            + self.segment_velocity(0) * weights[2];
        Some(VelocityEstimate {
            pixels_per_second,
            confidence: 1.0,
            duration: Duration::ZERO,
            offset: Vec2::ZERO,
        })
    }
}

/// Velocity estimator matching the fling behavior of iOS scroll views.
///
/// Older segments dominate the estimate, which damps the deceleration that
/// typically happens right before a finger lifts.
#[derive(Clone, Debug)]
pub struct IosScrollViewFlingVelocityTracker {
    ring: SegmentRing,
}

impl IosScrollViewFlingVelocityTracker {
    const WEIGHTS: [f64; 3] = [0.6, 0.35, 0.05];

    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: SegmentRing::new(),
        }
    }
}

impl Default for IosScrollViewFlingVelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityEstimator for IosScrollViewFlingVelocityTracker {
    fn add_position(&mut self, time: Duration, position: Point) {
        self.ring.push(time, position);
    }

    fn velocity_estimate(&self, now: Duration) -> Option<VelocityEstimate> {
        self.ring.estimate(now, Self::WEIGHTS)
    }

    fn reset(&mut self) {
        self.ring = SegmentRing::new();
    }
}

/// Velocity estimator matching the fling behavior of macOS scroll views.
#[derive(Clone, Debug)]
pub struct MacOsScrollViewFlingVelocityTracker {
    ring: SegmentRing,
}

impl MacOsScrollViewFlingVelocityTracker {
    const WEIGHTS: [f64; 3] = [0.15, 0.65, 0.2];

    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: SegmentRing::new(),
        }
    }
}

impl Default for MacOsScrollViewFlingVelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityEstimator for MacOsScrollViewFlingVelocityTracker {
    fn add_position(&mut self, time: Duration, position: Point) {
        self.ring.push(time, position);
    }

    fn velocity_estimate(&self, now: Duration) -> Option<VelocityEstimate> {
        self.ring.estimate(now, Self::WEIGHTS)
    }

    fn reset(&mut self) {
        self.ring = SegmentRing::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn feed(tracker: &mut dyn VelocityEstimator, xs: &[f64]) {
        for (i, x) in xs.iter().enumerate() {
            tracker.add_position(ms(i as u64 * 10), Point::new(*x, 0.0));
        }
    }

    #[test]
    fn uniform_motion_gives_segment_velocity() {
        let mut ios = IosScrollViewFlingVelocityTracker::new();
        feed(&mut ios, &[0.0, 10.0, 20.0, 30.0]);
        let estimate = ios.velocity_estimate(ms(30)).unwrap();
        assert!((estimate.pixels_per_second.x - 1000.0).abs() < 1e-9);
        assert_eq!(estimate.confidence, 1.0);
        assert_eq!(estimate.duration, Duration::ZERO);
    }

    #[test]
    fn weights_favor_platform_segments() {
        // Segment velocities, oldest first: 1000, 2000, 4000 px/s.
        let xs = [0.0, 10.0, 30.0, 70.0];

        let mut ios = IosScrollViewFlingVelocityTracker::new();
        feed(&mut ios, &xs);
        let v = ios.velocity_estimate(ms(30)).unwrap().pixels_per_second.x;
        assert!((v - (600.0 + 700.0 + 200.0)).abs() < 1e-9);

        let mut mac = MacOsScrollViewFlingVelocityTracker::new();
        feed(&mut mac, &xs);
        let v = mac.velocity_estimate(ms(30)).unwrap().pixels_per_second.x;
        assert!((v - (150.0 + 1300.0 + 800.0)).abs() < 1e-9);
    }

    #[test]
    fn missing_segments_count_as_zero() {
        let mut ios = IosScrollViewFlingVelocityTracker::new();
        feed(&mut ios, &[0.0, 10.0]);
        let v = ios.velocity_estimate(ms(10)).unwrap().pixels_per_second.x;
        assert!((v - 50.0).abs() < 1e-9);
    }

    #[test]
    fn stopped_and_empty() {
        let mut mac = MacOsScrollViewFlingVelocityTracker::new();
        assert!(mac.velocity_estimate(ms(0)).is_none());
        feed(&mut mac, &[0.0, 10.0, 20.0]);
        assert_eq!(
            mac.velocity_estimate(ms(100)).unwrap(),
            VelocityEstimate::STOPPED
        );
        mac.reset();
        assert!(mac.velocity_estimate(ms(100)).is_none());
    }
}
