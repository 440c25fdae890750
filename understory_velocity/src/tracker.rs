// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Least-squares velocity tracking over a ring buffer of pointer samples.

use core::fmt;
use core::time::Duration;

use kurbo::{Point, Vec2};

use crate::{LeastSquaresSolver, Velocity, VelocityEstimate};

/// Number of samples kept by the ring buffers.
pub const HISTORY_SIZE: usize = 20;

/// Samples older than this, relative to the newest, are not used.
pub const HORIZON: Duration = Duration::from_millis(100);

/// A pointer that has not produced a sample for this long is considered stopped.
///
/// The same limit applies to gaps between consecutive samples inside the
/// estimation window.
pub const ASSUME_POINTER_MOVE_STOPPED: Duration = Duration::from_millis(40);

/// Minimum number of samples needed for a polynomial fit.
const MIN_SAMPLE_SIZE: usize = 3;

/// Degree of the per-axis polynomial fitted over time.
const FIT_DEGREE: usize = 2;

/// A position observed at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointAtTime {
    pub(crate) time: Duration,
    pub(crate) point: Point,
}

pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// A strategy for estimating pointer velocity from timed samples.
///
/// Time is supplied by the caller: [`add_position`](Self::add_position)
/// records a sample at a timestamp and [`velocity_estimate`](Self::velocity_estimate)
/// evaluates the samples as of `now`, usually the timestamp of the event that
/// ends the gesture. An estimator whose newest sample is older than
/// [`ASSUME_POINTER_MOVE_STOPPED`] reports a stopped pointer.
pub trait VelocityEstimator: fmt::Debug {
    /// Records the pointer position at `time`.
    fn add_position(&mut self, time: Duration, position: Point);

    /// Estimates the velocity as of `now`.
    ///
    /// Returns `None` when no sample has been recorded.
    fn velocity_estimate(&self, now: Duration) -> Option<VelocityEstimate>;

    /// Forgets every recorded sample.
    fn reset(&mut self);

    /// The estimated velocity as of `now`, or zero without a usable estimate.
    fn velocity(&self, now: Duration) -> Velocity {
        match self.velocity_estimate(now) {
            Some(estimate) if estimate.pixels_per_second != Vec2::ZERO => estimate.velocity(),
            _ => Velocity::ZERO,
        }
    }
}

/// Estimates velocity by fitting a quadratic to recent samples on each axis.
///
/// Up to [`HISTORY_SIZE`] samples are kept; the oldest is overwritten first.
/// Only samples within [`HORIZON`] of the newest, with no gap larger than
/// [`ASSUME_POINTER_MOVE_STOPPED`] between neighbors, contribute to a fit.
///
/// ```
/// use core::time::Duration;
/// use kurbo::Point;
/// use understory_velocity::{VelocityEstimator, VelocityTracker};
///
/// let mut tracker = VelocityTracker::new();
/// for i in 0..3_u32 {
///     let t = Duration::from_millis(u64::from(i) * 10);
///     tracker.add_position(t, Point::new(f64::from(i) * 10.0, 0.0));
/// }
/// let estimate = tracker.velocity_estimate(Duration::from_millis(20)).unwrap();
/// assert!((estimate.pixels_per_second.x - 1000.0).abs() < 1e-6);
/// ```
#[derive(Clone, Debug)]
pub struct VelocityTracker {
    samples: [Option<PointAtTime>; HISTORY_SIZE],
    index: usize,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [None; HISTORY_SIZE],
            index: 0,
        }
    }
}

impl VelocityEstimator for VelocityTracker {
    fn add_position(&mut self, time: Duration, position: Point) {
        self.index = (self.index + 1) % HISTORY_SIZE;
        self.samples[self.index] = Some(PointAtTime {
            time,
            point: position,
        });
    }

    fn velocity_estimate(&self, now: Duration) -> Option<VelocityEstimate> {
        let newest = self.samples[self.index]?;
        if now.saturating_sub(newest.time) > ASSUME_POINTER_MOVE_STOPPED {
            return Some(VelocityEstimate::STOPPED);
        }

        let mut x = [0.0; HISTORY_SIZE];
        let mut y = [0.0; HISTORY_SIZE];
        let mut w = [0.0; HISTORY_SIZE];
        let mut time = [0.0; HISTORY_SIZE];
        let mut count = 0;

        let mut index = self.index;
        let mut previous = newest;
        let mut oldest = newest;
        while count < HISTORY_SIZE {
            let Some(sample) = self.samples[index] else {
                break;
            };
            let age = newest.time.saturating_sub(sample.time);
            let gap = sample.time.abs_diff(previous.time);
            previous = sample;
            if age > HORIZON || gap > ASSUME_POINTER_MOVE_STOPPED {
                break;
            }

            oldest = sample;
            x[count] = sample.point.x;
            y[count] = sample.point.y;
            w[count] = 1.0;
            time[count] = -millis(age);

            index = if index == 0 { HISTORY_SIZE } else { index } - 1;
            count += 1;
        }

        let duration = newest.time.saturating_sub(oldest.time);
        let offset = newest.point - oldest.point;

        if count >= MIN_SAMPLE_SIZE {
            let x_fit = LeastSquaresSolver::new(&time[..count], &x[..count], &w[..count])
                .solve(FIT_DEGREE);
            let y_fit = LeastSquaresSolver::new(&time[..count], &y[..count], &w[..count])
                .solve(FIT_DEGREE);
            if let (Some(x_fit), Some(y_fit)) = (x_fit, y_fit) {
                return Some(VelocityEstimate {
                    // Coefficients are per millisecond.
                    pixels_per_second: Vec2::new(
                        x_fit.coefficients[1] * 1000.0,
                        y_fit.coefficients[1] * 1000.0,
                    ),
                    confidence: x_fit.confidence * y_fit.confidence,
                    duration,
                    offset,
                });
            }
        }

        Some(VelocityEstimate {
            pixels_per_second: Vec2::ZERO,
            confidence: 1.0,
            duration,
            offset,
        })
    }

    fn reset(&mut self) {
        self.samples = [None; HISTORY_SIZE];
        self.index = 0;
    }
}
