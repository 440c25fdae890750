// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_velocity --heading-base-level=0

//! Understory Velocity: pointer velocity estimation.
//!
//! This crate turns a stream of timed pointer positions into velocity
//! estimates, typically to decide whether a drag ended in a fling. It provides:
//! - [`LeastSquaresSolver`]: weighted polynomial least-squares fitting.
//! - [`VelocityTracker`]: the default estimator, fitting a quadratic per axis
//!   over the most recent samples.
//! - [`IosScrollViewFlingVelocityTracker`] and
//!   [`MacOsScrollViewFlingVelocityTracker`]: estimators that weight the last
//!   few segment velocities the way those platforms' scroll views do.
//!
//! All estimators implement [`VelocityEstimator`], so gesture code can pick a
//! strategy per pointer without caring which one it got.
//!
//! ## Time
//!
//! Estimators never read a clock. Samples are recorded with the timestamp of
//! the event that produced them, and estimates are evaluated as of a `now`
//! supplied by the caller. A pointer whose newest sample is more than
//! [`ASSUME_POINTER_MOVE_STOPPED`] older than `now` is reported as stopped.
//!
//! ## Example
//!
//! ```rust
//! use core::time::Duration;
//! use kurbo::Point;
//! use understory_velocity::{VelocityEstimator, VelocityTracker};
//!
//! let mut tracker = VelocityTracker::new();
//! tracker.add_position(Duration::from_millis(0), Point::new(0.0, 0.0));
//! tracker.add_position(Duration::from_millis(10), Point::new(0.0, 10.0));
//! tracker.add_position(Duration::from_millis(20), Point::new(0.0, 20.0));
//!
//! let estimate = tracker.velocity_estimate(Duration::from_millis(20)).unwrap();
//! assert!((estimate.pixels_per_second.y - 1000.0).abs() < 1e-6);
//! assert!(estimate.confidence > 0.99);
//!
//! // Much later, the pointer is considered to have stopped.
//! let later = tracker.velocity(Duration::from_millis(500));
//! assert_eq!(later.magnitude(), 0.0);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod estimate;
mod fling;
mod lsq;
mod tracker;

pub use estimate::{Velocity, VelocityEstimate};
pub use fling::{IosScrollViewFlingVelocityTracker, MacOsScrollViewFlingVelocityTracker};
pub use lsq::{LeastSquaresSolver, PRECISION_ERROR_TOLERANCE, PolynomialFit};
pub use tracker::{
    ASSUME_POINTER_MOVE_STOPPED, HISTORY_SIZE, HORIZON, VelocityEstimator, VelocityTracker,
};
