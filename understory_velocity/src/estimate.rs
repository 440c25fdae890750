// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Velocity values produced by the estimators.

use core::time::Duration;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Vec2;

/// A velocity in logical pixels per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Velocity on each axis, in logical pixels per second.
    pub pixels_per_second: Vec2,
}

impl Velocity {
    /// A velocity that is not moving at all.
    pub const ZERO: Self = Self {
        pixels_per_second: Vec2::ZERO,
    };

    /// Creates a velocity from per-axis pixels per second.
    #[must_use]
    pub const fn new(pixels_per_second: Vec2) -> Self {
        Self { pixels_per_second }
    }

    /// Speed, ignoring direction.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.pixels_per_second.hypot()
    }

    /// Returns a velocity in the same direction whose magnitude lies in
    /// `[min, max]`.
    ///
    /// A zero velocity stays zero because it has no direction.
    #[must_use]
    pub fn clamp_magnitude(self, min: f64, max: f64) -> Self {
        debug_assert!(
            min >= 0.0 && max >= 0.0 && max >= min,
            "clamp bounds must be non-negative and ordered"
        );
        let squared = self.pixels_per_second.hypot2();
        if squared > max * max {
            Self::new(self.pixels_per_second / squared.sqrt() * max)
        } else if squared < min * min && squared > 0.0 {
            Self::new(self.pixels_per_second / squared.sqrt() * min)
        } else {
            self
        }
    }
}

impl core::ops::Add for Velocity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.pixels_per_second + rhs.pixels_per_second)
    }
}

impl core::ops::Sub for Velocity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.pixels_per_second - rhs.pixels_per_second)
    }
}

impl core::ops::Neg for Velocity {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.pixels_per_second)
    }
}

/// A velocity estimated from a window of pointer samples.
///
/// Besides the velocity itself, an estimate records how much confidence the
/// estimator has in it and the window it was derived from: `duration` is the
/// time between the oldest and newest sample used, `offset` the displacement
/// over that time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityEstimate {
    /// Estimated velocity, in logical pixels per second.
    pub pixels_per_second: Vec2,
    /// Confidence in the estimate, typically in `[0, 1]`.
    pub confidence: f64,
    /// Time spanned by the samples used for the estimate.
    pub duration: Duration,
    /// Displacement between the oldest and newest samples used.
    pub offset: Vec2,
}

impl VelocityEstimate {
    /// An estimate for a pointer that is not moving.
    pub const STOPPED: Self = Self {
        pixels_per_second: Vec2::ZERO,
        confidence: 1.0,
        duration: Duration::ZERO,
        offset: Vec2::ZERO,
    };

    /// Converts the estimate into a plain velocity.
    #[must_use]
    pub fn velocity(&self) -> Velocity {
        Velocity::new(self.pixels_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_magnitude_caps_fast_velocities() {
        let v = Velocity::new(Vec2::new(3000.0, 4000.0)).clamp_magnitude(50.0, 1000.0);
        assert!((v.magnitude() - 1000.0).abs() < 1e-9);
        assert!((v.pixels_per_second.x - 600.0).abs() < 1e-9);
        assert!((v.pixels_per_second.y - 800.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_magnitude_raises_slow_velocities() {
        let v = Velocity::new(Vec2::new(0.0, -10.0)).clamp_magnitude(50.0, 1000.0);
        assert!((v.pixels_per_second.y + 50.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_magnitude_keeps_zero() {
        assert_eq!(Velocity::ZERO.clamp_magnitude(50.0, 1000.0), Velocity::ZERO);
    }

    #[test]
    fn arithmetic() {
        let a = Velocity::new(Vec2::new(1.0, 2.0));
        let b = Velocity::new(Vec2::new(3.0, 5.0));
        assert_eq!(a + b, Velocity::new(Vec2::new(4.0, 7.0)));
        assert_eq!(b - a, Velocity::new(Vec2::new(2.0, 3.0)));
        assert_eq!(-a, Velocity::new(Vec2::new(-1.0, -2.0)));
    }
}
