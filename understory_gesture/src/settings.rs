// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture timings, distances, and per-device slop settings.

use core::time::Duration;

use crate::event::PointerDeviceKind;

/// Time a pointer must stay down before a tap is reported as pressed.
pub const PRESS_TIMEOUT: Duration = Duration::from_millis(100);

/// Time a pointer must stay down before it counts as a long press.
pub const LONG_PRESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum time between an up and the next down of a double tap.
pub const DOUBLE_TAP_TIMEOUT: Duration = Duration::from_millis(300);

/// Maximum distance between the downs of consecutive taps.
pub const DOUBLE_TAP_SLOP: f64 = 100.0;

/// Maximum distance a touch may travel from its down position and still
/// count as a tap or double tap.
pub const DOUBLE_TAP_TOUCH_SLOP: f64 = TOUCH_SLOP;

/// Distance a touch may travel before it counts as a drag.
pub const TOUCH_SLOP: f64 = 18.0;

/// Distance a touch may travel before it counts as a pan.
pub const PAN_SLOP: f64 = TOUCH_SLOP * 2.0;

/// Drag threshold for precise pointers such as a mouse.
pub const PRECISE_POINTER_HIT_SLOP: f64 = 1.0;

/// Pan threshold for precise pointers such as a mouse.
pub const PRECISE_POINTER_PAN_SLOP: f64 = PRECISE_POINTER_HIT_SLOP * 2.0;

/// Minimum distance a drag must cover to count as a fling.
pub const MIN_FLING_DISTANCE: f64 = TOUCH_SLOP;

/// Minimum velocity, in logical pixels per second, for a fling.
pub const MIN_FLING_VELOCITY: f64 = 50.0;

/// Maximum velocity, in logical pixels per second, reported for a fling.
pub const MAX_FLING_VELOCITY: f64 = 8000.0;

/// Per-device slop overrides, typically derived from platform settings.
///
/// Unset fields fall back to the toolkit constants. Mouse pointers always use
/// the precise slops.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureSettings {
    /// Overrides [`TOUCH_SLOP`].
    pub touch_slop: Option<f64>,
    /// Overrides [`PAN_SLOP`]. When unset but `touch_slop` is set, twice the
    /// touch slop is used.
    pub pan_slop: Option<f64>,
}

impl GestureSettings {
    /// Settings derived from a platform touch slop.
    #[must_use]
    pub const fn with_touch_slop(touch_slop: f64) -> Self {
        Self {
            touch_slop: Some(touch_slop),
            pan_slop: None,
        }
    }

    /// Distance `kind` may travel before a drag is recognized.
    #[must_use]
    pub fn hit_slop(&self, kind: PointerDeviceKind) -> f64 {
        match kind {
            PointerDeviceKind::Mouse => PRECISE_POINTER_HIT_SLOP,
            _ => self.touch_slop.unwrap_or(TOUCH_SLOP),
        }
    }

    /// Distance `kind` may travel before a pan is recognized.
    #[must_use]
    pub fn pan_slop(&self, kind: PointerDeviceKind) -> f64 {
        match kind {
            PointerDeviceKind::Mouse => PRECISE_POINTER_PAN_SLOP,
            _ => self
                .pan_slop
                .or(self.touch_slop.map(|slop| slop * 2.0))
                .unwrap_or(PAN_SLOP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_constants() {
        let settings = GestureSettings::default();
        assert_eq!(settings.hit_slop(PointerDeviceKind::Touch), TOUCH_SLOP);
        assert_eq!(settings.pan_slop(PointerDeviceKind::Stylus), PAN_SLOP);
        assert_eq!(
            settings.hit_slop(PointerDeviceKind::Mouse),
            PRECISE_POINTER_HIT_SLOP
        );
        assert_eq!(
            settings.pan_slop(PointerDeviceKind::Mouse),
            PRECISE_POINTER_PAN_SLOP
        );
    }

    #[test]
    fn touch_slop_override_scales_pan_slop() {
        let settings = GestureSettings::with_touch_slop(10.0);
        assert_eq!(settings.hit_slop(PointerDeviceKind::Touch), 10.0);
        assert_eq!(settings.pan_slop(PointerDeviceKind::Touch), 20.0);
        // Mouse ignores overrides.
        assert_eq!(settings.hit_slop(PointerDeviceKind::Mouse), 1.0);
    }

    #[test]
    fn explicit_pan_slop_wins() {
        let settings = GestureSettings {
            touch_slop: Some(10.0),
            pan_slop: Some(50.0),
        };
        assert_eq!(settings.pan_slop(PointerDeviceKind::Trackpad), 50.0);
    }
}
