// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer events consumed by the router, the arena and the recognizers.
//!
//! A [`PointerEvent`] carries its position twice: once in the global (view)
//! coordinate space and once in the local space of whoever is looking at it.
//! Listeners never receive the global event directly; the router and the
//! binding hand them [`PointerEvent::transformed`] copies so that
//! `local_position` and `local_delta` are expressed in the listener's space.
//!
//! ## Building events
//!
//! ```
//! use core::time::Duration;
//! use kurbo::{Affine, Point, Vec2};
//! use understory_gesture::{PointerEvent, PointerId};
//!
//! let down = PointerEvent::down(PointerId(1), Point::new(10.0, 10.0))
//!     .with_timestamp(Duration::from_millis(16));
//! let moved = PointerEvent::moved(PointerId(1), Point::new(14.0, 10.0))
//!     .with_delta(Vec2::new(4.0, 0.0));
//!
//! let local = moved.transformed(Some(Affine::translate((-10.0, 0.0))));
//! assert_eq!(local.local_position, Point::new(4.0, 10.0));
//! assert_eq!(local.local_delta, Vec2::new(4.0, 0.0));
//! assert_eq!(down.position, Point::new(10.0, 10.0));
//! ```

use core::ops::{Add, AddAssign, Sub};
use core::time::Duration;

use kurbo::{Affine, Point, Vec2};

/// Identifies one contact sequence, unique from down to up or cancel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u64);

/// Identifies a physical input device; stable across contact sequences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Identifies the view (window) an event was delivered to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// The kind of device that produced a pointer event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerDeviceKind {
    /// A finger on a touch screen.
    #[default]
    Touch,
    /// A mouse or mouse-like pointer.
    Mouse,
    /// A stylus tip.
    Stylus,
    /// The eraser end of a stylus.
    InvertedStylus,
    /// A trackpad, reporting pan/zoom gestures rather than contact points.
    Trackpad,
    /// A device that did not identify itself.
    Unknown,
}

bitflags::bitflags! {
    /// A set of [`PointerDeviceKind`]s.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PointerDeviceKinds: u8 {
        /// [`PointerDeviceKind::Touch`].
        const TOUCH           = 0b0000_0001;
        /// [`PointerDeviceKind::Mouse`].
        const MOUSE           = 0b0000_0010;
        /// [`PointerDeviceKind::Stylus`].
        const STYLUS          = 0b0000_0100;
        /// [`PointerDeviceKind::InvertedStylus`].
        const INVERTED_STYLUS = 0b0000_1000;
        /// [`PointerDeviceKind::Trackpad`].
        const TRACKPAD        = 0b0001_0000;
        /// [`PointerDeviceKind::Unknown`].
        const UNKNOWN         = 0b0010_0000;
    }
}

impl PointerDeviceKind {
    /// The single-kind set containing `self`.
    #[must_use]
    pub const fn as_flag(self) -> PointerDeviceKinds {
        match self {
            Self::Touch => PointerDeviceKinds::TOUCH,
            Self::Mouse => PointerDeviceKinds::MOUSE,
            Self::Stylus => PointerDeviceKinds::STYLUS,
            Self::InvertedStylus => PointerDeviceKinds::INVERTED_STYLUS,
            Self::Trackpad => PointerDeviceKinds::TRACKPAD,
            Self::Unknown => PointerDeviceKinds::UNKNOWN,
        }
    }
}

impl PointerDeviceKinds {
    /// Returns `true` if `kind` is part of the set.
    #[must_use]
    pub const fn contains_kind(self, kind: PointerDeviceKind) -> bool {
        self.contains(kind.as_flag())
    }
}

impl From<PointerDeviceKind> for PointerDeviceKinds {
    fn from(kind: PointerDeviceKind) -> Self {
        kind.as_flag()
    }
}

bitflags::bitflags! {
    /// Pressed buttons of a pointer.
    ///
    /// Touch contacts and stylus tips report [`PRIMARY`](Self::PRIMARY) while
    /// down.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PointerButtons: u32 {
        /// Left mouse button, touch contact, stylus contact.
        const PRIMARY   = 0b0000_0001;
        /// Right mouse button, first stylus barrel button.
        const SECONDARY = 0b0000_0010;
        /// Middle mouse button, second stylus barrel button.
        const TERTIARY  = 0b0000_0100;
        /// Back mouse button.
        const BACK      = 0b0000_1000;
        /// Forward mouse button.
        const FORWARD   = 0b0001_0000;
    }
}

/// What happened to a pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEventKind {
    /// The device became known to the system.
    Added,
    /// The device is no longer known to the system.
    Removed,
    /// The pointer moved without being in contact.
    Hover,
    /// The pointer made contact.
    Down,
    /// The pointer moved while in contact.
    Move,
    /// The pointer stopped making contact.
    Up,
    /// The contact sequence was aborted by the platform.
    Cancel,
    /// A discrete scroll signal.
    Scroll {
        /// Scroll amount in logical pixels.
        scroll_delta: Vec2,
    },
    /// A signal asking any running scroll inertia to stop.
    ScrollInertiaCancel,
    /// A trackpad pan/zoom sequence began.
    PanZoomStart,
    /// A trackpad pan/zoom sequence progressed.
    PanZoomUpdate {
        /// Total pan since the start, in global coordinates.
        pan: Vec2,
        /// Pan since the previous update, in global coordinates.
        pan_delta: Vec2,
        /// Total pan since the start, in local coordinates.
        local_pan: Vec2,
        /// Pan since the previous update, in local coordinates.
        local_pan_delta: Vec2,
        /// Scale factor since the start.
        scale: f64,
        /// Rotation in radians since the start.
        rotation: f64,
    },
    /// A trackpad pan/zoom sequence ended.
    PanZoomEnd,
}

impl PointerEventKind {
    /// Returns `true` for discrete signal events resolved by the
    /// [`PointerSignalResolver`](crate::PointerSignalResolver).
    #[must_use]
    pub const fn is_signal(&self) -> bool {
        matches!(self, Self::Scroll { .. } | Self::ScrollInertiaCancel)
    }

    /// Returns `true` for events that end a contact or pan/zoom sequence.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::Up | Self::Cancel | Self::PanZoomEnd)
    }
}

/// A single pointer event.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// What happened.
    pub kind: PointerEventKind,
    /// View the event was delivered to.
    pub view_id: ViewId,
    /// Time the event was generated, on the host's monotonic clock.
    pub timestamp: Duration,
    /// Contact sequence the event belongs to.
    pub pointer: PointerId,
    /// Physical device that produced the event.
    pub device: DeviceId,
    /// Kind of device that produced the event.
    pub device_kind: PointerDeviceKind,
    /// Position in global coordinates.
    pub position: Point,
    /// Position in the coordinate space of the current listener.
    pub local_position: Point,
    /// Movement since the previous event, in global coordinates.
    pub delta: Vec2,
    /// Movement since the previous event, in local coordinates.
    pub local_delta: Vec2,
    /// Buttons pressed when the event was generated.
    pub buttons: PointerButtons,
    /// Whether the pointer is in contact.
    pub down: bool,
    /// Global-to-local transform applied by [`transformed`](Self::transformed).
    pub transform: Option<Affine>,
    /// Whether the event was synthesized rather than reported by a device.
    pub synthesized: bool,
}

impl PointerEvent {
    /// Creates an event of `kind` at `position` with no movement.
    #[must_use]
    pub fn new(kind: PointerEventKind, pointer: PointerId, position: Point) -> Self {
        let (down, buttons) = match kind {
            PointerEventKind::Down | PointerEventKind::Move => (true, PointerButtons::PRIMARY),
            _ => (false, PointerButtons::empty()),
        };
        Self {
            kind,
            view_id: ViewId::default(),
            timestamp: Duration::ZERO,
            pointer,
            device: DeviceId::default(),
            device_kind: PointerDeviceKind::default(),
            position,
            local_position: position,
            delta: Vec2::ZERO,
            local_delta: Vec2::ZERO,
            buttons,
            down,
            transform: None,
            synthesized: false,
        }
    }

    /// A primary-button down event.
    #[must_use]
    pub fn down(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Down, pointer, position)
    }

    /// A move event with the primary button held; set the delta with
    /// [`with_delta`](Self::with_delta).
    #[must_use]
    pub fn moved(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Move, pointer, position)
    }

    /// An up event.
    #[must_use]
    pub fn up(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Up, pointer, position)
    }

    /// A cancel event.
    #[must_use]
    pub fn cancel(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Cancel, pointer, position)
    }

    /// A hover event.
    #[must_use]
    pub fn hover(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Hover, pointer, position)
    }

    /// A scroll signal.
    #[must_use]
    pub fn scroll(pointer: PointerId, position: Point, scroll_delta: Vec2) -> Self {
        Self::new(PointerEventKind::Scroll { scroll_delta }, pointer, position)
    }

    /// The start of a trackpad pan/zoom sequence.
    #[must_use]
    pub fn pan_zoom_start(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::PanZoomStart, pointer, position)
            .with_device_kind(PointerDeviceKind::Trackpad)
    }

    /// A trackpad pan/zoom update with the given total pan and pan delta.
    #[must_use]
    pub fn pan_zoom_update(pointer: PointerId, position: Point, pan: Vec2, pan_delta: Vec2) -> Self {
        let kind = PointerEventKind::PanZoomUpdate {
            pan,
            pan_delta,
            local_pan: pan,
            local_pan_delta: pan_delta,
            scale: 1.0,
            rotation: 0.0,
        };
        Self::new(kind, pointer, position).with_device_kind(PointerDeviceKind::Trackpad)
    }

    /// The end of a trackpad pan/zoom sequence.
    #[must_use]
    pub fn pan_zoom_end(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::PanZoomEnd, pointer, position)
            .with_device_kind(PointerDeviceKind::Trackpad)
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the global and local movement since the previous event.
    #[must_use]
    pub fn with_delta(mut self, delta: Vec2) -> Self {
        self.delta = delta;
        self.local_delta = delta;
        self
    }

    /// Sets the device kind.
    #[must_use]
    pub fn with_device_kind(mut self, device_kind: PointerDeviceKind) -> Self {
        self.device_kind = device_kind;
        self
    }

    /// Sets the device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = device;
        self
    }

    /// Sets the pressed buttons.
    #[must_use]
    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = buttons;
        self
    }

    /// Sets the view.
    #[must_use]
    pub fn with_view(mut self, view_id: ViewId) -> Self {
        self.view_id = view_id;
        self
    }

    /// Marks the event as synthesized.
    #[must_use]
    pub fn with_synthesized(mut self, synthesized: bool) -> Self {
        self.synthesized = synthesized;
        self
    }

    /// Returns a copy whose local fields are computed with `transform`.
    ///
    /// The local position is `transform * position`. Local deltas are derived
    /// from the transformed end and start positions, so they stay exact for
    /// any affine transform, including rotation and non-uniform scale.
    /// Passing `None`, or the transform the event already carries, returns an
    /// unchanged copy.
    #[must_use]
    pub fn transformed(&self, transform: Option<Affine>) -> Self {
        if transform.is_none() || transform == self.transform {
            return self.clone();
        }
        let mut event = self.clone();
        event.transform = transform;
        event.local_position = transform_position(transform, self.position);
        event.local_delta = transform_delta_via_positions(transform, self.delta, self.position);
        if let PointerEventKind::PanZoomUpdate {
            pan,
            pan_delta,
            local_pan,
            local_pan_delta,
            ..
        } = &mut event.kind
        {
            let end = self.position + *pan;
            *local_pan = transform_delta_via_positions(transform, *pan, end);
            *local_pan_delta = transform_delta_via_positions(transform, *pan_delta, end);
        }
        event
    }

    /// The position pair (global and local) of this event.
    #[must_use]
    pub fn position_pair(&self) -> PositionPair {
        PositionPair::new(self.local_position, self.position)
    }

    /// The delta pair (global and local) of this event.
    #[must_use]
    pub fn delta_pair(&self) -> DeltaPair {
        DeltaPair::new(self.local_delta, self.delta)
    }

    /// Pan delta for pan/zoom updates, movement delta otherwise.
    pub(crate) fn drag_delta_pair(&self) -> DeltaPair {
        match self.kind {
            PointerEventKind::PanZoomUpdate {
                pan_delta,
                local_pan_delta,
                ..
            } => DeltaPair::new(local_pan_delta, pan_delta),
            _ => self.delta_pair(),
        }
    }

    /// Position offset by the total pan for pan/zoom updates.
    pub(crate) fn drag_position_pair(&self) -> PositionPair {
        match self.kind {
            PointerEventKind::PanZoomUpdate { pan, local_pan, .. } => {
                PositionPair::new(self.local_position + local_pan, self.position + pan)
            }
            _ => self.position_pair(),
        }
    }
}

/// Applies `transform` to `position`, or returns it unchanged.
#[must_use]
pub fn transform_position(transform: Option<Affine>, position: Point) -> Point {
    transform.map_or(position, |transform| transform * position)
}

/// Transforms `delta`, which ended at `untransformed_end`, through positions.
///
/// The start of the movement is `untransformed_end - delta`; the result is
/// the difference of the transformed end and start positions.
#[must_use]
pub fn transform_delta_via_positions(
    transform: Option<Affine>,
    delta: Vec2,
    untransformed_end: Point,
) -> Vec2 {
    let Some(transform) = transform else {
        return delta;
    };
    let end = transform * untransformed_end;
    let start = transform * (untransformed_end - delta);
    end - start
}

/// A position in both local and global coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionPair {
    /// Position in the listener's coordinate space.
    pub local: Point,
    /// Position in global coordinates.
    pub global: Point,
}

impl PositionPair {
    /// Creates a pair from its parts.
    #[must_use]
    pub const fn new(local: Point, global: Point) -> Self {
        Self { local, global }
    }
}

/// A movement in both local and global coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeltaPair {
    /// Movement in the listener's coordinate space.
    pub local: Vec2,
    /// Movement in global coordinates.
    pub global: Vec2,
}

impl DeltaPair {
    /// No movement.
    pub const ZERO: Self = Self {
        local: Vec2::ZERO,
        global: Vec2::ZERO,
    };

    /// Creates a pair from its parts.
    #[must_use]
    pub const fn new(local: Vec2, global: Vec2) -> Self {
        Self { local, global }
    }
}

impl Add<DeltaPair> for PositionPair {
    type Output = Self;

    fn add(self, rhs: DeltaPair) -> Self {
        Self::new(self.local + rhs.local, self.global + rhs.global)
    }
}

impl AddAssign<DeltaPair> for PositionPair {
    fn add_assign(&mut self, rhs: DeltaPair) {
        *self = *self + rhs;
    }
}

impl Sub for PositionPair {
    type Output = DeltaPair;

    fn sub(self, rhs: Self) -> DeltaPair {
        DeltaPair::new(self.local - rhs.local, self.global - rhs.global)
    }
}

impl Add for DeltaPair {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.local + rhs.local, self.global + rhs.global)
    }
}

impl AddAssign for DeltaPair {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_contact_state() {
        let down = PointerEvent::down(PointerId(3), Point::new(1.0, 2.0));
        assert!(down.down);
        assert_eq!(down.buttons, PointerButtons::PRIMARY);
        assert_eq!(down.local_position, down.position);

        let up = PointerEvent::up(PointerId(3), Point::new(1.0, 2.0));
        assert!(!up.down);
        assert!(up.buttons.is_empty());
        assert!(up.kind.is_end());
        assert!(PointerEvent::scroll(PointerId(3), Point::ZERO, Vec2::new(0.0, 5.0))
            .kind
            .is_signal());
    }

    #[test]
    fn transformed_uses_positions_for_deltas() {
        let event = PointerEvent::moved(PointerId(1), Point::new(10.0, 0.0))
            .with_delta(Vec2::new(10.0, 0.0));
        let rotated = event.transformed(Some(Affine::rotate(core::f64::consts::FRAC_PI_2)));
        assert!((rotated.local_position - Point::new(0.0, 10.0)).hypot() < 1e-9);
        assert!((rotated.local_delta - Vec2::new(0.0, 10.0)).hypot() < 1e-9);
        // Global fields are untouched.
        assert_eq!(rotated.position, event.position);
        assert_eq!(rotated.delta, event.delta);
    }

    #[test]
    fn translation_does_not_change_deltas() {
        let event = PointerEvent::moved(PointerId(1), Point::new(10.0, 5.0))
            .with_delta(Vec2::new(2.0, 3.0));
        let local = event.transformed(Some(Affine::translate((100.0, 100.0))));
        assert_eq!(local.local_position, Point::new(110.0, 105.0));
        assert_eq!(local.local_delta, Vec2::new(2.0, 3.0));
    }

    #[test]
    fn transformed_without_transform_is_identity() {
        let event = PointerEvent::down(PointerId(1), Point::new(4.0, 4.0));
        assert_eq!(event.transformed(None), event);
    }

    #[test]
    fn pan_zoom_update_transforms_pan() {
        let event = PointerEvent::pan_zoom_update(
            PointerId(9),
            Point::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(2.0, 0.0),
        );
        let scaled = event.transformed(Some(Affine::scale(2.0)));
        let PointerEventKind::PanZoomUpdate {
            local_pan,
            local_pan_delta,
            pan,
            ..
        } = scaled.kind
        else {
            panic!("kind changed");
        };
        assert_eq!(pan, Vec2::new(4.0, 0.0));
        assert_eq!(local_pan, Vec2::new(8.0, 0.0));
        assert_eq!(local_pan_delta, Vec2::new(4.0, 0.0));
        assert_eq!(scaled.drag_delta_pair().global, Vec2::new(2.0, 0.0));
        assert_eq!(scaled.drag_position_pair().local, Point::new(8.0, 0.0));
    }

    #[test]
    fn pairs_add_and_subtract() {
        let start = PositionPair::new(Point::new(1.0, 1.0), Point::new(11.0, 11.0));
        let delta = DeltaPair::new(Vec2::new(2.0, 0.0), Vec2::new(2.0, 0.0));
        let end = start + delta;
        assert_eq!(end.global, Point::new(13.0, 11.0));
        assert_eq!(end - start, delta);
        assert_eq!(DeltaPair::ZERO + delta, delta);
    }

    #[test]
    fn device_kind_sets() {
        let set = PointerDeviceKinds::TOUCH | PointerDeviceKind::Stylus.into();
        assert!(set.contains_kind(PointerDeviceKind::Touch));
        assert!(set.contains_kind(PointerDeviceKind::Stylus));
        assert!(!set.contains_kind(PointerDeviceKind::Mouse));
    }
}
