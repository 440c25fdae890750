// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion of platform pointer records into [`PointerEvent`]s.
//!
//! Platforms report pointers in physical pixels, one [`PointerData`] record per
//! change. [`convert_pointer_data`] turns a batch of records into logical
//! events, dividing positions and deltas by the device pixel ratio of the
//! view each record was delivered to. Records whose view is no longer known
//! (the ratio lookup returns `None`) are dropped.
//!
//! ```
//! use kurbo::Point;
//! use understory_gesture::{
//!     PointerChange, PointerData, PointerEventKind, PointerId, ViewId, convert_pointer_data,
//! };
//!
//! let records = [
//!     PointerData::new(PointerChange::Down, PointerId(1), Point::new(20.0, 40.0)),
//!     PointerData::new(PointerChange::Down, PointerId(2), Point::new(20.0, 40.0))
//!         .with_view(ViewId(9)),
//! ];
//! let events: Vec<_> = convert_pointer_data(records, |view| (view == ViewId(0)).then_some(2.0))
//!     .collect();
//!
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].kind, PointerEventKind::Down);
//! assert_eq!(events[0].position, Point::new(10.0, 20.0));
//! ```

use core::time::Duration;

use kurbo::{Point, Vec2};
use log::trace;

use crate::event::{
    DeviceId, PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId,
    ViewId,
};

/// The change a [`PointerData`] record reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerChange {
    /// The pointer's input was cancelled.
    #[default]
    Cancel,
    /// The device became known.
    Add,
    /// The device is no longer known.
    Remove,
    /// The pointer moved without contact.
    Hover,
    /// The pointer made contact.
    Down,
    /// The pointer moved while in contact.
    Move,
    /// The pointer stopped making contact.
    Up,
    /// A trackpad pan/zoom sequence began.
    PanZoomStart,
    /// A trackpad pan/zoom sequence progressed.
    PanZoomUpdate,
    /// A trackpad pan/zoom sequence ended.
    PanZoomEnd,
}

/// The kind of signal a [`PointerData`] record carries, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerSignalKind {
    /// Not a signal; the record describes a [`PointerChange`].
    #[default]
    None,
    /// A discrete scroll.
    Scroll,
    /// A request to stop scroll inertia.
    ScrollInertiaCancel,
    /// A signal this crate does not understand; it is dropped.
    Unknown,
}

/// One platform pointer record, in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerData {
    /// View the record was delivered to.
    pub view_id: ViewId,
    /// Time of the change on the host's monotonic clock.
    pub timestamp: Duration,
    /// What changed.
    pub change: PointerChange,
    /// Kind of device.
    pub kind: PointerDeviceKind,
    /// Signal carried by the record, if any.
    pub signal_kind: PointerSignalKind,
    /// Physical device.
    pub device: DeviceId,
    /// Contact sequence.
    pub pointer: PointerId,
    /// Position in physical pixels.
    pub physical_position: Point,
    /// Movement since the previous record, in physical pixels.
    pub physical_delta: Vec2,
    /// Pressed buttons.
    pub buttons: PointerButtons,
    /// Whether the platform synthesized the record.
    pub synthesized: bool,
    /// Scroll amount of a scroll signal, in physical pixels.
    pub scroll_delta: Vec2,
    /// Total pan of a pan/zoom update, in physical pixels.
    pub pan: Vec2,
    /// Pan since the previous pan/zoom update, in physical pixels.
    pub pan_delta: Vec2,
    /// Scale of a pan/zoom update.
    pub scale: f64,
    /// Rotation of a pan/zoom update, in radians.
    pub rotation: f64,
}

impl Default for PointerData {
    fn default() -> Self {
        Self {
            view_id: ViewId::default(),
            timestamp: Duration::ZERO,
            change: PointerChange::default(),
            kind: PointerDeviceKind::default(),
            signal_kind: PointerSignalKind::default(),
            device: DeviceId::default(),
            pointer: PointerId(0),
            physical_position: Point::ZERO,
            physical_delta: Vec2::ZERO,
            buttons: PointerButtons::empty(),
            synthesized: false,
            scroll_delta: Vec2::ZERO,
            pan: Vec2::ZERO,
            pan_delta: Vec2::ZERO,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

impl PointerData {
    /// A record of `change` at `physical_position`.
    ///
    /// Down and move records report the primary button.
    #[must_use]
    pub fn new(change: PointerChange, pointer: PointerId, physical_position: Point) -> Self {
        let buttons = match change {
            PointerChange::Down | PointerChange::Move => PointerButtons::PRIMARY,
            _ => PointerButtons::empty(),
        };
        Self {
            change,
            pointer,
            physical_position,
            buttons,
            ..Self::default()
        }
    }

    /// A scroll signal record.
    #[must_use]
    pub fn scroll(pointer: PointerId, physical_position: Point, scroll_delta: Vec2) -> Self {
        Self {
            change: PointerChange::Hover,
            signal_kind: PointerSignalKind::Scroll,
            kind: PointerDeviceKind::Mouse,
            pointer,
            physical_position,
            scroll_delta,
            ..Self::default()
        }
    }

    /// Sets the view.
    #[must_use]
    pub fn with_view(mut self, view_id: ViewId) -> Self {
        self.view_id = view_id;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the physical delta.
    #[must_use]
    pub fn with_delta(mut self, physical_delta: Vec2) -> Self {
        self.physical_delta = physical_delta;
        self
    }

    /// Sets the device kind.
    #[must_use]
    pub fn with_kind(mut self, kind: PointerDeviceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Converts this record with the given device pixel ratio.
    ///
    /// Returns `None` for unknown signals and scroll signals with a
    /// non-finite delta.
    #[must_use]
    pub fn to_event(&self, device_pixel_ratio: f64) -> Option<PointerEvent> {
        debug_assert!(
            device_pixel_ratio > 0.0,
            "device pixel ratio must be positive"
        );
        let position = (self.physical_position.to_vec2() / device_pixel_ratio).to_point();
        let delta = self.physical_delta / device_pixel_ratio;
        let kind = match self.signal_kind {
            PointerSignalKind::None => match self.change {
                PointerChange::Cancel => PointerEventKind::Cancel,
                PointerChange::Add => PointerEventKind::Added,
                PointerChange::Remove => PointerEventKind::Removed,
                PointerChange::Hover => PointerEventKind::Hover,
                PointerChange::Down => PointerEventKind::Down,
                PointerChange::Move => PointerEventKind::Move,
                PointerChange::Up => PointerEventKind::Up,
                PointerChange::PanZoomStart => PointerEventKind::PanZoomStart,
                PointerChange::PanZoomUpdate => {
                    let pan = self.pan / device_pixel_ratio;
                    let pan_delta = self.pan_delta / device_pixel_ratio;
                    PointerEventKind::PanZoomUpdate {
                        pan,
                        pan_delta,
                        local_pan: pan,
                        local_pan_delta: pan_delta,
                        scale: self.scale,
                        rotation: self.rotation,
                    }
                }
                PointerChange::PanZoomEnd => PointerEventKind::PanZoomEnd,
            },
            PointerSignalKind::Scroll => {
                if !self.scroll_delta.is_finite() {
                    return None;
                }
                PointerEventKind::Scroll {
                    scroll_delta: self.scroll_delta / device_pixel_ratio,
                }
            }
            PointerSignalKind::ScrollInertiaCancel => PointerEventKind::ScrollInertiaCancel,
            PointerSignalKind::Unknown => return None,
        };
        let down = matches!(kind, PointerEventKind::Down | PointerEventKind::Move);
        let mut event = PointerEvent::new(kind, self.pointer, position)
            .with_timestamp(self.timestamp)
            .with_delta(delta)
            .with_device(self.device)
            .with_device_kind(self.kind)
            .with_buttons(self.buttons)
            .with_view(self.view_id)
            .with_synthesized(self.synthesized);
        event.down = down;
        Some(event)
    }
}

/// Converts platform records into logical pointer events.
///
/// `device_pixel_ratio` is consulted once per record; records for which it
/// returns `None` are skipped.
pub fn convert_pointer_data<I, F>(
    data: I,
    device_pixel_ratio: F,
) -> impl Iterator<Item = PointerEvent>
where
    I: IntoIterator<Item = PointerData>,
    F: Fn(ViewId) -> Option<f64>,
{
    data.into_iter().filter_map(move |record| {
        let Some(ratio) = device_pixel_ratio(record.view_id) else {
            trace!(
                "dropping pointer record for unknown view {:?}",
                record.view_id
            );
            return None;
        };
        record.to_event(ratio)
    })
}
