// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_gesture --heading-base-level=0

//! Understory Gesture: gesture disambiguation for pointer input.
//!
//! When several gestures could start from the same touch (a tap, a long
//! press, a drag in a list that itself scrolls), something has to decide
//! which one the user meant. This crate does that the way mobile toolkits do:
//! every interested recognizer joins a per-pointer *arena*, watches the
//! pointer's events, and either claims victory or gives up; the arena makes
//! sure exactly one of them wins.
//!
//! The pieces are:
//! - [`GestureContext`]: per-surface state shared by everything below,
//!   including a host-driven clock, timers and a deferred task queue.
//! - [`GestureArenaManager`]: the arenas, with eager winners, holds, sweeps
//!   and default wins for a sole remaining member.
//! - [`PointerRouter`]: per-pointer and global event routes with snapshot
//!   semantics.
//! - [`HitTestResult`]: the target path under a pointer, each entry with its
//!   global-to-local transform.
//! - [`PointerSignalResolver`]: first-registrant-wins handling of scroll
//!   signals.
//! - Recognizers: [`TapGestureRecognizer`], [`LongPressGestureRecognizer`],
//!   [`DragGestureRecognizer`] and [`TapAndDragGestureRecognizer`].
//! - [`GestureBinding`]: the dispatcher that hit-tests, routes, and drives
//!   the arenas for each incoming event, including conversion of platform
//!   [`PointerData`] records.
//!
//! Fling velocities come from [`understory_velocity`].
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use kurbo::Point;
//! use understory_gesture::{
//!     DragGestureRecognizer, GestureBinding, GestureTarget, HitTestEntry, HitTestResult,
//!     PointerEvent, PointerId, TapGestureRecognizer, ViewId,
//! };
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let (taps, drags) = (log.clone(), log.clone());
//! let target = Rc::new(
//!     GestureTarget::new()
//!         .with_recognizer(TapGestureRecognizer::new().on_tap(move || taps.borrow_mut().push("tap")))
//!         .with_recognizer(
//!             DragGestureRecognizer::horizontal()
//!                 .on_drag_start(move |_| drags.borrow_mut().push("drag")),
//!         ),
//! );
//! let hit = target.clone();
//! let mut binding = GestureBinding::new(move |result: &mut HitTestResult, _: Point, _: ViewId| {
//!     result.add(HitTestEntry::new(hit.clone()));
//! });
//!
//! // A short touch is a tap.
//! binding.handle_event(PointerEvent::down(PointerId(1), Point::ZERO));
//! binding.handle_event(PointerEvent::up(PointerId(1), Point::ZERO));
//!
//! // Travelling past the touch slop makes it a drag instead.
//! binding.handle_event(PointerEvent::down(PointerId(2), Point::ZERO));
//! binding.handle_event(
//!     PointerEvent::moved(PointerId(2), Point::new(40.0, 0.0))
//!         .with_delta(kurbo::Vec2::new(40.0, 0.0)),
//! );
//! binding.handle_event(PointerEvent::up(PointerId(2), Point::new(40.0, 0.0)));
//!
//! assert_eq!(*log.borrow(), ["tap", "drag"]);
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded: recognizers share state through `Rc`
//! and `RefCell`, and the host drives time explicitly through
//! [`GestureContext::advance_to`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod arena;
mod binding;
mod context;
mod data;
mod event;
mod recognizer;
mod router;
mod settings;
mod signal;

pub use arena::{GestureArenaEntry, GestureArenaManager, GestureArenaMember, GestureDisposition};
pub use binding::{GestureBinding, GestureTarget, HitTester};
pub use context::{GestureContext, TaskHandle, TimerHandle};
pub use data::{PointerChange, PointerData, PointerSignalKind, convert_pointer_data};
pub use event::{
    DeltaPair, DeviceId, PointerButtons, PointerDeviceKind, PointerDeviceKinds, PointerEvent,
    PointerEventKind, PointerId, PositionPair, ViewId, transform_delta_via_positions,
    transform_position,
};
pub use hit_test::{BoxHitTestResult, HitTestEntry, HitTestResult, HitTestTarget};
pub use recognizer::{
    DragAxis, DragDownDetails, DragEndDetails, DragGestureRecognizer, DragStartBehavior,
    DragStartDetails, DragUpdateDetails, GestureRecognizer, GestureRecognizerState,
    LongPressDownDetails, LongPressEndDetails, LongPressGestureRecognizer,
    LongPressMoveUpdateDetails, LongPressStartDetails, MultitouchDragStrategy, PointerFilter,
    TapAndDragGestureRecognizer, TapDownDetails, TapDragDownDetails, TapDragEndDetails,
    TapDragStartDetails, TapDragUpDetails, TapDragUpdateDetails, TapGestureRecognizer,
    TapUpDetails, VelocityTrackerBuilder, default_velocity_tracker,
};
pub use router::{PointerRoute, PointerRouter};
pub use settings::{
    DOUBLE_TAP_SLOP, DOUBLE_TAP_TIMEOUT, DOUBLE_TAP_TOUCH_SLOP, GestureSettings,
    LONG_PRESS_TIMEOUT, MAX_FLING_VELOCITY, MIN_FLING_DISTANCE, MIN_FLING_VELOCITY, PAN_SLOP,
    PRECISE_POINTER_HIT_SLOP, PRECISE_POINTER_PAN_SLOP, PRESS_TIMEOUT, TOUCH_SLOP,
};
pub use signal::PointerSignalResolver;
