// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tap series that may turn into a drag.
//!
//! This is the gesture text fields use for selection: a tap places the
//! caret, a double tap selects a word, and dragging after any of those
//! extends the selection. The recognizer therefore counts consecutive taps
//! and reports the count with every callback.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;

use hashbrown::HashMap;
use kurbo::{Point, Vec2};
use log::debug;
use smallvec::SmallVec;
use understory_velocity::{Velocity, VelocityEstimator};

use super::drag::{DragPhase, invert, sign};
use super::{
    DragAxis, DragStartBehavior, GestureRecognizer, Handler, PointerFilter, PointerTracking,
    VelocityTrackerBuilder, default_velocity_tracker, handler, invoke, primary_button_only,
    void_handler,
};
use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::context::{GestureContext, TimerHandle};
use crate::event::{
    PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId, PositionPair,
    transform_delta_via_positions,
};
use crate::router::PointerRoute;
use crate::settings::{
    DOUBLE_TAP_SLOP, DOUBLE_TAP_TIMEOUT, DOUBLE_TAP_TOUCH_SLOP, GestureSettings,
    MAX_FLING_VELOCITY, MIN_FLING_VELOCITY, PRESS_TIMEOUT,
};

/// A tap of the series went down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDragDownDetails {
    /// Down position in global coordinates.
    pub global_position: Point,
    /// Down position in the target's coordinates.
    pub local_position: Point,
    /// Device that produced the tap.
    pub kind: PointerDeviceKind,
    /// Position of this tap in the series, starting at 1.
    pub consecutive_tap_count: u32,
}

/// A tap of the series went up without becoming a drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDragUpDetails {
    /// Up position in global coordinates.
    pub global_position: Point,
    /// Up position in the target's coordinates.
    pub local_position: Point,
    /// Device that produced the tap.
    pub kind: PointerDeviceKind,
    /// Position of this tap in the series, starting at 1.
    pub consecutive_tap_count: u32,
}

/// A drag started.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDragStartDetails {
    /// Timestamp of the event that started the drag.
    pub source_timestamp: Option<Duration>,
    /// Start position in global coordinates.
    pub global_position: Point,
    /// Start position in the target's coordinates.
    pub local_position: Point,
    /// Device driving the drag.
    pub kind: PointerDeviceKind,
    /// Taps in the series, including the one that became the drag.
    pub consecutive_tap_count: u32,
}

/// A drag moved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDragUpdateDetails {
    /// Timestamp of the move.
    pub source_timestamp: Option<Duration>,
    /// Movement in the target's coordinates.
    pub delta: Vec2,
    /// Pointer position in global coordinates.
    pub global_position: Point,
    /// Pointer position in the target's coordinates.
    pub local_position: Point,
    /// Device driving the drag.
    pub kind: PointerDeviceKind,
    /// Movement since the drag started, in global coordinates.
    pub offset_from_origin: Vec2,
    /// Movement since the drag started, in the target's coordinates.
    pub local_offset_from_origin: Vec2,
    /// Taps in the series, including the one that became the drag.
    pub consecutive_tap_count: u32,
}

/// A drag ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDragEndDetails {
    /// Last pointer position in global coordinates.
    pub global_position: Point,
    /// Last pointer position in the target's coordinates.
    pub local_position: Point,
    /// Fling velocity, or zero if the drag did not end in a fling.
    pub velocity: Velocity,
    /// Signed velocity along the axis; `None` for pans.
    pub primary_velocity: Option<f64>,
    /// Taps in the series, including the one that became the drag.
    pub consecutive_tap_count: u32,
}

#[derive(Default)]
struct TapDragCallbacks {
    on_tap_track_start: Handler<()>,
    on_tap_track_reset: Handler<()>,
    on_tap_down: Handler<TapDragDownDetails>,
    on_tap_up: Handler<TapDragUpDetails>,
    on_drag_start: Handler<TapDragStartDetails>,
    on_drag_update: Handler<TapDragUpdateDetails>,
    on_drag_end: Handler<TapDragEndDetails>,
    on_cancel: Handler<()>,
}

impl TapDragCallbacks {
    /// Whether any gesture callback is set; tracking callbacks do not count.
    fn has_gesture_callbacks(&self) -> bool {
        self.on_tap_down.is_some()
            || self.on_tap_up.is_some()
            || self.on_drag_start.is_some()
            || self.on_drag_update.is_some()
            || self.on_drag_end.is_some()
            || self.on_cancel.is_some()
    }
}

enum Emit {
    TrackStart,
    TrackReset,
    TapDown(TapDragDownDetails),
    TapUp(TapDragUpDetails),
    DragStart(TapDragStartDetails),
    DragUpdate(TapDragUpdateDetails),
    DragEnd(TapDragEndDetails),
    Cancel,
}

type Emits = Vec<Emit>;

/// Counts taps that follow each other closely in time and space.
#[derive(Debug, Default)]
struct TapTracker {
    down: Option<PointerEvent>,
    up: Option<PointerEvent>,
    consecutive_tap_count: u32,
    max_consecutive_tap: Option<u32>,
    origin: Option<PositionPair>,
    previous_buttons: Option<PointerButtons>,
    last_tap_position: Option<Point>,
    timer: Option<TimerHandle>,
}

impl TapTracker {
    fn represents_same_series(&self, event: &PointerEvent) -> bool {
        let within_slop = self
            .last_tap_position
            .is_some_and(|last| (event.position - last).hypot() <= DOUBLE_TAP_SLOP);
        self.timer.is_some() && within_slop && self.previous_buttons == Some(event.buttons)
    }

    fn stop_timer(&mut self, ctx: &GestureContext) {
        if let Some(timer) = self.timer.take() {
            ctx.cancel_timer(timer);
        }
    }

    fn start_timer(&mut self, ctx: &GestureContext, this: &Rc<TapDragInner>) {
        if self.timer.is_some() {
            return;
        }
        let weak: Weak<TapDragInner> = Rc::downgrade(this);
        self.timer = Some(ctx.start_timer(DOUBLE_TAP_TIMEOUT, move |ctx| {
            if let Some(this) = weak.upgrade() {
                this.consecutive_tap_timeout(ctx);
            }
        }));
    }

    /// Counts a new down, ending the previous series unless it continues it.
    fn add_down(&mut self, ctx: &GestureContext, event: &PointerEvent, emits: &mut Emits) {
        if self.max_consecutive_tap == Some(self.consecutive_tap_count) {
            self.reset(ctx, emits);
        }
        self.up = None;
        if self.down.is_some() && !self.represents_same_series(event) {
            self.consecutive_tap_count = 1;
        } else {
            self.consecutive_tap_count += 1;
        }
        self.stop_timer(ctx);
        self.down = Some(event.clone());
        self.previous_buttons = Some(event.buttons);
        self.last_tap_position = Some(event.position);
        self.origin = Some(event.position_pair());
        emits.push(Emit::TrackStart);
    }

    fn handle_event(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapDragInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        match event.kind {
            PointerEventKind::Move => {
                let moved = self.origin.is_some_and(|origin| {
                    (event.position - origin.global).hypot() > DOUBLE_TAP_TOUCH_SLOP
                });
                if moved {
                    // The pointer wandered off; the next down starts a new series.
                    self.stop_timer(ctx);
                    self.previous_buttons = None;
                    self.last_tap_position = None;
                }
            }
            PointerEventKind::Up => {
                self.up = Some(event.clone());
                if self.down.is_some() {
                    self.stop_timer(ctx);
                    self.start_timer(ctx, this);
                }
            }
            PointerEventKind::Cancel => self.reset(ctx, emits),
            _ => {}
        }
    }

    fn reset(&mut self, ctx: &GestureContext, emits: &mut Emits) {
        self.stop_timer(ctx);
        self.previous_buttons = None;
        self.origin = None;
        self.last_tap_position = None;
        self.consecutive_tap_count = 0;
        self.down = None;
        self.up = None;
        emits.push(Emit::TrackReset);
    }
}

struct TapDragState {
    axis: DragAxis,
    filter: PointerFilter,
    settings: Option<GestureSettings>,
    drag_start_behavior: DragStartBehavior,
    eager_victory_on_drag: bool,
    deadline: Duration,
    velocity_tracker_builder: VelocityTrackerBuilder,
    tracking: PointerTracking,
    tracker: TapTracker,
    deadline_timer: Option<TimerHandle>,
    phase: DragPhase,
    start: Option<PointerEvent>,
    initial_position: PositionPair,
    last_position: PositionPair,
    corrected_position: Option<PositionPair>,
    global_distance_moved: f64,
    past_slop_tolerance: bool,
    won_arena_for_primary_pointer: bool,
    sent_tap_down: bool,
    primary_pointer: Option<PointerId>,
    accepted_active_pointers: SmallVec<[PointerId; 1]>,
    velocity_trackers: HashMap<PointerId, Box<dyn VelocityEstimator>>,
}

impl fmt::Debug for TapDragState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapDragState")
            .field("axis", &self.axis)
            .field("phase", &self.phase)
            .field("tracker", &self.tracker)
            .field("primary_pointer", &self.primary_pointer)
            .field("past_slop_tolerance", &self.past_slop_tolerance)
            .field("won_arena", &self.won_arena_for_primary_pointer)
            .field("sent_tap_down", &self.sent_tap_down)
            .finish_non_exhaustive()
    }
}

impl TapDragState {
    fn settings(&self, ctx: &GestureContext) -> GestureSettings {
        self.settings.unwrap_or_else(|| ctx.settings())
    }

    fn count(&self) -> u32 {
        self.tracker.consecutive_tap_count
    }

    fn kind(&self) -> PointerDeviceKind {
        self.tracker
            .down
            .as_ref()
            .map_or(PointerDeviceKind::default(), |down| down.device_kind)
    }

    fn stop_deadline_timer(&mut self, ctx: &GestureContext) {
        if let Some(timer) = self.deadline_timer.take() {
            ctx.cancel_timer(timer);
        }
    }

    fn add_allowed_pointer(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapDragInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        if self.phase != DragPhase::Ready {
            return;
        }
        self.tracking
            .start(ctx, this, event.pointer, event.transform);
        self.tracker.add_down(ctx, event, emits);
        self.velocity_trackers
            .insert(event.pointer, (self.velocity_tracker_builder)(event));
        self.primary_pointer = Some(event.pointer);
        self.global_distance_moved = 0.0;
        self.phase = DragPhase::Possible;
        self.initial_position = event.position_pair();
        self.last_position = self.initial_position;
        let weak: Weak<TapDragInner> = Rc::downgrade(this);
        self.deadline_timer = Some(ctx.start_timer(self.deadline, move |ctx| {
            if let Some(this) = weak.upgrade() {
                this.did_exceed_deadline(ctx);
            }
        }));
    }

    fn handle_non_allowed_pointer(&mut self, ctx: &GestureContext, event: &PointerEvent) {
        // Other primary-button pointers are ignored rather than fought over.
        if event.buttons != PointerButtons::PRIMARY && !self.won_arena_for_primary_pointer {
            self.tracking.resolve(ctx, GestureDisposition::Rejected);
        }
    }

    fn handle_event(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapDragInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        if Some(event.pointer) != self.primary_pointer {
            return;
        }
        self.tracker.handle_event(ctx, this, event, emits);
        let now = ctx.now().max(event.timestamp);

        if !event.synthesized
            && matches!(event.kind, PointerEventKind::Down | PointerEventKind::Move)
        {
            if let Some(tracker) = self.velocity_trackers.get_mut(&event.pointer) {
                tracker.add_position(event.timestamp, event.local_position);
            }
        }

        match event.kind {
            PointerEventKind::Move => {
                self.last_position = event.position_pair();
                let slop = self.settings(ctx).hit_slop(event.device_kind);
                if (event.position - self.initial_position.global).hypot() > slop {
                    self.past_slop_tolerance = true;
                }
                match self.phase {
                    DragPhase::Accepted => self.check_drag_update(event, emits),
                    DragPhase::Possible => {
                        if self.start.is_none() {
                            self.check_drag(ctx, event);
                        }
                        if self.won_arena_for_primary_pointer {
                            if let Some(start) = self.start.take() {
                                // Won before the drag was detected.
                                self.phase = DragPhase::Accepted;
                                self.accept_drag(&start, emits);
                            }
                        }
                    }
                    DragPhase::Ready => {}
                }
            }
            PointerEventKind::Up => match self.phase {
                DragPhase::Possible => {
                    if self
                        .tracking
                        .stop_if_no_longer_down(ctx, this, event)
                    {
                        self.did_stop_tracking_last_pointer(ctx, event.pointer, now, emits);
                    }
                }
                DragPhase::Accepted => self.give_up_pointer(ctx, this, event.pointer, now, emits),
                DragPhase::Ready => {}
            },
            PointerEventKind::Cancel => {
                self.phase = DragPhase::Ready;
                self.give_up_pointer(ctx, this, event.pointer, now, emits);
            }
            _ => {}
        }
    }

    fn check_drag(&mut self, ctx: &GestureContext, event: &PointerEvent) {
        let moved_locally = self.axis.project(event.local_delta);
        let moved_globally = transform_delta_via_positions(
            invert(event.transform),
            moved_locally,
            event.local_position,
        );
        self.global_distance_moved +=
            moved_globally.hypot() * sign(self.axis.primary_value(moved_locally).unwrap_or(1.0));
        let threshold = self.axis.threshold(&self.settings(ctx), event.device_kind);
        if self.global_distance_moved.abs() > threshold {
            self.start = Some(event.clone());
            if self.eager_victory_on_drag {
                debug!("tap and drag claims the arena on drag");
                self.tracking.resolve(ctx, GestureDisposition::Accepted);
            }
        }
    }

    fn accept_drag(&mut self, event: &PointerEvent, emits: &mut Emits) {
        if !self.won_arena_for_primary_pointer {
            return;
        }
        if self.drag_start_behavior == DragStartBehavior::Start {
            self.initial_position += event.delta_pair();
        }
        self.check_drag_start(event, emits);
        if self.drag_start_behavior == DragStartBehavior::Down && event.local_delta != Vec2::ZERO {
            let corrected_local = self.initial_position.local + event.local_delta;
            let global_delta = transform_delta_via_positions(
                invert(event.transform),
                event.local_delta,
                corrected_local,
            );
            self.corrected_position = Some(PositionPair::new(
                corrected_local,
                self.initial_position.global + global_delta,
            ));
            self.check_drag_update(event, emits);
            self.corrected_position = None;
        }
    }

    fn check_tap_down(&mut self, emits: &mut Emits) {
        if self.sent_tap_down {
            return;
        }
        let Some(down) = &self.tracker.down else {
            return;
        };
        emits.push(Emit::TapDown(TapDragDownDetails {
            global_position: down.position,
            local_position: down.local_position,
            kind: down.device_kind,
            consecutive_tap_count: self.count(),
        }));
        self.sent_tap_down = true;
    }

    fn check_tap_up(&mut self, ctx: &GestureContext, up: &PointerEvent, emits: &mut Emits) {
        if !self.won_arena_for_primary_pointer {
            return;
        }
        debug!("tap {} of a series recognized", self.count());
        emits.push(Emit::TapUp(TapDragUpDetails {
            global_position: up.position,
            local_position: up.local_position,
            kind: up.device_kind,
            consecutive_tap_count: self.count(),
        }));
        self.reset_taps();
        self.release_pointer(ctx, up.pointer);
    }

    fn check_drag_start(&mut self, event: &PointerEvent, emits: &mut Emits) {
        debug!("tap and drag started a drag");
        emits.push(Emit::DragStart(TapDragStartDetails {
            source_timestamp: Some(event.timestamp),
            global_position: self.initial_position.global,
            local_position: self.initial_position.local,
            kind: self.kind(),
            consecutive_tap_count: self.count(),
        }));
        self.start = None;
    }

    fn check_drag_update(&mut self, event: &PointerEvent, emits: &mut Emits) {
        let position = self.corrected_position.unwrap_or_else(|| event.position_pair());
        emits.push(Emit::DragUpdate(TapDragUpdateDetails {
            source_timestamp: Some(event.timestamp),
            delta: event.local_delta,
            global_position: position.global,
            local_position: position.local,
            kind: self.kind(),
            offset_from_origin: position.global - self.initial_position.global,
            local_offset_from_origin: position.local - self.initial_position.local,
            consecutive_tap_count: self.count(),
        }));
    }

    fn check_drag_end(&mut self, ctx: &GestureContext, now: Duration, emits: &mut Emits) {
        let estimate = self
            .primary_pointer
            .and_then(|pointer| self.velocity_trackers.get(&pointer))
            .and_then(|tracker| tracker.velocity_estimate(now));
        let min_distance = self.settings(ctx).hit_slop(self.kind());
        let velocity = match estimate {
            Some(estimate) if self.axis.is_fling(&estimate, MIN_FLING_VELOCITY, min_distance) => {
                self.axis
                    .fling_velocity(&estimate, MIN_FLING_VELOCITY, MAX_FLING_VELOCITY)
            }
            _ => Velocity::ZERO,
        };
        emits.push(Emit::DragEnd(TapDragEndDetails {
            global_position: self.last_position.global,
            local_position: self.last_position.local,
            velocity,
            primary_velocity: self.axis.primary_value(velocity.pixels_per_second),
            consecutive_tap_count: self.count(),
        }));
        self.reset_taps();
    }

    fn check_cancel(&mut self, emits: &mut Emits) {
        if !self.sent_tap_down {
            return;
        }
        emits.push(Emit::Cancel);
        self.reset_taps();
    }

    fn reset_taps(&mut self) {
        self.sent_tap_down = false;
        self.won_arena_for_primary_pointer = false;
        self.primary_pointer = None;
    }

    /// Forgets an accepted pointer, or rejects it if it never was.
    fn release_pointer(&mut self, ctx: &GestureContext, pointer: PointerId) {
        if let Some(index) = self
            .accepted_active_pointers
            .iter()
            .position(|&accepted| accepted == pointer)
        {
            self.accepted_active_pointers.remove(index);
        } else {
            self.tracking
                .resolve_pointer(ctx, pointer, GestureDisposition::Rejected);
        }
    }

    fn give_up_pointer(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapDragInner>,
        pointer: PointerId,
        now: Duration,
        emits: &mut Emits,
    ) {
        if self.tracking.stop(ctx, this, pointer) {
            self.did_stop_tracking_last_pointer(ctx, pointer, now, emits);
        }
        self.release_pointer(ctx, pointer);
    }

    fn did_stop_tracking_last_pointer(
        &mut self,
        ctx: &GestureContext,
        pointer: PointerId,
        now: Duration,
        emits: &mut Emits,
    ) {
        match self.phase {
            DragPhase::Ready => {
                self.check_cancel(emits);
                self.tracking.resolve(ctx, GestureDisposition::Rejected);
            }
            DragPhase::Possible => {
                if !self.past_slop_tolerance {
                    // Still a tap.
                    if let Some(up) = self.tracker.up.clone() {
                        self.check_tap_up(ctx, &up, emits);
                    }
                } else if self.won_arena_for_primary_pointer {
                    // Too far for a tap but already won: a drag after all.
                    if let Some(down) = self.tracker.down.clone() {
                        self.release_pointer(ctx, pointer);
                        self.phase = DragPhase::Accepted;
                        self.accept_drag(&down, emits);
                        self.check_drag_end(ctx, now, emits);
                    }
                } else {
                    self.check_cancel(emits);
                    self.tracking.resolve(ctx, GestureDisposition::Rejected);
                }
            }
            DragPhase::Accepted => self.check_drag_end(ctx, now, emits),
        }
        self.stop_deadline_timer(ctx);
        self.velocity_trackers.clear();
        self.start = None;
        self.phase = DragPhase::Ready;
        self.past_slop_tolerance = false;
    }

    fn accept_gesture(&mut self, ctx: &GestureContext, pointer: PointerId, emits: &mut Emits) {
        if Some(pointer) != self.primary_pointer {
            return;
        }
        self.stop_deadline_timer(ctx);
        if !self.accepted_active_pointers.contains(&pointer) {
            self.accepted_active_pointers.push(pointer);
        }
        self.check_tap_down(emits);
        self.won_arena_for_primary_pointer = true;
        if let Some(start) = self.start.take() {
            self.phase = DragPhase::Accepted;
            self.accept_drag(&start, emits);
        }
        // Lifted before the arena was decided.
        if let Some(up) = self.tracker.up.clone() {
            if self.phase != DragPhase::Accepted {
                self.check_tap_up(ctx, &up, emits);
            }
        }
    }

    fn reject_gesture(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapDragInner>,
        pointer: PointerId,
        emits: &mut Emits,
    ) {
        if Some(pointer) != self.primary_pointer {
            return;
        }
        self.tracker.reset(ctx, emits);
        self.stop_deadline_timer(ctx);
        self.give_up_pointer(ctx, this, pointer, ctx.now(), emits);
        self.check_cancel(emits);
        self.reset_taps();
    }

    fn did_exceed_deadline(&mut self, ctx: &GestureContext, emits: &mut Emits) {
        self.deadline_timer = None;
        if self.phase == DragPhase::Ready {
            return;
        }
        self.check_tap_down(emits);
        if self.count() > 1 {
            // A held double tap must not lose to a long press.
            debug!("tap and drag claims the arena for tap {}", self.count());
            self.tracking.resolve(ctx, GestureDisposition::Accepted);
        }
    }

    fn dispose(&mut self, ctx: &GestureContext, this: &Rc<TapDragInner>, emits: &mut Emits) {
        self.stop_deadline_timer(ctx);
        self.tracker.reset(ctx, emits);
        self.tracking.dispose(ctx, this);
        self.velocity_trackers.clear();
        self.accepted_active_pointers.clear();
        self.start = None;
        self.phase = DragPhase::Ready;
        self.past_slop_tolerance = false;
        self.reset_taps();
    }
}

struct TapDragInner {
    state: RefCell<TapDragState>,
    callbacks: RefCell<TapDragCallbacks>,
}

impl TapDragInner {
    fn emit(&self, emits: Emits) {
        for emit in emits {
            match emit {
                Emit::TrackStart => invoke(&self.callbacks, |c| &mut c.on_tap_track_start, &()),
                Emit::TrackReset => invoke(&self.callbacks, |c| &mut c.on_tap_track_reset, &()),
                Emit::TapDown(details) => invoke(&self.callbacks, |c| &mut c.on_tap_down, &details),
                Emit::TapUp(details) => invoke(&self.callbacks, |c| &mut c.on_tap_up, &details),
                Emit::DragStart(details) => {
                    invoke(&self.callbacks, |c| &mut c.on_drag_start, &details);
                }
                Emit::DragUpdate(details) => {
                    invoke(&self.callbacks, |c| &mut c.on_drag_update, &details);
                }
                Emit::DragEnd(details) => invoke(&self.callbacks, |c| &mut c.on_drag_end, &details),
                Emit::Cancel => invoke(&self.callbacks, |c| &mut c.on_cancel, &()),
            }
        }
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        let state = self.state.borrow();
        match state.primary_pointer {
            None => {
                if event.buttons != PointerButtons::PRIMARY
                    || !self.callbacks.borrow().has_gesture_callbacks()
                {
                    return false;
                }
            }
            Some(primary) => {
                if event.pointer != primary {
                    return false;
                }
            }
        }
        state.filter.allows(event, primary_button_only)
    }

    fn consecutive_tap_timeout(self: Rc<Self>, ctx: &GestureContext) {
        let mut emits = Emits::new();
        {
            let mut state = self.state.borrow_mut();
            state.tracker.timer = None;
            state.tracker.reset(ctx, &mut emits);
        }
        self.emit(emits);
    }

    fn did_exceed_deadline(self: Rc<Self>, ctx: &GestureContext) {
        let mut emits = Emits::new();
        self.state
            .borrow_mut()
            .did_exceed_deadline(ctx, &mut emits);
        self.emit(emits);
    }
}

impl PointerRoute for TapDragInner {
    fn handle_event(self: Rc<Self>, ctx: &GestureContext, event: &PointerEvent) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            self.state
                .borrow_mut()
                .handle_event(ctx, &self, event, &mut emits);
            self.emit(emits);
        });
    }
}

impl GestureArenaMember for TapDragInner {
    fn accept_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            self.state
                .borrow_mut()
                .accept_gesture(ctx, pointer, &mut emits);
            self.emit(emits);
        });
    }

    fn reject_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            self.state
                .borrow_mut()
                .reject_gesture(ctx, &self, pointer, &mut emits);
            self.emit(emits);
        });
    }
}

/// Recognizes tap series and drags that follow them.
///
/// Each down that arrives within [`DOUBLE_TAP_TIMEOUT`] of the previous
/// up, within [`DOUBLE_TAP_SLOP`] of the previous tap and with the same
/// buttons continues the series; every callback carries the tap's position in
/// the series. Otherwise the count starts again at 1.
///
/// A down fires `on_tap_down` when the arena is won or after
/// [`PRESS_TIMEOUT`]. From the second tap of a series on, that deadline also
/// claims the arena so that holding a double tap is not taken for a long
/// press. A pointer that stays within the touch slop fires `on_tap_up` when
/// it lifts; one that travels past the drag threshold becomes a drag and
/// fires `on_drag_start`, `on_drag_update` and `on_drag_end`. By default the
/// recognizer claims the arena as soon as a drag is detected; with
/// [`with_eager_victory_on_drag(false)`](Self::with_eager_victory_on_drag) it
/// waits until the competitors give up.
///
/// ```
/// use core::time::Duration;
/// use kurbo::Point;
/// use understory_gesture::{
///     GestureContext, GestureRecognizer, PointerEvent, PointerId, TapAndDragGestureRecognizer,
/// };
///
/// let ctx = GestureContext::new();
/// let taps = TapAndDragGestureRecognizer::pan().on_tap_up(|_| {});
/// for (i, start) in [0_u64, 200].into_iter().enumerate() {
///     let pointer = PointerId(i as u64 + 1);
///     let down = PointerEvent::down(pointer, Point::ZERO)
///         .with_timestamp(Duration::from_millis(start));
///     ctx.advance_to(down.timestamp);
///     taps.add_pointer(&ctx, &down);
///     ctx.router().route(&down);
///     ctx.arena().close(pointer);
///     ctx.drain_tasks();
///     let up = PointerEvent::up(pointer, Point::ZERO)
///         .with_timestamp(Duration::from_millis(start + 50));
///     ctx.advance_to(up.timestamp);
///     ctx.router().route(&up);
///     ctx.arena().sweep(pointer);
/// }
/// assert_eq!(taps.consecutive_tap_count(), 2);
/// ```
#[derive(Clone)]
pub struct TapAndDragGestureRecognizer {
    inner: Rc<TapDragInner>,
}

impl fmt::Debug for TapAndDragGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapAndDragGestureRecognizer")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl TapAndDragGestureRecognizer {
    /// Creates a recognizer whose drags follow `axis`.
    #[must_use]
    pub fn new(axis: DragAxis) -> Self {
        Self {
            inner: Rc::new(TapDragInner {
                state: RefCell::new(TapDragState {
                    axis,
                    filter: PointerFilter::default(),
                    settings: None,
                    drag_start_behavior: DragStartBehavior::default(),
                    eager_victory_on_drag: true,
                    deadline: PRESS_TIMEOUT,
                    velocity_tracker_builder: default_velocity_tracker,
                    tracking: PointerTracking::default(),
                    tracker: TapTracker::default(),
                    deadline_timer: None,
                    phase: DragPhase::Ready,
                    start: None,
                    initial_position: PositionPair::default(),
                    last_position: PositionPair::default(),
                    corrected_position: None,
                    global_distance_moved: 0.0,
                    past_slop_tolerance: false,
                    won_arena_for_primary_pointer: false,
                    sent_tap_down: false,
                    primary_pointer: None,
                    accepted_active_pointers: SmallVec::new(),
                    velocity_trackers: HashMap::new(),
                }),
                callbacks: RefCell::new(TapDragCallbacks::default()),
            }),
        }
    }

    /// Creates a recognizer whose drags are horizontal.
    #[must_use]
    pub fn horizontal() -> Self {
        Self::new(DragAxis::Horizontal)
    }

    /// Creates a recognizer whose drags go in any direction.
    #[must_use]
    pub fn pan() -> Self {
        Self::new(DragAxis::Free)
    }

    /// Taps in the current series; zero when no series is in progress.
    #[must_use]
    pub fn consecutive_tap_count(&self) -> u32 {
        self.inner.state.borrow().count()
    }

    /// Sets the callback run when a down starts or continues a series.
    #[must_use]
    pub fn on_tap_track_start(self, f: impl FnMut() + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_tap_track_start = void_handler(f);
        self
    }

    /// Sets the callback run when a series ends.
    #[must_use]
    pub fn on_tap_track_reset(self, f: impl FnMut() + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_tap_track_reset = void_handler(f);
        self
    }

    /// Sets the callback run when a tap goes down.
    #[must_use]
    pub fn on_tap_down(self, f: impl FnMut(&TapDragDownDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_tap_down = handler(f);
        self
    }

    /// Sets the callback run when a tap goes up.
    #[must_use]
    pub fn on_tap_up(self, f: impl FnMut(&TapDragUpDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_tap_up = handler(f);
        self
    }

    /// Sets the callback run when a drag starts.
    #[must_use]
    pub fn on_drag_start(self, f: impl FnMut(&TapDragStartDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_drag_start = handler(f);
        self
    }

    /// Sets the callback run when a drag moves.
    #[must_use]
    pub fn on_drag_update(self, f: impl FnMut(&TapDragUpdateDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_drag_update = handler(f);
        self
    }

    /// Sets the callback run when a drag ends.
    #[must_use]
    pub fn on_drag_end(self, f: impl FnMut(&TapDragEndDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_drag_end = handler(f);
        self
    }

    /// Sets the callback run when a tap that sent tap-down fails.
    #[must_use]
    pub fn on_cancel(self, f: impl FnMut() + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_cancel = void_handler(f);
        self
    }

    /// Restricts the devices and buttons the recognizer responds to.
    #[must_use]
    pub fn with_filter(self, filter: PointerFilter) -> Self {
        self.inner.state.borrow_mut().filter = filter;
        self
    }

    /// Uses `settings` instead of the context's settings.
    #[must_use]
    pub fn with_settings(self, settings: GestureSettings) -> Self {
        self.inner.state.borrow_mut().settings = Some(settings);
        self
    }

    /// Sets where drags report their start.
    #[must_use]
    pub fn with_drag_start_behavior(self, behavior: DragStartBehavior) -> Self {
        self.inner.state.borrow_mut().drag_start_behavior = behavior;
        self
    }

    /// Whether detecting a drag claims the arena immediately.
    #[must_use]
    pub fn with_eager_victory_on_drag(self, eager: bool) -> Self {
        self.inner.state.borrow_mut().eager_victory_on_drag = eager;
        self
    }

    /// Caps the length of a series; the tap after the cap starts a new one.
    #[must_use]
    pub fn with_max_consecutive_tap(self, max: Option<u32>) -> Self {
        self.inner.state.borrow_mut().tracker.max_consecutive_tap = max;
        self
    }

    /// Sets the time after which tap-down fires without an arena decision.
    #[must_use]
    pub fn with_deadline(self, deadline: Duration) -> Self {
        self.inner.state.borrow_mut().deadline = deadline;
        self
    }

    /// Chooses the velocity estimator for each tracked pointer.
    #[must_use]
    pub fn with_velocity_tracker_builder(self, builder: VelocityTrackerBuilder) -> Self {
        self.inner.state.borrow_mut().velocity_tracker_builder = builder;
        self
    }
}

impl GestureRecognizer for TapAndDragGestureRecognizer {
    fn add_pointer(&self, ctx: &GestureContext, event: &PointerEvent) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            if inner.is_pointer_allowed(event) {
                inner
                    .state
                    .borrow_mut()
                    .add_allowed_pointer(ctx, inner, event, &mut emits);
            } else {
                inner
                    .state
                    .borrow_mut()
                    .handle_non_allowed_pointer(ctx, event);
            }
            inner.emit(emits);
        });
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        self.inner.is_pointer_allowed(event)
    }

    fn dispose(&self, ctx: &GestureContext) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            inner.state.borrow_mut().dispose(ctx, inner, &mut emits);
            inner.emit(emits);
        });
    }

    fn debug_description(&self) -> &'static str {
        match self.inner.state.borrow().axis {
            DragAxis::Horizontal => "tap and horizontal drag",
            DragAxis::Vertical => "tap and vertical drag",
            DragAxis::Free => "tap and pan",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::LongPressGestureRecognizer;
    use alloc::format;
    use alloc::string::String;

    type Log = Rc<RefCell<Vec<String>>>;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn logged(recognizer: TapAndDragGestureRecognizer, log: &Log) -> TapAndDragGestureRecognizer {
        let (down, up, start, update, end, cancel) = (
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
        );
        recognizer
            .on_tap_down(move |d| down.borrow_mut().push(format!("down {}", d.consecutive_tap_count)))
            .on_tap_up(move |d| up.borrow_mut().push(format!("up {}", d.consecutive_tap_count)))
            .on_drag_start(move |d| {
                start
                    .borrow_mut()
                    .push(format!("start {} {}", d.global_position.x, d.consecutive_tap_count));
            })
            .on_drag_update(move |d| {
                update
                    .borrow_mut()
                    .push(format!("update {}", d.offset_from_origin.x));
            })
            .on_drag_end(move |_| end.borrow_mut().push("end".into()))
            .on_cancel(move || cancel.borrow_mut().push("cancel".into()))
    }

    fn feed(ctx: &GestureContext, recognizers: &[&dyn GestureRecognizer], event: PointerEvent) {
        ctx.advance_to(event.timestamp);
        if event.kind == PointerEventKind::Down {
            for recognizer in recognizers {
                recognizer.add_pointer(ctx, &event);
            }
        }
        ctx.router().route(&event);
        match event.kind {
            PointerEventKind::Down => ctx.arena().close(event.pointer),
            PointerEventKind::Up => ctx.arena().sweep(event.pointer),
            _ => {}
        }
        ctx.drain_tasks();
    }

    fn tap(ctx: &GestureContext, path: &[&dyn GestureRecognizer], pointer: u64, at: Point, t: u64) {
        let pointer = PointerId(pointer);
        feed(ctx, path, PointerEvent::down(pointer, at).with_timestamp(ms(t)));
        feed(ctx, path, PointerEvent::up(pointer, at).with_timestamp(ms(t + 40)));
    }

    #[test]
    fn close_taps_count_up() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(TapAndDragGestureRecognizer::pan(), &log);
        let path: [&dyn GestureRecognizer; 1] = [&taps];

        tap(&ctx, &path, 1, Point::ZERO, 0);
        tap(&ctx, &path, 2, Point::new(10.0, 0.0), 200);
        tap(&ctx, &path, 3, Point::new(5.0, 5.0), 400);
        assert_eq!(
            *log.borrow(),
            ["down 1", "up 1", "down 2", "up 2", "down 3", "up 3"]
        );
        assert_eq!(taps.consecutive_tap_count(), 3);
    }

    #[test]
    fn late_or_distant_taps_start_over() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(TapAndDragGestureRecognizer::pan(), &log);
        let path: [&dyn GestureRecognizer; 1] = [&taps];

        tap(&ctx, &path, 1, Point::ZERO, 0);
        // Past the double-tap timeout.
        tap(&ctx, &path, 2, Point::ZERO, 500);
        assert_eq!(taps.consecutive_tap_count(), 1);
        // Within time, too far away.
        tap(&ctx, &path, 3, Point::new(150.0, 0.0), 650);
        assert_eq!(taps.consecutive_tap_count(), 1);
        assert_eq!(
            *log.borrow(),
            ["down 1", "up 1", "down 1", "up 1", "down 1", "up 1"]
        );
    }

    #[test]
    fn timeout_resets_the_series() {
        let ctx = GestureContext::new();
        let resets = Rc::new(RefCell::new(0));
        let sink = resets.clone();
        let taps = TapAndDragGestureRecognizer::pan()
            .on_tap_up(|_| {})
            .on_tap_track_reset(move || *sink.borrow_mut() += 1);
        let path: [&dyn GestureRecognizer; 1] = [&taps];
        tap(&ctx, &path, 1, Point::ZERO, 0);
        assert_eq!(taps.consecutive_tap_count(), 1);
        ctx.advance_to(ms(339));
        assert_eq!(*resets.borrow(), 0);
        ctx.advance_to(ms(340));
        assert_eq!(*resets.borrow(), 1);
        assert_eq!(taps.consecutive_tap_count(), 0);
    }

    #[test]
    fn max_consecutive_tap_wraps() {
        let ctx = GestureContext::new();
        let taps = TapAndDragGestureRecognizer::pan()
            .on_tap_up(|_| {})
            .with_max_consecutive_tap(Some(2));
        let path: [&dyn GestureRecognizer; 1] = [&taps];
        tap(&ctx, &path, 1, Point::ZERO, 0);
        tap(&ctx, &path, 2, Point::ZERO, 100);
        assert_eq!(taps.consecutive_tap_count(), 2);
        tap(&ctx, &path, 3, Point::ZERO, 200);
        assert_eq!(taps.consecutive_tap_count(), 1);
    }

    #[test]
    fn drag_after_tap_carries_the_count() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(TapAndDragGestureRecognizer::horizontal(), &log);
        let path: [&dyn GestureRecognizer; 1] = [&taps];

        tap(&ctx, &path, 1, Point::ZERO, 0);
        let p = PointerId(2);
        feed(&ctx, &path, PointerEvent::down(p, Point::ZERO).with_timestamp(ms(150)));
        feed(
            &ctx,
            &path,
            PointerEvent::moved(p, Point::new(30.0, 0.0))
                .with_delta(Vec2::new(30.0, 0.0))
                .with_timestamp(ms(160)),
        );
        feed(
            &ctx,
            &path,
            PointerEvent::moved(p, Point::new(40.0, 0.0))
                .with_delta(Vec2::new(10.0, 0.0))
                .with_timestamp(ms(170)),
        );
        feed(&ctx, &path, PointerEvent::up(p, Point::new(40.0, 0.0)).with_timestamp(ms(400)));
        assert_eq!(
            *log.borrow(),
            ["down 1", "up 1", "down 2", "start 30 2", "update 10", "end"]
        );
    }

    #[test]
    fn held_double_tap_beats_long_press() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(TapAndDragGestureRecognizer::pan(), &log);
        let long_presses = Rc::new(RefCell::new(0));
        let sink = long_presses.clone();
        let long_press =
            LongPressGestureRecognizer::new().on_long_press(move || *sink.borrow_mut() += 1);
        let path: [&dyn GestureRecognizer; 2] = [&taps, &long_press];

        tap(&ctx, &path, 1, Point::ZERO, 0);
        assert_eq!(*log.borrow(), ["down 1", "up 1"]);

        feed(&ctx, &path, PointerEvent::down(PointerId(2), Point::ZERO).with_timestamp(ms(100)));
        ctx.advance_to(ms(200));
        assert_eq!(*log.borrow(), ["down 1", "up 1", "down 2"]);
        ctx.advance_to(ms(1000));
        assert_eq!(*long_presses.borrow(), 0);
        feed(&ctx, &path, PointerEvent::up(PointerId(2), Point::ZERO).with_timestamp(ms(1100)));
        assert_eq!(*log.borrow(), ["down 1", "up 1", "down 2", "up 2"]);
    }

    #[test]
    fn drag_waits_for_competitors_without_eager_victory() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(
            TapAndDragGestureRecognizer::pan().with_eager_victory_on_drag(false),
            &log,
        );
        let long_press = LongPressGestureRecognizer::new().on_long_press(|| {});
        let path: [&dyn GestureRecognizer; 2] = [&taps, &long_press];
        let p = PointerId(1);

        feed(&ctx, &path, PointerEvent::down(p, Point::ZERO));
        ctx.advance_to(ms(100));
        assert_eq!(*log.borrow(), ["down 1"]);
        // The long press gives up on the same move, leaving the drag alone.
        feed(
            &ctx,
            &path,
            PointerEvent::moved(p, Point::new(50.0, 0.0))
                .with_delta(Vec2::new(50.0, 0.0))
                .with_timestamp(ms(120)),
        );
        assert_eq!(*log.borrow(), ["down 1", "start 50 1"]);
        feed(&ctx, &path, PointerEvent::up(p, Point::new(50.0, 0.0)).with_timestamp(ms(150)));
        assert_eq!(*log.borrow(), ["down 1", "start 50 1", "end"]);
    }

    #[test]
    fn unresolved_drag_cancels_on_release() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let taps = logged(
            TapAndDragGestureRecognizer::pan().with_eager_victory_on_drag(false),
            &log,
        );
        let rival = TapAndDragGestureRecognizer::pan()
            .with_eager_victory_on_drag(false)
            .on_tap_down(|_| {});
        let path: [&dyn GestureRecognizer; 2] = [&taps, &rival];
        let p = PointerId(1);

        feed(&ctx, &path, PointerEvent::down(p, Point::ZERO));
        ctx.advance_to(ms(100));
        feed(
            &ctx,
            &path,
            PointerEvent::moved(p, Point::new(50.0, 0.0))
                .with_delta(Vec2::new(50.0, 0.0))
                .with_timestamp(ms(120)),
        );
        assert_eq!(*log.borrow(), ["down 1"]);
        feed(&ctx, &path, PointerEvent::up(p, Point::new(50.0, 0.0)).with_timestamp(ms(150)));
        assert_eq!(*log.borrow(), ["down 1", "cancel"]);
        assert!(!ctx.arena().has_arena(p));
    }
}
