// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drag recognition along one axis or freely.
//!
//! The three variants share one state machine and differ only in how a
//! movement is projected ([`DragAxis`]), which slop must be exceeded before
//! the drag claims the arena, and how the final velocity is classified as a
//! fling.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;

use hashbrown::HashMap;
use kurbo::{Affine, Point, Vec2};
use log::debug;
use smallvec::SmallVec;
use understory_velocity::{Velocity, VelocityEstimate, VelocityEstimator, VelocityTracker};

use super::{
    GestureRecognizer, Handler, PointerFilter, PointerTracking, handler, invoke,
    primary_button_only, void_handler,
};
use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::context::GestureContext;
use crate::event::{
    DeltaPair, PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId,
    PositionPair, transform_delta_via_positions,
};
use crate::router::PointerRoute;
use crate::settings::{GestureSettings, MAX_FLING_VELOCITY, MIN_FLING_VELOCITY};

/// Creates the velocity estimator for a newly tracked pointer.
pub type VelocityTrackerBuilder = fn(&PointerEvent) -> Box<dyn VelocityEstimator>;

/// The default [`VelocityTrackerBuilder`]: a least-squares [`VelocityTracker`]
/// for every pointer.
#[must_use]
pub fn default_velocity_tracker(_event: &PointerEvent) -> Box<dyn VelocityEstimator> {
    Box::new(VelocityTracker::new())
}

/// The direction a drag recognizer follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DragAxis {
    /// Vertical movement only.
    Vertical,
    /// Horizontal movement only.
    Horizontal,
    /// Movement in any direction (a pan).
    Free,
}

impl DragAxis {
    /// The part of `delta` that counts for this axis.
    #[must_use]
    pub fn project(self, delta: Vec2) -> Vec2 {
        match self {
            Self::Vertical => Vec2::new(0.0, delta.y),
            Self::Horizontal => Vec2::new(delta.x, 0.0),
            Self::Free => delta,
        }
    }

    /// The signed component along the axis, or `None` for free drags.
    #[must_use]
    pub fn primary_value(self, delta: Vec2) -> Option<f64> {
        match self {
            Self::Vertical => Some(delta.y),
            Self::Horizontal => Some(delta.x),
            Self::Free => None,
        }
    }

    pub(super) fn threshold(self, settings: &GestureSettings, kind: PointerDeviceKind) -> f64 {
        match self {
            Self::Vertical | Self::Horizontal => settings.hit_slop(kind),
            Self::Free => settings.pan_slop(kind),
        }
    }

    pub(super) fn is_fling(
        self,
        estimate: &VelocityEstimate,
        min_velocity: f64,
        min_distance: f64,
    ) -> bool {
        let velocity = estimate.pixels_per_second;
        let offset = estimate.offset;
        match self {
            Self::Vertical => velocity.y.abs() > min_velocity && offset.y.abs() > min_distance,
            Self::Horizontal => velocity.x.abs() > min_velocity && offset.x.abs() > min_distance,
            Self::Free => {
                velocity.hypot2() > min_velocity * min_velocity
                    && offset.hypot2() > min_distance * min_distance
            }
        }
    }

    pub(super) fn fling_velocity(
        self,
        estimate: &VelocityEstimate,
        min_velocity: f64,
        max_velocity: f64,
    ) -> Velocity {
        match self {
            Self::Vertical | Self::Horizontal => {
                let velocity = estimate.pixels_per_second;
                let clamped = Vec2::new(
                    velocity.x.clamp(-max_velocity, max_velocity),
                    velocity.y.clamp(-max_velocity, max_velocity),
                );
                Velocity::new(self.project(clamped))
            }
            Self::Free => estimate.velocity().clamp_magnitude(min_velocity, max_velocity),
        }
    }
}

/// How the movements of several pointers on one drag are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MultitouchDragStrategy {
    /// Only the most recently accepted pointer moves the drag.
    #[default]
    LatestPointer,
    /// Every accepted pointer's movement is added to the drag.
    SumAllPointers,
    /// Within a frame, each axis follows the pointer that has moved furthest
    /// in that direction; pans are additionally averaged over the pointers.
    AverageBoundaryPointers,
}

/// Where a drag reports its start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DragStartBehavior {
    /// Start at the down position; the movement made before the drag was
    /// recognized arrives as the first update.
    Down,
    /// Start where the drag was recognized.
    #[default]
    Start,
}

/// A pointer that may start a drag went down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragDownDetails {
    /// Down position in global coordinates.
    pub global_position: Point,
    /// Down position in the target's coordinates.
    pub local_position: Point,
}

/// A drag was recognized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragStartDetails {
    /// Timestamp of the event that triggered recognition, if any.
    pub source_timestamp: Option<Duration>,
    /// Start position in global coordinates.
    pub global_position: Point,
    /// Start position in the target's coordinates.
    pub local_position: Point,
    /// Device driving the drag.
    pub kind: PointerDeviceKind,
}

/// A recognized drag moved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragUpdateDetails {
    /// Timestamp of the move.
    pub source_timestamp: Option<Duration>,
    /// Movement in the target's coordinates, projected onto the drag axis.
    pub delta: Vec2,
    /// Signed movement along the axis; `None` for pans.
    pub primary_delta: Option<f64>,
    /// Pointer position in global coordinates.
    pub global_position: Point,
    /// Pointer position in the target's coordinates.
    pub local_position: Point,
}

/// A recognized drag ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragEndDetails {
    /// Fling velocity, or zero if the drag did not end in a fling.
    pub velocity: Velocity,
    /// Signed velocity along the axis; `None` for pans.
    pub primary_velocity: Option<f64>,
    /// Last pointer position in global coordinates.
    pub global_position: Point,
    /// Last pointer position in the target's coordinates.
    pub local_position: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum DragPhase {
    Ready,
    Possible,
    Accepted,
}

#[derive(Default)]
struct DragCallbacks {
    on_down: Handler<DragDownDetails>,
    on_start: Handler<DragStartDetails>,
    on_update: Handler<DragUpdateDetails>,
    on_end: Handler<DragEndDetails>,
    on_cancel: Handler<()>,
}

impl DragCallbacks {
    fn is_empty(&self) -> bool {
        self.on_down.is_none()
            && self.on_start.is_none()
            && self.on_update.is_none()
            && self.on_end.is_none()
            && self.on_cancel.is_none()
    }
}

enum DragEmit {
    Down(DragDownDetails),
    Start(DragStartDetails),
    Update(DragUpdateDetails),
    End(DragEndDetails),
    Cancel,
}

type Emits = Vec<DragEmit>;

#[derive(Clone, Copy, Debug)]
struct DragConfig {
    filter: PointerFilter,
    settings: Option<GestureSettings>,
    min_fling_distance: Option<f64>,
    min_fling_velocity: Option<f64>,
    max_fling_velocity: Option<f64>,
    drag_start_behavior: DragStartBehavior,
    multitouch_strategy: MultitouchDragStrategy,
    only_accept_drag_on_threshold: bool,
    velocity_tracker_builder: VelocityTrackerBuilder,
}

struct TrackedPointer {
    kind: PointerDeviceKind,
    velocity: Box<dyn VelocityEstimator>,
}

struct DragState {
    axis: DragAxis,
    config: DragConfig,
    tracking: PointerTracking,
    phase: DragPhase,
    initial_position: PositionPair,
    pending_drag_offset: DeltaPair,
    final_position: PositionPair,
    last_pending_event_timestamp: Option<Duration>,
    last_transform: Option<Affine>,
    initial_buttons: Option<PointerButtons>,
    global_distance_moved: f64,
    has_drag_threshold_been_met: bool,
    accepted_active_pointers: SmallVec<[PointerId; 2]>,
    active_pointer: Option<PointerId>,
    pointers: HashMap<PointerId, TrackedPointer>,
    move_delta_before_frame: HashMap<PointerId, Vec2>,
    frame_key: Option<Duration>,
}

impl fmt::Debug for DragState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragState")
            .field("axis", &self.axis)
            .field("phase", &self.phase)
            .field("tracking", &self.tracking)
            .field("initial_position", &self.initial_position)
            .field("global_distance_moved", &self.global_distance_moved)
            .field("accepted_active_pointers", &self.accepted_active_pointers)
            .field("active_pointer", &self.active_pointer)
            .finish_non_exhaustive()
    }
}

/// `-1`, `0` or `1`, with zero mapping to zero.
pub(super) fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub(super) fn invert(transform: Option<Affine>) -> Option<Affine> {
    transform.and_then(|transform| {
        let det = transform.determinant();
        (det != 0.0 && det.is_finite()).then(|| transform.inverse())
    })
}

impl DragState {
    fn settings(&self, ctx: &GestureContext) -> GestureSettings {
        self.config.settings.unwrap_or_else(|| ctx.settings())
    }

    fn add_tracked_pointer(&mut self, ctx: &GestureContext, event: &PointerEvent, emits: &mut Emits) {
        self.pointers.insert(
            event.pointer,
            TrackedPointer {
                kind: event.device_kind,
                velocity: (self.config.velocity_tracker_builder)(event),
            },
        );
        match self.phase {
            DragPhase::Ready => {
                self.phase = DragPhase::Possible;
                self.initial_position = event.position_pair();
                self.final_position = self.initial_position;
                self.pending_drag_offset = DeltaPair::ZERO;
                self.global_distance_moved = 0.0;
                self.has_drag_threshold_been_met = false;
                self.last_pending_event_timestamp = Some(event.timestamp);
                self.last_transform = event.transform;
                emits.push(DragEmit::Down(DragDownDetails {
                    global_position: self.initial_position.global,
                    local_position: self.initial_position.local,
                }));
            }
            DragPhase::Possible => {}
            DragPhase::Accepted => self.tracking.resolve(ctx, GestureDisposition::Accepted),
        }
    }

    fn should_track_move_event(&self, pointer: PointerId) -> bool {
        match self.config.multitouch_strategy {
            MultitouchDragStrategy::SumAllPointers
            | MultitouchDragStrategy::AverageBoundaryPointers => true,
            MultitouchDragStrategy::LatestPointer => {
                self.active_pointer.is_none_or(|active| active == pointer)
            }
        }
    }

    fn has_sufficient_global_distance_to_accept(
        &self,
        settings: &GestureSettings,
        kind: PointerDeviceKind,
    ) -> bool {
        self.global_distance_moved.abs() > self.axis.threshold(settings, kind)
    }

    fn component(delta: Vec2, horizontal: bool) -> f64 {
        if horizontal { delta.x } else { delta.y }
    }

    /// Movement of `pointer` earlier in this frame, in `positive` direction.
    fn sum_delta(&self, pointer: PointerId, positive: bool, horizontal: bool) -> f64 {
        let Some(&delta) = self.move_delta_before_frame.get(&pointer) else {
            return 0.0;
        };
        let value = Self::component(delta, horizontal);
        if positive { value.max(0.0) } else { value.min(0.0) }
    }

    fn max_sum_delta_pointer(&self, positive: bool, horizontal: bool) -> Option<PointerId> {
        let mut best: Option<(PointerId, f64)> = None;
        for &pointer in self.move_delta_before_frame.keys() {
            let sum = self.sum_delta(pointer, positive, horizontal);
            let better = match best {
                None => true,
                Some((_, max)) if positive => sum > max,
                Some((_, min)) => sum < min,
            };
            if better {
                best = Some((pointer, sum));
            }
        }
        best.map(|(pointer, _)| pointer)
    }

    fn resolve_axis_delta(&self, pointer: PointerId, local_delta: Vec2, horizontal: bool) -> f64 {
        let delta = Self::component(local_delta, horizontal);
        let positive = delta > 0.0;
        let Some(boundary) = self
            .max_sum_delta_pointer(positive, horizontal)
            .filter(|&boundary| boundary != pointer)
        else {
            return delta;
        };
        let boundary_sum = self.sum_delta(boundary, positive, horizontal);
        let current = self.sum_delta(pointer, positive, horizontal) + delta;
        let beyond = if positive {
            current > boundary_sum
        } else {
            current < boundary_sum
        };
        if beyond { current - boundary_sum } else { 0.0 }
    }

    fn resolve_local_delta_for_multitouch(
        &mut self,
        pointer: PointerId,
        local_delta: Vec2,
        frame_key: Duration,
    ) -> Vec2 {
        if self.config.multitouch_strategy != MultitouchDragStrategy::AverageBoundaryPointers {
            return local_delta;
        }
        if self.frame_key != Some(frame_key) {
            // First move of a frame: nothing to average against yet.
            self.move_delta_before_frame.clear();
            self.frame_key = Some(frame_key);
            return local_delta;
        }
        let resolved = Vec2::new(
            self.resolve_axis_delta(pointer, local_delta, true),
            self.resolve_axis_delta(pointer, local_delta, false),
        );
        if self.axis == DragAxis::Free && !self.accepted_active_pointers.is_empty() {
            resolved / self.accepted_active_pointers.len() as f64
        } else {
            resolved
        }
    }

    fn record_move_delta_for_multitouch(&mut self, pointer: PointerId, local_delta: Vec2) {
        if self.config.multitouch_strategy != MultitouchDragStrategy::AverageBoundaryPointers {
            return;
        }
        *self
            .move_delta_before_frame
            .entry(pointer)
            .or_insert(Vec2::ZERO) += local_delta;
    }

    fn record_velocity_sample(&mut self, event: &PointerEvent) {
        let position = match event.kind {
            PointerEventKind::Down | PointerEventKind::Move => event.local_position,
            PointerEventKind::PanZoomStart => Point::ZERO,
            PointerEventKind::PanZoomUpdate { pan, .. } => pan.to_point(),
            _ => return,
        };
        if let Some(tracked) = self.pointers.get_mut(&event.pointer) {
            tracked.velocity.add_position(event.timestamp, position);
        }
    }

    fn handle_event(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<DragInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        debug_assert!(self.phase != DragPhase::Ready, "routed event while not tracking");
        let now = ctx.now().max(event.timestamp);
        if !event.synthesized {
            self.record_velocity_sample(event);
        }

        if event.kind == PointerEventKind::Move && Some(event.buttons) != self.initial_buttons {
            self.give_up_pointer(ctx, this, event.pointer, now, emits);
            return;
        }

        let is_move = matches!(
            event.kind,
            PointerEventKind::Move | PointerEventKind::PanZoomUpdate { .. }
        );
        if is_move && self.should_track_move_event(event.pointer) {
            let delta = event.drag_delta_pair();
            let position = event.drag_position_pair();
            self.final_position = position;
            let frame_key = ctx.frame_time().unwrap_or(event.timestamp);
            let resolved = self.resolve_local_delta_for_multitouch(event.pointer, delta.local, frame_key);
            match self.phase {
                DragPhase::Accepted => {
                    emits.push(DragEmit::Update(DragUpdateDetails {
                        source_timestamp: Some(event.timestamp),
                        delta: self.axis.project(resolved),
                        primary_delta: self.axis.primary_value(resolved),
                        global_position: position.global,
                        local_position: position.local,
                    }));
                }
                DragPhase::Ready | DragPhase::Possible => {
                    self.pending_drag_offset += delta;
                    self.last_pending_event_timestamp = Some(event.timestamp);
                    self.last_transform = event.transform;
                    let moved_locally = self.axis.project(delta.local);
                    let local_to_global = invert(event.transform);
                    let moved_globally =
                        transform_delta_via_positions(local_to_global, moved_locally, position.local);
                    self.global_distance_moved += moved_globally.hypot()
                        * sign(self.axis.primary_value(moved_locally).unwrap_or(1.0));
                    let settings = self.settings(ctx);
                    if self.has_sufficient_global_distance_to_accept(&settings, event.device_kind) {
                        self.has_drag_threshold_been_met = true;
                        if self.accepted_active_pointers.contains(&event.pointer) {
                            self.check_drag(ctx, event.pointer, emits);
                        } else {
                            debug!("{:?} drag passed its slop", self.axis);
                            self.tracking.resolve(ctx, GestureDisposition::Accepted);
                        }
                    }
                }
            }
            self.record_move_delta_for_multitouch(event.pointer, delta.local);
        }

        if event.kind.is_end() {
            self.give_up_pointer(ctx, this, event.pointer, now, emits);
        }
    }

    fn accept_gesture(&mut self, ctx: &GestureContext, pointer: PointerId, emits: &mut Emits) {
        if !self.tracking.is_tracking(pointer) {
            return;
        }
        if !self.accepted_active_pointers.contains(&pointer) {
            self.accepted_active_pointers.push(pointer);
        }
        self.active_pointer = Some(pointer);
        if !self.config.only_accept_drag_on_threshold || self.has_drag_threshold_been_met {
            self.check_drag(ctx, pointer, emits);
        }
    }

    fn give_up_pointer(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<DragInner>,
        pointer: PointerId,
        now: Duration,
        emits: &mut Emits,
    ) {
        if self.tracking.stop(ctx, this, pointer) {
            self.did_stop_tracking_last_pointer(ctx, pointer, now, emits);
        }
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
        self.move_delta_before_frame.remove(&pointer);
        if self.active_pointer == Some(pointer) {
            self.active_pointer = self.accepted_active_pointers.first().copied();
        }
    }

    fn did_stop_tracking_last_pointer(
        &mut self,
        ctx: &GestureContext,
        pointer: PointerId,
        now: Duration,
        emits: &mut Emits,
    ) {
        match self.phase {
            DragPhase::Ready => {}
            DragPhase::Possible => {
                self.tracking.resolve(ctx, GestureDisposition::Rejected);
                emits.push(DragEmit::Cancel);
            }
            DragPhase::Accepted => self.check_end(ctx, pointer, now, emits),
        }
        self.pointers.clear();
        self.initial_buttons = None;
        self.phase = DragPhase::Ready;
    }

    fn check_drag(&mut self, ctx: &GestureContext, pointer: PointerId, emits: &mut Emits) {
        if self.phase == DragPhase::Accepted {
            return;
        }
        self.phase = DragPhase::Accepted;
        let delta = self.pending_drag_offset;
        let timestamp = self.last_pending_event_timestamp.take();
        let transform = self.last_transform.take();
        let local_update_delta = match self.config.drag_start_behavior {
            DragStartBehavior::Start => {
                self.initial_position += delta;
                Vec2::ZERO
            }
            DragStartBehavior::Down => self.axis.project(delta.local),
        };
        self.pending_drag_offset = DeltaPair::ZERO;

        let kind = self
            .pointers
            .get(&pointer)
            .map_or(PointerDeviceKind::default(), |tracked| tracked.kind);
        debug!("{:?} drag started by {:?}", self.axis, pointer);
        emits.push(DragEmit::Start(DragStartDetails {
            source_timestamp: timestamp,
            global_position: self.initial_position.global,
            local_position: self.initial_position.local,
            kind,
        }));

        if local_update_delta != Vec2::ZERO {
            let local_to_global = invert(transform);
            let corrected_local = self.initial_position.local + local_update_delta;
            let global_update_delta =
                transform_delta_via_positions(local_to_global, local_update_delta, corrected_local);
            let corrected = self.initial_position + DeltaPair::new(local_update_delta, global_update_delta);
            emits.push(DragEmit::Update(DragUpdateDetails {
                source_timestamp: timestamp,
                delta: local_update_delta,
                primary_delta: self.axis.primary_value(local_update_delta),
                global_position: corrected.global,
                local_position: corrected.local,
            }));
        }

        // Only one pointer may have been accepted so far; claim the rest.
        self.tracking.resolve(ctx, GestureDisposition::Accepted);
    }

    fn check_end(&mut self, ctx: &GestureContext, pointer: PointerId, now: Duration, emits: &mut Emits) {
        let settings = self.settings(ctx);
        let not_a_fling = DragEndDetails {
            velocity: Velocity::ZERO,
            primary_velocity: self.axis.primary_value(Vec2::ZERO),
            global_position: self.final_position.global,
            local_position: self.final_position.local,
        };
        let Some(tracked) = self.pointers.get(&pointer) else {
            emits.push(DragEmit::End(not_a_fling));
            return;
        };
        let Some(estimate) = tracked.velocity.velocity_estimate(now) else {
            emits.push(DragEmit::End(not_a_fling));
            return;
        };
        let min_velocity = self.config.min_fling_velocity.unwrap_or(MIN_FLING_VELOCITY);
        let min_distance = self
            .config
            .min_fling_distance
            .unwrap_or_else(|| settings.hit_slop(tracked.kind));
        let max_velocity = self.config.max_fling_velocity.unwrap_or(MAX_FLING_VELOCITY);
        if !self.axis.is_fling(&estimate, min_velocity, min_distance) {
            debug!("{:?} drag ended without a fling", self.axis);
            emits.push(DragEmit::End(not_a_fling));
            return;
        }
        let velocity = self.axis.fling_velocity(&estimate, min_velocity, max_velocity);
        debug!("{:?} drag flung at {:?}", self.axis, velocity.pixels_per_second);
        emits.push(DragEmit::End(DragEndDetails {
            velocity,
            primary_velocity: self.axis.primary_value(velocity.pixels_per_second),
            ..not_a_fling
        }));
    }

    fn reset(&mut self) {
        self.phase = DragPhase::Ready;
        self.pointers.clear();
        self.initial_buttons = None;
        self.accepted_active_pointers.clear();
        self.active_pointer = None;
        self.move_delta_before_frame.clear();
    }
}

struct DragInner {
    state: RefCell<DragState>,
    callbacks: RefCell<DragCallbacks>,
}

impl DragInner {
    fn emit(&self, emits: Emits) {
        for emit in emits {
            match emit {
                DragEmit::Down(details) => invoke(&self.callbacks, |c| &mut c.on_down, &details),
                DragEmit::Start(details) => invoke(&self.callbacks, |c| &mut c.on_start, &details),
                DragEmit::Update(details) => {
                    invoke(&self.callbacks, |c| &mut c.on_update, &details);
                }
                DragEmit::End(details) => invoke(&self.callbacks, |c| &mut c.on_end, &details),
                DragEmit::Cancel => invoke(&self.callbacks, |c| &mut c.on_cancel, &()),
            }
        }
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        let state = self.state.borrow();
        match state.initial_buttons {
            None => {
                if event.buttons != PointerButtons::PRIMARY || self.callbacks.borrow().is_empty() {
                    return false;
                }
            }
            Some(initial) => {
                if event.buttons != initial {
                    return false;
                }
            }
        }
        state.config.filter.allows(event, primary_button_only)
    }

    fn is_pan_zoom_allowed(&self, event: &PointerEvent) -> bool {
        let state = self.state.borrow();
        state
            .config
            .filter
            .supported_devices
            .is_none_or(|devices| devices.contains_kind(event.device_kind))
            && !self.callbacks.borrow().is_empty()
    }
}

impl PointerRoute for DragInner {
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

impl GestureArenaMember for DragInner {
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
                .give_up_pointer(ctx, &self, pointer, ctx.now(), &mut emits);
            self.emit(emits);
        });
    }
}

/// Recognizes drags: vertical, horizontal, or free (pans).
///
/// `on_drag_down` fires as soon as a pointer that may start a drag goes
/// down. The drag claims the arena once the pointer has travelled more than
/// the slop along its axis (the touch slop for axis-locked drags, the larger
/// pan slop for pans), or when every competitor has given up. Winning fires
/// `on_drag_start`, then every move fires `on_drag_update` with the movement
/// projected onto the axis. When the last pointer lifts, `on_drag_end`
/// reports the fling velocity, or zero if the release was not a fling. A drag
/// that never starts fires `on_drag_cancel` instead.
///
/// ```
/// use core::time::Duration;
/// use kurbo::{Point, Vec2};
/// use understory_gesture::{
///     DragGestureRecognizer, GestureContext, GestureRecognizer, PointerEvent, PointerId,
/// };
///
/// let ctx = GestureContext::new();
/// let drag = DragGestureRecognizer::vertical()
///     .with_only_accept_drag_on_threshold(true)
///     .on_drag_start(|details| assert_eq!(details.global_position.y, 30.0));
///
/// let down = PointerEvent::down(PointerId(1), Point::new(0.0, 0.0));
/// drag.add_pointer(&ctx, &down);
/// ctx.router().route(&down);
/// ctx.arena().close(PointerId(1));
///
/// let moved = PointerEvent::moved(PointerId(1), Point::new(0.0, 30.0))
///     .with_delta(Vec2::new(0.0, 30.0))
///     .with_timestamp(Duration::from_millis(16));
/// ctx.router().route(&moved);
/// assert!(drag.is_dragging());
/// ```
#[derive(Clone)]
pub struct DragGestureRecognizer {
    inner: Rc<DragInner>,
}

impl fmt::Debug for DragGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragGestureRecognizer")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl DragGestureRecognizer {
    /// Creates a drag recognizer following `axis`.
    #[must_use]
    pub fn new(axis: DragAxis) -> Self {
        Self {
            inner: Rc::new(DragInner {
                state: RefCell::new(DragState {
                    axis,
                    config: DragConfig {
                        filter: PointerFilter::default(),
                        settings: None,
                        min_fling_distance: None,
                        min_fling_velocity: None,
                        max_fling_velocity: None,
                        drag_start_behavior: DragStartBehavior::default(),
                        multitouch_strategy: MultitouchDragStrategy::default(),
                        only_accept_drag_on_threshold: false,
                        velocity_tracker_builder: default_velocity_tracker,
                    },
                    tracking: PointerTracking::default(),
                    phase: DragPhase::Ready,
                    initial_position: PositionPair::default(),
                    pending_drag_offset: DeltaPair::ZERO,
                    final_position: PositionPair::default(),
                    last_pending_event_timestamp: None,
                    last_transform: None,
                    initial_buttons: None,
                    global_distance_moved: 0.0,
                    has_drag_threshold_been_met: false,
                    accepted_active_pointers: SmallVec::new(),
                    active_pointer: None,
                    pointers: HashMap::new(),
                    move_delta_before_frame: HashMap::new(),
                    frame_key: None,
                }),
                callbacks: RefCell::new(DragCallbacks::default()),
            }),
        }
    }

    /// Creates a recognizer for vertical drags.
    #[must_use]
    pub fn vertical() -> Self {
        Self::new(DragAxis::Vertical)
    }

    /// Creates a recognizer for horizontal drags.
    #[must_use]
    pub fn horizontal() -> Self {
        Self::new(DragAxis::Horizontal)
    }

    /// Creates a recognizer for pans.
    #[must_use]
    pub fn pan() -> Self {
        Self::new(DragAxis::Free)
    }

    /// The axis this recognizer follows.
    #[must_use]
    pub fn axis(&self) -> DragAxis {
        self.inner.state.borrow().axis
    }

    /// Returns `true` while a recognized drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.inner.state.borrow().phase == DragPhase::Accepted
    }

    /// Sets the callback run when a pointer that may start a drag goes down.
    #[must_use]
    pub fn on_drag_down(self, f: impl FnMut(&DragDownDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_down = handler(f);
        self
    }

    /// Sets the callback run when the drag is recognized.
    #[must_use]
    pub fn on_drag_start(self, f: impl FnMut(&DragStartDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_start = handler(f);
        self
    }

    /// Sets the callback run for each movement of a recognized drag.
    #[must_use]
    pub fn on_drag_update(self, f: impl FnMut(&DragUpdateDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_update = handler(f);
        self
    }

    /// Sets the callback run when a recognized drag ends.
    #[must_use]
    pub fn on_drag_end(self, f: impl FnMut(&DragEndDetails) + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_end = handler(f);
        self
    }

    /// Sets the callback run when a drag that went down never starts.
    #[must_use]
    pub fn on_drag_cancel(self, f: impl FnMut() + 'static) -> Self {
        self.inner.callbacks.borrow_mut().on_cancel = void_handler(f);
        self
    }

    /// Restricts the devices and buttons the recognizer responds to.
    #[must_use]
    pub fn with_filter(self, filter: PointerFilter) -> Self {
        self.inner.state.borrow_mut().config.filter = filter;
        self
    }

    /// Uses `settings` instead of the context's settings.
    #[must_use]
    pub fn with_settings(self, settings: GestureSettings) -> Self {
        self.inner.state.borrow_mut().config.settings = Some(settings);
        self
    }

    /// Sets the distance a release must have covered to count as a fling.
    ///
    /// Defaults to the hit slop of the pointer's device.
    #[must_use]
    pub fn with_min_fling_distance(self, distance: f64) -> Self {
        self.inner.state.borrow_mut().config.min_fling_distance = Some(distance);
        self
    }

    /// Sets the speed a release must exceed to count as a fling.
    #[must_use]
    pub fn with_min_fling_velocity(self, velocity: f64) -> Self {
        self.inner.state.borrow_mut().config.min_fling_velocity = Some(velocity);
        self
    }

    /// Sets the speed fling velocities are clamped to.
    #[must_use]
    pub fn with_max_fling_velocity(self, velocity: f64) -> Self {
        self.inner.state.borrow_mut().config.max_fling_velocity = Some(velocity);
        self
    }

    /// Sets where the drag reports its start.
    #[must_use]
    pub fn with_drag_start_behavior(self, behavior: DragStartBehavior) -> Self {
        self.inner.state.borrow_mut().config.drag_start_behavior = behavior;
        self
    }

    /// Sets how several pointers on the drag are combined.
    #[must_use]
    pub fn with_multitouch_strategy(self, strategy: MultitouchDragStrategy) -> Self {
        self.inner.state.borrow_mut().config.multitouch_strategy = strategy;
        self
    }

    /// When set, winning the arena alone does not start the drag; the slop
    /// must also have been exceeded.
    #[must_use]
    pub fn with_only_accept_drag_on_threshold(self, only_on_threshold: bool) -> Self {
        self.inner
            .state
            .borrow_mut()
            .config
            .only_accept_drag_on_threshold = only_on_threshold;
        self
    }

    /// Chooses the velocity estimator for each tracked pointer.
    #[must_use]
    pub fn with_velocity_tracker_builder(self, builder: VelocityTrackerBuilder) -> Self {
        self.inner.state.borrow_mut().config.velocity_tracker_builder = builder;
        self
    }
}

impl GestureRecognizer for DragGestureRecognizer {
    fn add_pointer(&self, ctx: &GestureContext, event: &PointerEvent) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            if inner.is_pointer_allowed(event) {
                let mut state = inner.state.borrow_mut();
                state
                    .tracking
                    .start(ctx, inner, event.pointer, event.transform);
                if state.phase == DragPhase::Ready {
                    state.initial_buttons = Some(event.buttons);
                }
                state.add_tracked_pointer(ctx, event, &mut emits);
            } else {
                inner
                    .state
                    .borrow_mut()
                    .tracking
                    .resolve(ctx, GestureDisposition::Rejected);
            }
            inner.emit(emits);
        });
    }

    fn add_pointer_pan_zoom(&self, ctx: &GestureContext, event: &PointerEvent) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            if inner.is_pan_zoom_allowed(event) {
                let mut state = inner.state.borrow_mut();
                state
                    .tracking
                    .start(ctx, inner, event.pointer, event.transform);
                if state.phase == DragPhase::Ready {
                    state.initial_buttons = Some(PointerButtons::PRIMARY);
                }
                state.add_tracked_pointer(ctx, event, &mut emits);
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
            let mut state = inner.state.borrow_mut();
            state.tracking.dispose(ctx, inner);
            state.reset();
        });
    }

    fn debug_description(&self) -> &'static str {
        match self.axis() {
            DragAxis::Vertical => "vertical drag",
            DragAxis::Horizontal => "horizontal drag",
            DragAxis::Free => "pan",
        }
    }
}
