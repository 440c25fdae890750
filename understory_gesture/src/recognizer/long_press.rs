// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Long-press recognition.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;

use kurbo::{Point, Vec2};
use log::debug;
use understory_velocity::{Velocity, VelocityEstimator, VelocityTracker};

use super::primary::{DeadlineRecognizer, GestureRecognizerState, PrimaryEvent, PrimaryPointerState};
use super::{
    CallbackButton, GestureRecognizer, Handler, PointerFilter, any_buttons, handler, invoke,
    void_handler,
};
use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::context::GestureContext;
use crate::event::{
    PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId, PositionPair,
};
use crate::router::PointerRoute;
use crate::settings::{LONG_PRESS_TIMEOUT, TOUCH_SLOP};

/// Where a long press went down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongPressDownDetails {
    /// Down position in global coordinates.
    pub global_position: Point,
    /// Down position in the target's coordinates.
    pub local_position: Point,
    /// Device that produced the press.
    pub kind: PointerDeviceKind,
}

/// Where a recognized long press started.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongPressStartDetails {
    /// Origin in global coordinates.
    pub global_position: Point,
    /// Origin in the target's coordinates.
    pub local_position: Point,
}

/// Movement after a long press was recognized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongPressMoveUpdateDetails {
    /// Current position in global coordinates.
    pub global_position: Point,
    /// Current position in the target's coordinates.
    pub local_position: Point,
    /// Movement since the origin, in global coordinates.
    pub offset_from_origin: Vec2,
    /// Movement since the origin, in the target's coordinates.
    pub local_offset_from_origin: Vec2,
}

/// How a recognized long press ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongPressEndDetails {
    /// Up position in global coordinates.
    pub global_position: Point,
    /// Up position in the target's coordinates.
    pub local_position: Point,
    /// Pointer velocity when it was lifted.
    pub velocity: Velocity,
}

#[derive(Default)]
struct ButtonCallbacks {
    on_down: Handler<LongPressDownDetails>,
    on_cancel: Handler<()>,
    on_start: Handler<LongPressStartDetails>,
    on_long_press: Handler<()>,
    on_move_update: Handler<LongPressMoveUpdateDetails>,
    on_end: Handler<LongPressEndDetails>,
    on_up: Handler<()>,
}

impl ButtonCallbacks {
    fn is_empty(&self) -> bool {
        self.on_down.is_none()
            && self.on_cancel.is_none()
            && self.on_start.is_none()
            && self.on_long_press.is_none()
            && self.on_move_update.is_none()
            && self.on_end.is_none()
            && self.on_up.is_none()
    }
}

#[derive(Default)]
struct LongPressCallbacks {
    primary: ButtonCallbacks,
    secondary: ButtonCallbacks,
    tertiary: ButtonCallbacks,
}

impl LongPressCallbacks {
    fn button(&mut self, button: CallbackButton) -> &mut ButtonCallbacks {
        match button {
            CallbackButton::Primary => &mut self.primary,
            CallbackButton::Secondary => &mut self.secondary,
            CallbackButton::Tertiary => &mut self.tertiary,
        }
    }
}

enum Emit {
    Down(LongPressDownDetails),
    Cancel,
    Start(LongPressStartDetails),
    MoveUpdate(LongPressMoveUpdateDetails),
    End(LongPressEndDetails),
}

type Emits = Vec<(CallbackButton, Emit)>;

struct LongPressState {
    primary: PrimaryPointerState,
    filter: PointerFilter,
    long_press_accepted: bool,
    origin: Option<PositionPair>,
    initial_buttons: Option<PointerButtons>,
    velocity_tracker: Option<Box<dyn VelocityEstimator>>,
}

impl fmt::Debug for LongPressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongPressState")
            .field("primary", &self.primary)
            .field("long_press_accepted", &self.long_press_accepted)
            .field("origin", &self.origin)
            .field("initial_buttons", &self.initial_buttons)
            .finish_non_exhaustive()
    }
}

impl LongPressState {
    fn reset(&mut self) {
        self.long_press_accepted = false;
        self.origin = None;
        self.initial_buttons = None;
        self.velocity_tracker = None;
    }

    fn push(&self, emits: &mut Emits, emit: Emit) {
        if let Some(button) = self.initial_buttons.and_then(CallbackButton::from_buttons) {
            emits.push((button, emit));
        }
    }

    fn check_cancel(&self, emits: &mut Emits) {
        if self.primary.state == GestureRecognizerState::Possible {
            self.push(emits, Emit::Cancel);
        }
    }

    fn check_start(&self, emits: &mut Emits) {
        if let Some(origin) = self.origin {
            debug!("long press recognized at {:?}", origin.global);
            self.push(
                emits,
                Emit::Start(LongPressStartDetails {
                    global_position: origin.global,
                    local_position: origin.local,
                }),
            );
        }
    }

    fn resolve(&mut self, ctx: &GestureContext, disposition: GestureDisposition, emits: &mut Emits) {
        if disposition == GestureDisposition::Rejected {
            if self.long_press_accepted {
                // Cancelled after recognition, for instance by a button change.
                self.reset();
            } else {
                self.check_cancel(emits);
            }
        }
        self.primary.tracking.resolve(ctx, disposition);
    }

    fn stop_tracking(&mut self, ctx: &GestureContext, this: &Rc<LongPressInner>, pointer: PointerId) {
        if self.primary.tracking.stop(ctx, this, pointer) {
            self.primary.did_stop_tracking_last_pointer(ctx);
        }
    }

    fn handle_primary_pointer(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<LongPressInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        if !event.synthesized {
            match event.kind {
                PointerEventKind::Down => {
                    let mut tracker = VelocityTracker::new();
                    tracker.add_position(event.timestamp, event.local_position);
                    self.velocity_tracker = Some(Box::new(tracker));
                }
                PointerEventKind::Move => {
                    debug_assert!(
                        self.velocity_tracker.is_some(),
                        "move routed before the down"
                    );
                    if let Some(tracker) = &mut self.velocity_tracker {
                        tracker.add_position(event.timestamp, event.local_position);
                    }
                }
                _ => {}
            }
        }

        match event.kind {
            PointerEventKind::Up => {
                if self.long_press_accepted {
                    let now = ctx.now().max(event.timestamp);
                    let velocity = self
                        .velocity_tracker
                        .as_ref()
                        .and_then(|tracker| tracker.velocity_estimate(now))
                        .map_or(Velocity::ZERO, |estimate| estimate.velocity());
                    self.push(
                        emits,
                        Emit::End(LongPressEndDetails {
                            global_position: event.position,
                            local_position: event.local_position,
                            velocity,
                        }),
                    );
                } else {
                    // Lifted before the deadline.
                    self.resolve(ctx, GestureDisposition::Rejected, emits);
                }
                self.reset();
            }
            PointerEventKind::Cancel => {
                self.check_cancel(emits);
                self.reset();
            }
            PointerEventKind::Down => {
                self.origin = Some(event.position_pair());
                self.initial_buttons = Some(event.buttons);
                self.push(
                    emits,
                    Emit::Down(LongPressDownDetails {
                        global_position: event.position,
                        local_position: event.local_position,
                        kind: event.device_kind,
                    }),
                );
            }
            PointerEventKind::Move => {
                if Some(event.buttons) != self.initial_buttons && !self.long_press_accepted {
                    self.resolve(ctx, GestureDisposition::Rejected, emits);
                    if let Some(pointer) = self.primary.primary_pointer {
                        self.stop_tracking(ctx, this, pointer);
                    }
                } else if self.long_press_accepted {
                    if let Some(origin) = self.origin {
                        self.push(
                            emits,
                            Emit::MoveUpdate(LongPressMoveUpdateDetails {
                                global_position: event.position,
                                local_position: event.local_position,
                                offset_from_origin: event.position - origin.global,
                                local_offset_from_origin: event.local_position - origin.local,
                            }),
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

struct LongPressInner {
    state: RefCell<LongPressState>,
    callbacks: RefCell<LongPressCallbacks>,
}

impl LongPressInner {
    fn emit(&self, emits: Emits) {
        for (button, emit) in emits {
            match emit {
                Emit::Down(details) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_down, &details);
                }
                Emit::Cancel => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_cancel, &());
                }
                Emit::Start(details) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_start, &details);
                    invoke(&self.callbacks, |c| &mut c.button(button).on_long_press, &());
                }
                Emit::MoveUpdate(details) => {
                    invoke(
                        &self.callbacks,
                        |c| &mut c.button(button).on_move_update,
                        &details,
                    );
                }
                Emit::End(details) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_end, &details);
                    invoke(&self.callbacks, |c| &mut c.button(button).on_up, &());
                }
            }
        }
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        let Some(button) = CallbackButton::from_buttons(event.buttons) else {
            return false;
        };
        if self.callbacks.borrow_mut().button(button).is_empty() {
            return false;
        }
        self.state.borrow().filter.allows(event, any_buttons)
    }
}

impl PointerRoute for LongPressInner {
    fn handle_event(self: Rc<Self>, ctx: &GestureContext, event: &PointerEvent) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            {
                let mut state = self.state.borrow_mut();
                match state.primary.classify(event) {
                    PrimaryEvent::PastSlop => {
                        state.resolve(ctx, GestureDisposition::Rejected, &mut emits);
                        if let Some(pointer) = state.primary.primary_pointer {
                            state.stop_tracking(ctx, &self, pointer);
                        }
                    }
                    PrimaryEvent::Primary => {
                        state.handle_primary_pointer(ctx, &self, event, &mut emits);
                    }
                    PrimaryEvent::Other => {}
                }
                if state
                    .primary
                    .tracking
                    .stop_if_no_longer_down(ctx, &self, event)
                {
                    state.primary.did_stop_tracking_last_pointer(ctx);
                }
            }
            self.emit(emits);
        });
    }
}

impl GestureArenaMember for LongPressInner {
    fn accept_gesture(self: Rc<Self>, _ctx: &GestureContext, _pointer: PointerId) {
        // Winning by sweep means nothing; only the deadline recognizes a long
        // press.
    }

    fn reject_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId) {
        ctx.batch(|| self.state.borrow_mut().primary.reject_gesture(ctx, pointer));
    }
}

impl DeadlineRecognizer for LongPressInner {
    fn did_exceed_deadline(self: Rc<Self>, ctx: &GestureContext) {
        let mut emits = Emits::new();
        {
            let mut state = self.state.borrow_mut();
            state.resolve(ctx, GestureDisposition::Accepted, &mut emits);
            state.long_press_accepted = true;
            if let Some(pointer) = state.primary.primary_pointer {
                state.primary.accept_gesture(ctx, pointer);
            }
            state.check_start(&mut emits);
        }
        self.emit(emits);
    }
}

/// Recognizes a pointer held down without moving for a while.
///
/// The press is recognized when the pointer has been down for the deadline
/// ([`LONG_PRESS_TIMEOUT`] by default) without drifting more than the touch
/// slop. Recognition claims the arena outright: `on_long_press_start` and
/// `on_long_press` fire immediately. Afterwards the pointer may move freely
/// (`on_long_press_move_update`), and lifting it fires `on_long_press_end`
/// with the lift-off velocity, then `on_long_press_up`.
///
/// `on_long_press_down` fires for every tracked down; `on_long_press_cancel`
/// fires if the press fails before it is recognized.
#[derive(Clone)]
pub struct LongPressGestureRecognizer {
    inner: Rc<LongPressInner>,
}

impl fmt::Debug for LongPressGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongPressGestureRecognizer")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for LongPressGestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! long_press_callbacks {
    (
        $button:ident:
        $down:ident,
        $cancel:ident,
        $start:ident,
        $long_press:ident,
        $move_update:ident,
        $end:ident,
        $up:ident
    ) => {
        /// Sets the callback run for each tracked down of this button.
        #[must_use]
        pub fn $down(self, f: impl FnMut(&LongPressDownDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_down = handler(f);
            self
        }

        /// Sets the callback run when a press of this button fails before it
        /// is recognized.
        #[must_use]
        pub fn $cancel(self, f: impl FnMut() + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_cancel = void_handler(f);
            self
        }

        /// Sets the callback run when a long press of this button is
        /// recognized.
        #[must_use]
        pub fn $start(self, f: impl FnMut(&LongPressStartDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_start = handler(f);
            self
        }

        /// Sets the callback run right after the start callback.
        #[must_use]
        pub fn $long_press(self, f: impl FnMut() + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_long_press = void_handler(f);
            self
        }

        /// Sets the callback run for movement after recognition.
        #[must_use]
        pub fn $move_update(self, f: impl FnMut(&LongPressMoveUpdateDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_move_update = handler(f);
            self
        }

        /// Sets the callback run when a recognized press is lifted.
        #[must_use]
        pub fn $end(self, f: impl FnMut(&LongPressEndDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_end = handler(f);
            self
        }

        /// Sets the callback run right after the end callback.
        #[must_use]
        pub fn $up(self, f: impl FnMut() + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_up = void_handler(f);
            self
        }
    };
}

impl LongPressGestureRecognizer {
    /// Creates a long-press recognizer with the default deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_duration(LONG_PRESS_TIMEOUT)
    }

    /// Creates a long-press recognizer recognizing after `duration`.
    #[must_use]
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            inner: Rc::new(LongPressInner {
                state: RefCell::new(LongPressState {
                    primary: PrimaryPointerState::new(Some(duration), Some(TOUCH_SLOP), None),
                    filter: PointerFilter::default(),
                    long_press_accepted: false,
                    origin: None,
                    initial_buttons: None,
                    velocity_tracker: None,
                }),
                callbacks: RefCell::new(LongPressCallbacks::default()),
            }),
        }
    }

    long_press_callbacks!(
        primary: on_long_press_down,
        on_long_press_cancel,
        on_long_press_start,
        on_long_press,
        on_long_press_move_update,
        on_long_press_end,
        on_long_press_up
    );
    long_press_callbacks!(
        secondary: on_secondary_long_press_down,
        on_secondary_long_press_cancel,
        on_secondary_long_press_start,
        on_secondary_long_press,
        on_secondary_long_press_move_update,
        on_secondary_long_press_end,
        on_secondary_long_press_up
    );
    long_press_callbacks!(
        tertiary: on_tertiary_long_press_down,
        on_tertiary_long_press_cancel,
        on_tertiary_long_press_start,
        on_tertiary_long_press,
        on_tertiary_long_press_move_update,
        on_tertiary_long_press_end,
        on_tertiary_long_press_up
    );

    /// Restricts the devices and buttons the recognizer responds to.
    #[must_use]
    pub fn with_filter(self, filter: PointerFilter) -> Self {
        self.inner.state.borrow_mut().filter = filter;
        self
    }

    /// Limits how far the pointer may move after recognition; unlimited by
    /// default.
    #[must_use]
    pub fn with_post_accept_slop(self, slop: Option<f64>) -> Self {
        self.inner.state.borrow_mut().primary.post_accept_slop = slop;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GestureRecognizerState {
        self.inner.state.borrow().primary.state
    }
}

impl GestureRecognizer for LongPressGestureRecognizer {
    fn add_pointer(&self, ctx: &GestureContext, event: &PointerEvent) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            if inner.is_pointer_allowed(event) {
                inner
                    .state
                    .borrow_mut()
                    .primary
                    .add_allowed_pointer(ctx, inner, event);
            } else {
                let mut state = inner.state.borrow_mut();
                if state.primary.should_reject_non_allowed() {
                    state.resolve(ctx, GestureDisposition::Rejected, &mut emits);
                }
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
            {
                let mut state = inner.state.borrow_mut();
                state.primary.stop_timer(ctx);
                state.resolve(ctx, GestureDisposition::Rejected, &mut emits);
                state.primary.tracking.dispose(ctx, inner);
            }
            inner.emit(emits);
        });
    }

    fn debug_description(&self) -> &'static str {
        "long press"
    }
}
