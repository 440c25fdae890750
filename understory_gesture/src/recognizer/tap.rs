// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tap recognition for the primary, secondary and tertiary buttons.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;

use kurbo::Point;
use log::debug;

use super::primary::{DeadlineRecognizer, GestureRecognizerState, PrimaryEvent, PrimaryPointerState};
use super::{
    CallbackButton, GestureRecognizer, Handler, PointerFilter, any_buttons, handler, invoke,
    void_handler,
};
use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::context::GestureContext;
use crate::event::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::router::PointerRoute;
use crate::settings::{PRESS_TIMEOUT, TOUCH_SLOP};

/// Where and how a tap went down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapDownDetails {
    /// Down position in global coordinates.
    pub global_position: Point,
    /// Down position in the target's coordinates.
    pub local_position: Point,
    /// Device that produced the tap.
    pub kind: PointerDeviceKind,
}

/// Where and how a tap went up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapUpDetails {
    /// Up position in global coordinates.
    pub global_position: Point,
    /// Up position in the target's coordinates.
    pub local_position: Point,
    /// Device that produced the tap.
    pub kind: PointerDeviceKind,
}

#[derive(Default)]
struct ButtonCallbacks {
    on_down: Handler<TapDownDetails>,
    on_up: Handler<TapUpDetails>,
    on_tap: Handler<()>,
    on_cancel: Handler<()>,
}

impl ButtonCallbacks {
    fn is_empty(&self) -> bool {
        self.on_down.is_none()
            && self.on_up.is_none()
            && self.on_tap.is_none()
            && self.on_cancel.is_none()
    }
}

#[derive(Default)]
struct TapCallbacks {
    primary: ButtonCallbacks,
    secondary: ButtonCallbacks,
    tertiary: ButtonCallbacks,
}

impl TapCallbacks {
    fn button(&mut self, button: CallbackButton) -> &mut ButtonCallbacks {
        match button {
            CallbackButton::Primary => &mut self.primary,
            CallbackButton::Secondary => &mut self.secondary,
            CallbackButton::Tertiary => &mut self.tertiary,
        }
    }
}

enum TapEmit {
    Down(CallbackButton, TapDownDetails),
    Up(CallbackButton, TapUpDetails),
    Cancel(CallbackButton),
}

struct TapState {
    primary: PrimaryPointerState,
    filter: PointerFilter,
    sent_tap_down: bool,
    won_arena_for_primary_pointer: bool,
    down: Option<PointerEvent>,
    up: Option<PointerEvent>,
}

impl fmt::Debug for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapState")
            .field("primary", &self.primary)
            .field("sent_tap_down", &self.sent_tap_down)
            .field("won_arena", &self.won_arena_for_primary_pointer)
            .field("down", &self.down.as_ref().map(|down| down.pointer))
            .field("up", &self.up.as_ref().map(|up| up.pointer))
            .finish_non_exhaustive()
    }
}

type Emits = Vec<TapEmit>;

impl TapState {
    fn button(&self) -> Option<CallbackButton> {
        self.down
            .as_ref()
            .and_then(|down| CallbackButton::from_buttons(down.buttons))
    }

    fn reset(&mut self) {
        self.sent_tap_down = false;
        self.won_arena_for_primary_pointer = false;
        self.up = None;
        self.down = None;
    }

    fn add_allowed_pointer(&mut self, ctx: &GestureContext, this: &Rc<TapInner>, event: &PointerEvent) {
        if self.primary.state == GestureRecognizerState::Ready {
            // A previous tap whose arena never resolved is forgotten.
            if self.down.is_some() && self.up.is_some() {
                self.reset();
            }
            self.down = Some(event.clone());
        }
        if self.down.is_some() {
            self.primary.add_allowed_pointer(ctx, this, event);
        }
    }

    fn resolve(&mut self, ctx: &GestureContext, disposition: GestureDisposition, emits: &mut Emits) {
        if self.won_arena_for_primary_pointer && disposition == GestureDisposition::Rejected {
            debug_assert!(self.sent_tap_down, "won the arena without sending tap down");
            self.check_cancel(emits);
            self.reset();
        }
        self.primary.tracking.resolve(ctx, disposition);
    }

    fn stop_tracking(&mut self, ctx: &GestureContext, this: &Rc<TapInner>, pointer: PointerId) {
        if self.primary.tracking.stop(ctx, this, pointer) {
            self.primary.did_stop_tracking_last_pointer(ctx);
        }
    }

    fn handle_primary_pointer(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<TapInner>,
        event: &PointerEvent,
        emits: &mut Emits,
    ) {
        match event.kind {
            PointerEventKind::Up => {
                self.up = Some(event.clone());
                self.check_up(emits);
            }
            PointerEventKind::Cancel => {
                self.resolve(ctx, GestureDisposition::Rejected, emits);
                if self.sent_tap_down {
                    self.check_cancel(emits);
                }
                self.reset();
            }
            _ => {
                let buttons_changed = self
                    .down
                    .as_ref()
                    .is_some_and(|down| down.buttons != event.buttons);
                if buttons_changed {
                    self.resolve(ctx, GestureDisposition::Rejected, emits);
                    if let Some(pointer) = self.primary.primary_pointer {
                        self.stop_tracking(ctx, this, pointer);
                    }
                }
            }
        }
    }

    fn check_down(&mut self, emits: &mut Emits) {
        if self.sent_tap_down {
            return;
        }
        let Some(down) = &self.down else {
            return;
        };
        if let Some(button) = CallbackButton::from_buttons(down.buttons) {
            emits.push(TapEmit::Down(
                button,
                TapDownDetails {
                    global_position: down.position,
                    local_position: down.local_position,
                    kind: down.device_kind,
                },
            ));
        }
        self.sent_tap_down = true;
    }

    fn check_up(&mut self, emits: &mut Emits) {
        if !self.won_arena_for_primary_pointer {
            return;
        }
        let Some(up) = &self.up else {
            return;
        };
        if let Some(button) = self.button() {
            debug!("tap recognized for {:?}", up.pointer);
            emits.push(TapEmit::Up(
                button,
                TapUpDetails {
                    global_position: up.position,
                    local_position: up.local_position,
                    kind: up.device_kind,
                },
            ));
        }
        self.reset();
    }

    fn check_cancel(&self, emits: &mut Emits) {
        if let Some(button) = self.button() {
            emits.push(TapEmit::Cancel(button));
        }
    }
}

struct TapInner {
    state: RefCell<TapState>,
    callbacks: RefCell<TapCallbacks>,
}

impl TapInner {
    fn emit(&self, emits: Emits) {
        for emit in emits {
            match emit {
                TapEmit::Down(button, details) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_down, &details);
                }
                TapEmit::Up(button, details) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_up, &details);
                    invoke(&self.callbacks, |c| &mut c.button(button).on_tap, &());
                }
                TapEmit::Cancel(button) => {
                    invoke(&self.callbacks, |c| &mut c.button(button).on_cancel, &());
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

impl PointerRoute for TapInner {
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

impl GestureArenaMember for TapInner {
    fn accept_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            {
                let mut state = self.state.borrow_mut();
                state.primary.accept_gesture(ctx, pointer);
                if Some(pointer) == state.primary.primary_pointer {
                    state.check_down(&mut emits);
                    state.won_arena_for_primary_pointer = true;
                    state.check_up(&mut emits);
                }
            }
            self.emit(emits);
        });
    }

    fn reject_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId) {
        ctx.batch(|| {
            let mut emits = Emits::new();
            {
                let mut state = self.state.borrow_mut();
                state.primary.reject_gesture(ctx, pointer);
                if Some(pointer) == state.primary.primary_pointer {
                    if state.sent_tap_down {
                        state.check_cancel(&mut emits);
                    }
                    state.reset();
                }
            }
            self.emit(emits);
        });
    }
}

impl DeadlineRecognizer for TapInner {
    fn did_exceed_deadline(self: Rc<Self>, _ctx: &GestureContext) {
        let mut emits = Emits::new();
        self.state.borrow_mut().check_down(&mut emits);
        self.emit(emits);
    }
}

/// Recognizes taps.
///
/// A tap is a down followed by an up of the same button without the pointer
/// drifting more than the touch slop. Each of the primary, secondary and
/// tertiary buttons has its own callbacks; the recognizer only competes for
/// buttons that have at least one.
///
/// `on_tap_down` fires once the recognizer wins the arena or the pointer has
/// been down for [`PRESS_TIMEOUT`], whichever comes first. If the tap then
/// fails, `on_tap_cancel` fires; otherwise `on_tap_up` and `on_tap` fire on
/// the up (or, if the arena is still undecided then, when it is won).
#[derive(Clone)]
pub struct TapGestureRecognizer {
    inner: Rc<TapInner>,
}

impl fmt::Debug for TapGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapGestureRecognizer")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for TapGestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! tap_callbacks {
    ($button:ident: $down:ident, $up:ident, $tap:ident, $cancel:ident) => {
        /// Sets the callback run when a tap of this button is pressed.
        #[must_use]
        pub fn $down(self, f: impl FnMut(&TapDownDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_down = handler(f);
            self
        }

        /// Sets the callback run when a tap of this button is released.
        #[must_use]
        pub fn $up(self, f: impl FnMut(&TapUpDetails) + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_up = handler(f);
            self
        }

        /// Sets the callback run after the up callback of a completed tap.
        #[must_use]
        pub fn $tap(self, f: impl FnMut() + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_tap = void_handler(f);
            self
        }

        /// Sets the callback run when a tap that sent tap-down fails.
        #[must_use]
        pub fn $cancel(self, f: impl FnMut() + 'static) -> Self {
            self.inner.callbacks.borrow_mut().$button.on_cancel = void_handler(f);
            self
        }
    };
}

impl TapGestureRecognizer {
    /// Creates a tap recognizer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TapInner {
                state: RefCell::new(TapState {
                    primary: PrimaryPointerState::new(
                        Some(PRESS_TIMEOUT),
                        Some(TOUCH_SLOP),
                        Some(TOUCH_SLOP),
                    ),
                    filter: PointerFilter::default(),
                    sent_tap_down: false,
                    won_arena_for_primary_pointer: false,
                    down: None,
                    up: None,
                }),
                callbacks: RefCell::new(TapCallbacks::default()),
            }),
        }
    }

    tap_callbacks!(primary: on_tap_down, on_tap_up, on_tap, on_tap_cancel);
    tap_callbacks!(secondary: on_secondary_tap_down, on_secondary_tap_up, on_secondary_tap, on_secondary_tap_cancel);
    tap_callbacks!(tertiary: on_tertiary_tap_down, on_tertiary_tap_up, on_tertiary_tap, on_tertiary_tap_cancel);

    /// Restricts the devices and buttons the recognizer responds to.
    #[must_use]
    pub fn with_filter(self, filter: PointerFilter) -> Self {
        self.inner.state.borrow_mut().filter = filter;
        self
    }

    /// Sets the time after which tap-down fires without an arena decision.
    #[must_use]
    pub fn with_deadline(self, deadline: Option<Duration>) -> Self {
        self.inner.state.borrow_mut().primary.deadline = deadline;
        self
    }

    /// Sets the distance the pointer may drift before and after the arena is
    /// won.
    #[must_use]
    pub fn with_slop(self, pre_accept: Option<f64>, post_accept: Option<f64>) -> Self {
        let mut state = self.inner.state.borrow_mut();
        state.primary.pre_accept_slop = pre_accept;
        state.primary.post_accept_slop = post_accept;
        drop(state);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GestureRecognizerState {
        self.inner.state.borrow().primary.state
    }
}

impl GestureRecognizer for TapGestureRecognizer {
    fn add_pointer(&self, ctx: &GestureContext, event: &PointerEvent) {
        let inner = &self.inner;
        ctx.batch(|| {
            let mut emits = Emits::new();
            if inner.is_pointer_allowed(event) {
                inner
                    .state
                    .borrow_mut()
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
        "tap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PointerButtons;
    use alloc::string::String;
    use alloc::vec;
    use kurbo::Vec2;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logged(log: &Log, name: &'static str) -> impl FnMut() + 'static {
        let log = log.clone();
        move || log.borrow_mut().push(name.into())
    }

    fn recognizer(log: &Log) -> TapGestureRecognizer {
        let down = log.clone();
        let up = log.clone();
        TapGestureRecognizer::new()
            .on_tap_down(move |d| down.borrow_mut().push(alloc::format!("down {}", d.local_position.x)))
            .on_tap_up(move |_| up.borrow_mut().push("up".into()))
            .on_tap(logged(log, "tap"))
            .on_tap_cancel(logged(log, "cancel"))
    }

    const P: PointerId = PointerId(1);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Feeds `event` the way the binding does: offer downs, then route.
    fn feed(ctx: &GestureContext, tap: &TapGestureRecognizer, event: PointerEvent) {
        ctx.advance_to(event.timestamp);
        if event.kind == PointerEventKind::Down {
            tap.add_pointer(ctx, &event);
        }
        ctx.router().route(&event);
        match event.kind {
            PointerEventKind::Down => ctx.arena().close(event.pointer),
            PointerEventKind::Up => ctx.arena().sweep(event.pointer),
            _ => {}
        }
        ctx.drain_tasks();
    }

    #[test]
    fn quick_tap_fires_down_up_tap() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = recognizer(&log);
        feed(&ctx, &tap, PointerEvent::down(P, Point::new(3.0, 4.0)));
        // Sole member: the arena resolves by default after the down.
        assert_eq!(*log.borrow(), ["down 3"]);
        feed(&ctx, &tap, PointerEvent::up(P, Point::new(3.0, 4.0)).with_timestamp(ms(50)));
        assert_eq!(*log.borrow(), ["down 3", "up", "tap"]);
        assert_eq!(tap.state(), GestureRecognizerState::Ready);
    }

    #[test]
    fn competing_tap_waits_for_deadline_then_sweep() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = recognizer(&log);
        let other_log = Log::default();
        let other = recognizer(&other_log);

        let down = PointerEvent::down(P, Point::ZERO);
        tap.add_pointer(&ctx, &down);
        other.add_pointer(&ctx, &down);
        ctx.router().route(&down);
        ctx.arena().close(P);
        ctx.drain_tasks();
        assert!(log.borrow().is_empty());

        ctx.advance_to(ms(100));
        assert_eq!(*log.borrow(), ["down 0"]);

        feed(&ctx, &tap, PointerEvent::up(P, Point::ZERO).with_timestamp(ms(150)));
        assert_eq!(*log.borrow(), ["down 0", "up", "tap"]);
        assert_eq!(*other_log.borrow(), ["down 0", "cancel"]);
    }

    #[test]
    fn moving_past_slop_cancels_after_tap_down() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = recognizer(&log);
        feed(&ctx, &tap, PointerEvent::down(P, Point::ZERO));
        feed(
            &ctx,
            &tap,
            PointerEvent::moved(P, Point::new(30.0, 0.0))
                .with_delta(Vec2::new(30.0, 0.0))
                .with_timestamp(ms(20)),
        );
        assert_eq!(*log.borrow(), ["down 0", "cancel"]);
        feed(&ctx, &tap, PointerEvent::up(P, Point::new(30.0, 0.0)).with_timestamp(ms(40)));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn cancel_event_cancels() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = recognizer(&log);
        feed(&ctx, &tap, PointerEvent::down(P, Point::ZERO));
        feed(&ctx, &tap, PointerEvent::cancel(P, Point::ZERO).with_timestamp(ms(10)));
        assert_eq!(*log.borrow(), ["down 0", "cancel"]);
        assert_eq!(tap.state(), GestureRecognizerState::Ready);
        assert!(!ctx.router().is_routed(P));
    }

    #[test]
    fn buttons_without_callbacks_are_not_tracked() {
        let log = Log::default();
        let tap = recognizer(&log);
        let secondary = PointerEvent::down(P, Point::ZERO)
            .with_device_kind(PointerDeviceKind::Mouse)
            .with_buttons(PointerButtons::SECONDARY);
        assert!(!tap.is_pointer_allowed(&secondary));
        let tap = tap.on_secondary_tap(|| {});
        assert!(tap.is_pointer_allowed(&secondary));
    }

    #[test]
    fn secondary_button_uses_its_callbacks() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = TapGestureRecognizer::new()
            .on_tap(logged(&log, "primary"))
            .on_secondary_tap(logged(&log, "secondary"));
        let mouse = |event: PointerEvent| event.with_device_kind(PointerDeviceKind::Mouse);
        feed(
            &ctx,
            &tap,
            mouse(PointerEvent::down(P, Point::ZERO)).with_buttons(PointerButtons::SECONDARY),
        );
        feed(&ctx, &tap, mouse(PointerEvent::up(P, Point::ZERO)));
        assert_eq!(*log.borrow(), vec![String::from("secondary")]);
    }

    #[test]
    fn dispose_cancels_an_accepted_tap() {
        let ctx = GestureContext::new();
        let log = Log::default();
        let tap = recognizer(&log);
        feed(&ctx, &tap, PointerEvent::down(P, Point::ZERO));
        tap.dispose(&ctx);
        assert_eq!(*log.borrow(), ["down 0", "cancel"]);
        assert!(!ctx.router().is_routed(P));
    }
}
