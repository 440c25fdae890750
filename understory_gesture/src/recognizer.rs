// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture recognizers and the machinery they share.
//!
//! A recognizer is handed each pointer-down that hits its target through
//! [`GestureRecognizer::add_pointer`]. If it is interested, it starts
//! *tracking* the pointer: it registers a route with the
//! [`PointerRouter`](crate::PointerRouter) to see the rest of the contact
//! sequence, and joins the pointer's arena to compete with the other
//! recognizers on the path. From then on it drives its own state machine from
//! routed events, arena notifications, and timers, and reports what it
//! recognized through callbacks.
//!
//! Recognizers are cheap handles around shared state: cloning one yields
//! another handle to the same recognizer. Callbacks are configured with
//! consuming builder methods before the recognizer is attached to a target;
//! a callback must not reconfigure the recognizer that invoked it.
//!
//! The concrete recognizers are:
//! - [`TapGestureRecognizer`]: taps, per mouse button.
//! - [`LongPressGestureRecognizer`]: presses held past a deadline.
//! - [`DragGestureRecognizer`]: vertical, horizontal and free (pan) drags.
//! - [`TapAndDragGestureRecognizer`]: tap series that may turn into a drag,
//!   as used for text selection.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;
use kurbo::Affine;
use smallvec::SmallVec;

use crate::arena::{GestureArenaEntry, GestureArenaMember, GestureDisposition};
use crate::context::GestureContext;
use crate::event::{PointerButtons, PointerDeviceKinds, PointerEvent, PointerId};
use crate::router::PointerRoute;

mod drag;
mod long_press;
mod primary;
mod tap;
mod tap_drag;

pub use drag::{
    DragAxis, DragDownDetails, DragEndDetails, DragGestureRecognizer, DragStartBehavior,
    DragStartDetails, DragUpdateDetails, MultitouchDragStrategy, VelocityTrackerBuilder,
    default_velocity_tracker,
};
pub use long_press::{
    LongPressDownDetails, LongPressEndDetails, LongPressGestureRecognizer,
    LongPressMoveUpdateDetails, LongPressStartDetails,
};
pub use primary::GestureRecognizerState;
pub use tap::{TapDownDetails, TapGestureRecognizer, TapUpDetails};
pub use tap_drag::{
    TapAndDragGestureRecognizer, TapDragDownDetails, TapDragEndDetails, TapDragStartDetails,
    TapDragUpDetails, TapDragUpdateDetails,
};

/// A recognizer that can be attached to a hit-test target.
pub trait GestureRecognizer: fmt::Debug {
    /// Offers a pointer-down event to the recognizer.
    ///
    /// Allowed pointers are tracked; others may cause the recognizer to give
    /// up on the gesture in progress.
    fn add_pointer(&self, ctx: &GestureContext, event: &PointerEvent);

    /// Offers the start of a trackpad pan/zoom sequence.
    ///
    /// Most recognizers ignore these.
    fn add_pointer_pan_zoom(&self, ctx: &GestureContext, event: &PointerEvent) {
        let _ = (ctx, event);
    }

    /// Returns `true` if the recognizer would track `event`'s pointer.
    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool;

    /// Gives up every tracked pointer and leaves all arenas.
    fn dispose(&self, ctx: &GestureContext);

    /// Short name used in diagnostics.
    fn debug_description(&self) -> &'static str;
}

/// Device and button restrictions shared by every recognizer.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerFilter {
    /// Device kinds the recognizer responds to; all kinds when `None`.
    pub supported_devices: Option<PointerDeviceKinds>,
    /// Button combinations the recognizer responds to; the recognizer's own
    /// default when `None`.
    pub allowed_buttons: Option<fn(PointerButtons) -> bool>,
}

impl PointerFilter {
    /// Returns `true` if `event` passes the device filter and the button
    /// filter, using `default_buttons` when no button filter is set.
    #[must_use]
    pub fn allows(&self, event: &PointerEvent, default_buttons: fn(PointerButtons) -> bool) -> bool {
        let device_ok = self
            .supported_devices
            .is_none_or(|devices| devices.contains_kind(event.device_kind));
        let buttons_ok = self.allowed_buttons.unwrap_or(default_buttons)(event.buttons);
        device_ok && buttons_ok
    }
}

pub(crate) fn any_buttons(_: PointerButtons) -> bool {
    true
}

pub(crate) fn primary_button_only(buttons: PointerButtons) -> bool {
    buttons == PointerButtons::PRIMARY
}

/// The single button a per-button callback set belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CallbackButton {
    Primary,
    Secondary,
    Tertiary,
}

impl CallbackButton {
    /// Maps an exact button state to its callback set, if it has one.
    pub(crate) fn from_buttons(buttons: PointerButtons) -> Option<Self> {
        if buttons == PointerButtons::PRIMARY {
            Some(Self::Primary)
        } else if buttons == PointerButtons::SECONDARY {
            Some(Self::Secondary)
        } else if buttons == PointerButtons::TERTIARY {
            Some(Self::Tertiary)
        } else {
            None
        }
    }
}

/// A user callback slot.
pub(crate) type Handler<T> = Option<Box<dyn FnMut(&T)>>;

pub(crate) fn handler<T>(mut f: impl FnMut(&T) + 'static) -> Handler<T> {
    Some(Box::new(move |details: &T| f(details)))
}

pub(crate) fn void_handler(mut f: impl FnMut() + 'static) -> Handler<()> {
    Some(Box::new(move |_: &()| f()))
}

/// Runs the callback in `slot`, if any, without holding a borrow of the
/// callback table while it runs.
pub(crate) fn invoke<C, T>(
    callbacks: &RefCell<C>,
    slot: impl Fn(&mut C) -> &mut Handler<T>,
    details: &T,
) {
    let taken = slot(&mut callbacks.borrow_mut()).take();
    let Some(mut callback) = taken else {
        return;
    };
    callback(details);
    let mut callbacks = callbacks.borrow_mut();
    let slot = slot(&mut callbacks);
    if slot.is_none() {
        *slot = Some(callback);
    }
}

/// Pointers tracked by a recognizer that competes for them as a unit.
///
/// Each tracked pointer has a route to the recognizer and, until resolved, an
/// arena entry.
#[derive(Default)]
pub(crate) struct PointerTracking {
    tracked: SmallVec<[PointerId; 2]>,
    entries: HashMap<PointerId, GestureArenaEntry>,
}

impl fmt::Debug for PointerTracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerTracking")
            .field("tracked", &self.tracked)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl PointerTracking {
    /// Routes `pointer` to `this` and enters its arena.
    pub(crate) fn start<T>(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<T>,
        pointer: PointerId,
        transform: Option<Affine>,
    ) where
        T: PointerRoute + GestureArenaMember + 'static,
    {
        ctx.router().add_route(pointer, this.clone(), transform);
        self.tracked.push(pointer);
        let entry = ctx.arena().add(pointer, this.clone());
        self.entries.insert(pointer, entry);
    }

    /// Removes the route for `pointer`.
    ///
    /// Returns `true` if that was the last tracked pointer, in which case the
    /// caller runs its end-of-gesture logic.
    pub(crate) fn stop<T>(&mut self, ctx: &GestureContext, this: &Rc<T>, pointer: PointerId) -> bool
    where
        T: PointerRoute + 'static,
    {
        let Some(index) = self.tracked.iter().position(|&tracked| tracked == pointer) else {
            return false;
        };
        let route: Rc<dyn PointerRoute> = this.clone();
        ctx.router().remove_route(pointer, &route);
        self.tracked.remove(index);
        if !self.tracked.is_empty() {
            return false;
        }
        // Entries of arenas that resolved without us asking are dead weight.
        self.entries
            .retain(|&entry_pointer, _| ctx.arena().has_arena(entry_pointer));
        true
    }

    /// Stops tracking `event`'s pointer if the event ends its sequence.
    pub(crate) fn stop_if_no_longer_down<T>(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<T>,
        event: &PointerEvent,
    ) -> bool
    where
        T: PointerRoute + 'static,
    {
        event.kind.is_end() && self.stop(ctx, this, event.pointer)
    }

    pub(crate) fn is_tracking(&self, pointer: PointerId) -> bool {
        self.tracked.contains(&pointer)
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Resolves every unresolved entry with `disposition`.
    pub(crate) fn resolve(&mut self, ctx: &GestureContext, disposition: GestureDisposition) {
        for (_, entry) in self.entries.drain() {
            entry.resolve(ctx, disposition);
        }
    }

    /// Resolves the entry for `pointer`, if it is still unresolved.
    pub(crate) fn resolve_pointer(
        &mut self,
        ctx: &GestureContext,
        pointer: PointerId,
        disposition: GestureDisposition,
    ) {
        if let Some(entry) = self.entries.remove(&pointer) {
            entry.resolve(ctx, disposition);
        }
    }

    /// Rejects every entry and removes every route.
    pub(crate) fn dispose<T>(&mut self, ctx: &GestureContext, this: &Rc<T>)
    where
        T: PointerRoute + 'static,
    {
        self.resolve(ctx, GestureDisposition::Rejected);
        let route: Rc<dyn PointerRoute> = this.clone();
        for pointer in self.tracked.drain(..) {
            ctx.router().remove_route(pointer, &route);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PointerDeviceKind;
    use alloc::vec::Vec;
    use kurbo::Point;

    #[derive(Default)]
    struct Probe {
        events: RefCell<Vec<PointerId>>,
        outcomes: RefCell<Vec<(PointerId, bool)>>,
    }

    impl PointerRoute for Probe {
        fn handle_event(self: Rc<Self>, _: &GestureContext, event: &PointerEvent) {
            self.events.borrow_mut().push(event.pointer);
        }
    }

    impl GestureArenaMember for Probe {
        fn accept_gesture(self: Rc<Self>, _: &GestureContext, pointer: PointerId) {
            self.outcomes.borrow_mut().push((pointer, true));
        }

        fn reject_gesture(self: Rc<Self>, _: &GestureContext, pointer: PointerId) {
            self.outcomes.borrow_mut().push((pointer, false));
        }
    }

    #[test]
    fn filter_checks_devices_and_buttons() {
        let touch = PointerEvent::down(PointerId(1), Point::ZERO);
        let mouse_secondary = PointerEvent::down(PointerId(2), Point::ZERO)
            .with_device_kind(PointerDeviceKind::Mouse)
            .with_buttons(PointerButtons::SECONDARY);

        let filter = PointerFilter::default();
        assert!(filter.allows(&touch, primary_button_only));
        assert!(!filter.allows(&mouse_secondary, primary_button_only));
        assert!(filter.allows(&mouse_secondary, any_buttons));

        let touch_only = PointerFilter {
            supported_devices: Some(PointerDeviceKinds::TOUCH),
            allowed_buttons: None,
        };
        assert!(touch_only.allows(&touch, any_buttons));
        assert!(!touch_only.allows(&mouse_secondary, any_buttons));
    }

    #[test]
    fn last_stop_reports_and_dispose_cleans_up() {
        let ctx = GestureContext::new();
        let probe = Rc::new(Probe::default());
        let mut tracking = PointerTracking::default();
        tracking.start(&ctx, &probe, PointerId(1), None);
        tracking.start(&ctx, &probe, PointerId(2), None);
        assert!(tracking.is_tracking(PointerId(1)));
        assert_eq!(tracking.tracked_count(), 2);

        ctx.router().route(&PointerEvent::moved(PointerId(2), Point::ZERO));
        assert_eq!(*probe.events.borrow(), [PointerId(2)]);

        assert!(!tracking.stop(&ctx, &probe, PointerId(1)));
        assert!(!tracking.stop(&ctx, &probe, PointerId(1)));
        assert!(!ctx.router().is_routed(PointerId(1)));

        tracking.dispose(&ctx, &probe);
        assert!(!ctx.router().is_routed(PointerId(2)));
        let mut outcomes = probe.outcomes.borrow().clone();
        outcomes.sort_by_key(|(pointer, _)| *pointer);
        assert_eq!(outcomes, [(PointerId(1), false), (PointerId(2), false)]);
    }

    #[test]
    fn resolve_pointer_only_touches_one_entry() {
        let ctx = GestureContext::new();
        let probe = Rc::new(Probe::default());
        let mut tracking = PointerTracking::default();
        tracking.start(&ctx, &probe, PointerId(1), None);
        tracking.start(&ctx, &probe, PointerId(2), None);
        tracking.resolve_pointer(&ctx, PointerId(2), GestureDisposition::Rejected);
        tracking.resolve_pointer(&ctx, PointerId(2), GestureDisposition::Rejected);
        assert_eq!(*probe.outcomes.borrow(), [(PointerId(2), false)]);
        assert!(ctx.arena().has_arena(PointerId(1)));
    }

    #[test]
    fn invoke_restores_callback() {
        struct Callbacks {
            on_value: Handler<u32>,
        }
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let callbacks = RefCell::new(Callbacks {
            on_value: handler(move |value: &u32| sink.borrow_mut().push(*value)),
        });
        invoke(&callbacks, |c| &mut c.on_value, &1);
        invoke(&callbacks, |c| &mut c.on_value, &2);
        assert_eq!(*seen.borrow(), [1, 2]);
        assert!(callbacks.borrow().on_value.is_some());
    }
}
