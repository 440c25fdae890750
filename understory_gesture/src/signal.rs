// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! First-registrant-wins resolution of pointer signals such as scrolling.
//!
//! Signals are discrete and do not go through an arena. While a signal is
//! dispatched along the hit-test path, interested targets call
//! [`PointerSignalResolver::register`]; only the first registration counts.
//! After dispatch, the binding calls [`PointerSignalResolver::resolve`], which
//! runs that single callback.

use alloc::boxed::Box;
use core::fmt;

use crate::context::GestureContext;
use crate::event::PointerEvent;

type SignalCallback = Box<dyn FnOnce(&GestureContext, &PointerEvent)>;

#[derive(Default)]
pub(crate) struct SignalSlot {
    pending: Option<(PointerEvent, SignalCallback)>,
}

/// Access to the signal resolver of a [`GestureContext`], from
/// [`GestureContext::signals`].
#[derive(Clone, Copy)]
pub struct PointerSignalResolver<'a> {
    ctx: &'a GestureContext,
}

impl fmt::Debug for PointerSignalResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerSignalResolver")
            .field("is_registered", &self.is_registered())
            .finish()
    }
}

fn is_same_signal(a: &PointerEvent, b: &PointerEvent) -> bool {
    a.pointer == b.pointer
        && a.timestamp == b.timestamp
        && core::mem::discriminant(&a.kind) == core::mem::discriminant(&b.kind)
}

impl<'a> PointerSignalResolver<'a> {
    pub(crate) fn new(ctx: &'a GestureContext) -> Self {
        Self { ctx }
    }

    /// Registers interest in `event`.
    ///
    /// Returns `true` if this is the first registration for the signal being
    /// dispatched; later registrations are ignored. `callback` receives the
    /// event as it was registered, so a target can register a locally
    /// transformed copy.
    pub fn register(
        &self,
        event: &PointerEvent,
        callback: impl FnOnce(&GestureContext, &PointerEvent) + 'static,
    ) -> bool {
        let mut slot = self.ctx.signals.borrow_mut();
        if slot.pending.is_some() {
            return false;
        }
        slot.pending = Some((event.clone(), Box::new(callback)));
        true
    }

    /// Returns `true` if a callback is waiting for [`resolve`](Self::resolve).
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.ctx.signals.borrow().pending.is_some()
    }

    /// Runs the first registered callback for `event`, if any, and clears the
    /// registration.
    pub fn resolve(&self, event: &PointerEvent) {
        let pending = self.ctx.signals.borrow_mut().pending.take();
        let Some((registered, callback)) = pending else {
            return;
        };
        debug_assert!(
            is_same_signal(&registered, event),
            "resolving a different signal than the one registered"
        );
        self.ctx.batch(|| callback(self.ctx, &registered));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use kurbo::{Point, Vec2};

    use crate::event::PointerId;

    fn scroll() -> PointerEvent {
        PointerEvent::scroll(PointerId(1), Point::new(5.0, 5.0), Vec2::new(0.0, 12.0))
    }

    #[test]
    fn first_registration_wins() {
        let ctx = GestureContext::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let event = scroll();

        let first = log.clone();
        assert!(ctx.signals().register(&event, move |_, _| first.borrow_mut().push("first")));
        let second = log.clone();
        assert!(!ctx.signals().register(&event, move |_, _| second.borrow_mut().push("second")));
        assert!(ctx.signals().is_registered());

        ctx.signals().resolve(&event);
        assert_eq!(*log.borrow(), ["first"]);
        assert!(!ctx.signals().is_registered());

        // Resolving again runs nothing.
        ctx.signals().resolve(&event);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn callback_receives_registered_event() {
        let ctx = GestureContext::new();
        let seen = Rc::new(RefCell::new(None));
        let event = scroll();
        let local = event.transformed(Some(kurbo::Affine::translate((-5.0, -5.0))));
        let slot = seen.clone();
        ctx.signals()
            .register(&local, move |_, e| *slot.borrow_mut() = Some(e.local_position));
        ctx.signals().resolve(&event);
        assert_eq!(*seen.borrow(), Some(Point::ZERO));
    }

    #[test]
    fn resolve_without_registration_is_a_no_op() {
        let ctx = GestureContext::new();
        ctx.signals().resolve(&scroll());
        assert!(!ctx.signals().is_registered());
    }
}
