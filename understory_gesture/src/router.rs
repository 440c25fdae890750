// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer router: delivers events to listeners registered per pointer.
//!
//! Recognizers register a route for each pointer they track, together with
//! the global-to-local transform of the target they were attached to. Global
//! routes see every event.
//!
//! [`PointerRouter::route`] works from a snapshot of the routes taken before
//! the first listener runs. Listeners added while routing do not see the
//! current event; a listener removed before its turn is skipped.
//!
//! ```
//! use core::cell::RefCell;
//! use std::rc::Rc;
//! use kurbo::{Affine, Point};
//! use understory_gesture::{GestureContext, PointerEvent, PointerId, PointerRoute};
//!
//! #[derive(Default)]
//! struct Recorder(RefCell<Vec<Point>>);
//!
//! impl PointerRoute for Recorder {
//!     fn handle_event(self: Rc<Self>, _: &GestureContext, event: &PointerEvent) {
//!         self.0.borrow_mut().push(event.local_position);
//!     }
//! }
//!
//! let ctx = GestureContext::new();
//! let recorder = Rc::new(Recorder::default());
//! let offset = Some(Affine::translate((-10.0, 0.0)));
//! ctx.router().add_route(PointerId(1), recorder.clone(), offset);
//!
//! ctx.router().route(&PointerEvent::down(PointerId(1), Point::new(15.0, 5.0)));
//! ctx.router().route(&PointerEvent::down(PointerId(2), Point::new(15.0, 5.0)));
//! assert_eq!(*recorder.0.borrow(), [Point::new(5.0, 5.0)]);
//! ```

use alloc::rc::Rc;
use core::fmt;

use hashbrown::HashMap;
use kurbo::Affine;
use smallvec::SmallVec;

use crate::arena::member_addr;
use crate::context::GestureContext;
use crate::event::{PointerEvent, PointerId};

/// A listener for routed pointer events.
pub trait PointerRoute {
    /// Handles `event`, already transformed into this route's space.
    fn handle_event(self: Rc<Self>, ctx: &GestureContext, event: &PointerEvent);
}

#[derive(Clone)]
struct Route {
    listener: Rc<dyn PointerRoute>,
    transform: Option<Affine>,
}

impl Route {
    fn is(&self, listener: &Rc<dyn PointerRoute>) -> bool {
        member_addr(Rc::as_ptr(&self.listener)) == member_addr(Rc::as_ptr(listener))
    }
}

type Routes = SmallVec<[Route; 4]>;

fn contains(routes: &[Route], listener: &Rc<dyn PointerRoute>) -> bool {
    routes.iter().any(|route| route.is(listener))
}

/// Per-pointer and global routing tables.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: HashMap<PointerId, Routes>,
    global: Routes,
}

impl RouteTable {
    fn has_route(&self, pointer: PointerId, listener: &Rc<dyn PointerRoute>) -> bool {
        self.routes
            .get(&pointer)
            .is_some_and(|routes| contains(routes, listener))
    }

    fn has_global_route(&self, listener: &Rc<dyn PointerRoute>) -> bool {
        contains(&self.global, listener)
    }
}

/// Access to the routing tables of a [`GestureContext`], from
/// [`GestureContext::router`].
#[derive(Clone, Copy)]
pub struct PointerRouter<'a> {
    ctx: &'a GestureContext,
}

impl fmt::Debug for PointerRouter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.ctx.router.borrow();
        f.debug_struct("PointerRouter")
            .field("pointers", &table.routes.len())
            .field("global_routes", &table.global.len())
            .finish()
    }
}

impl<'a> PointerRouter<'a> {
    pub(crate) fn new(ctx: &'a GestureContext) -> Self {
        Self { ctx }
    }

    /// Routes events for `pointer` to `listener`, transformed by `transform`.
    ///
    /// Registering the same listener twice for a pointer is a programming
    /// error.
    pub fn add_route(
        &self,
        pointer: PointerId,
        listener: Rc<dyn PointerRoute>,
        transform: Option<Affine>,
    ) {
        let mut table = self.ctx.router.borrow_mut();
        let routes = table.routes.entry(pointer).or_default();
        debug_assert!(
            !contains(routes, &listener),
            "listener is already routed for this pointer"
        );
        routes.push(Route {
            listener,
            transform,
        });
    }

    /// Stops routing events for `pointer` to `listener`.
    ///
    /// Removing a listener that was never added is a programming error.
    pub fn remove_route(&self, pointer: PointerId, listener: &Rc<dyn PointerRoute>) {
        let mut table = self.ctx.router.borrow_mut();
        let routes = table.routes.get_mut(&pointer);
        debug_assert!(routes.is_some(), "no routes registered for this pointer");
        let Some(routes) = routes else {
            return;
        };
        let index = routes.iter().position(|route| route.is(listener));
        debug_assert!(index.is_some(), "listener is not routed for this pointer");
        if let Some(index) = index {
            routes.remove(index);
        }
        if routes.is_empty() {
            table.routes.remove(&pointer);
        }
    }

    /// Routes every event to `listener`, transformed by `transform`.
    pub fn add_global_route(&self, listener: Rc<dyn PointerRoute>, transform: Option<Affine>) {
        let mut table = self.ctx.router.borrow_mut();
        debug_assert!(
            !contains(&table.global, &listener),
            "listener is already a global route"
        );
        table.global.push(Route {
            listener,
            transform,
        });
    }

    /// Removes a global route.
    pub fn remove_global_route(&self, listener: &Rc<dyn PointerRoute>) {
        let mut table = self.ctx.router.borrow_mut();
        let index = table.global.iter().position(|route| route.is(listener));
        debug_assert!(index.is_some(), "listener is not a global route");
        if let Some(index) = index {
            table.global.remove(index);
        }
    }

    /// Returns `true` if any listener is routed for `pointer`.
    #[must_use]
    pub fn is_routed(&self, pointer: PointerId) -> bool {
        self.ctx.router.borrow().routes.contains_key(&pointer)
    }

    /// Number of listeners routed for `pointer`.
    #[must_use]
    pub fn route_count(&self, pointer: PointerId) -> usize {
        self.ctx
            .router
            .borrow()
            .routes
            .get(&pointer)
            .map_or(0, SmallVec::len)
    }

    /// Dispatches `event` to the listeners of its pointer, then to the global
    /// listeners.
    pub fn route(&self, event: &PointerEvent) {
        let ctx = self.ctx;
        let (routes, global) = {
            let table = ctx.router.borrow();
            (
                table.routes.get(&event.pointer).cloned().unwrap_or_default(),
                table.global.clone(),
            )
        };
        ctx.batch(|| {
            for route in routes {
                if ctx.router.borrow().has_route(event.pointer, &route.listener) {
                    route
                        .listener
                        .handle_event(ctx, &event.transformed(route.transform));
                }
            }
            for route in global {
                if ctx.router.borrow().has_global_route(&route.listener) {
                    route
                        .listener
                        .handle_event(ctx, &event.transformed(route.transform));
                }
            }
        });
    }
}
