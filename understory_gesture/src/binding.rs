// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The top-level dispatcher that feeds pointer input into the gesture system.
//!
//! A [`GestureBinding`] owns a [`GestureContext`] and remembers, per pointer,
//! the hit-test path found when the pointer went down. Each event is
//!
//! 1. hit-tested (downs, hovers, signals and pan/zoom starts) or matched with
//!    the stored path,
//! 2. dispatched to every entry on the path, transformed into the entry's
//!    local coordinates,
//! 3. routed through the [`PointerRouter`](crate::PointerRouter) to the
//!    recognizers tracking its pointer,
//! 4. used to close (down, pan/zoom start) or sweep (up, pan/zoom end) the
//!    pointer's arena, or to resolve a pointer signal,
//!
//! after which the context's deferred tasks are drained.
//!
//! [`GestureTarget`] is the usual hit-test target: it hands downs to the
//! recognizers attached to it.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use kurbo::Point;
//! use understory_gesture::{
//!     GestureBinding, GestureTarget, HitTestEntry, HitTestResult, PointerEvent, PointerId,
//!     TapGestureRecognizer, ViewId,
//! };
//!
//! let taps = Rc::new(Cell::new(0));
//! let counter = taps.clone();
//! let target = Rc::new(
//!     GestureTarget::new()
//!         .with_recognizer(TapGestureRecognizer::new().on_tap(move || counter.set(counter.get() + 1))),
//! );
//!
//! let hit = target.clone();
//! let mut binding = GestureBinding::new(move |result: &mut HitTestResult, _: Point, _: ViewId| {
//!     result.add(HitTestEntry::new(hit.clone()));
//! });
//! binding.handle_event(PointerEvent::down(PointerId(1), Point::ZERO));
//! binding.handle_event(PointerEvent::up(PointerId(1), Point::ZERO));
//! assert_eq!(taps.get(), 1);
//! ```

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;
use kurbo::Point;
use log::trace;

use crate::context::GestureContext;
use crate::data::{PointerData, convert_pointer_data};
use crate::event::{PointerEvent, PointerEventKind, PointerId, ViewId};
use crate::hit_test::{HitTestEntry, HitTestResult, HitTestTarget};
use crate::recognizer::GestureRecognizer;

/// Finds the targets under a position.
///
/// Implemented for closures taking the same arguments.
pub trait HitTester {
    /// Adds the targets under `position` in `view` to `result`, innermost
    /// first.
    fn hit_test(&self, result: &mut HitTestResult, position: Point, view: ViewId);
}

impl<F> HitTester for F
where
    F: Fn(&mut HitTestResult, Point, ViewId),
{
    fn hit_test(&self, result: &mut HitTestResult, position: Point, view: ViewId) {
        self(result, position, view);
    }
}

/// A pointer that is down, with the path it hit.
struct DownPointer {
    result: HitTestResult,
    last_event: PointerEvent,
}

/// Dispatches pointer events to hit-test targets and recognizers.
pub struct GestureBinding<H> {
    ctx: GestureContext,
    hit_tester: H,
    down: HashMap<PointerId, DownPointer>,
}

impl<H> fmt::Debug for GestureBinding<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut down: Vec<_> = self.down.keys().copied().collect();
        down.sort();
        f.debug_struct("GestureBinding")
            .field("ctx", &self.ctx)
            .field("down", &down)
            .finish_non_exhaustive()
    }
}

impl<H: HitTester> GestureBinding<H> {
    /// Creates a binding with a fresh context.
    #[must_use]
    pub fn new(hit_tester: H) -> Self {
        Self::with_context(GestureContext::new(), hit_tester)
    }

    /// Creates a binding around an existing context.
    #[must_use]
    pub fn with_context(ctx: GestureContext, hit_tester: H) -> Self {
        Self {
            ctx,
            hit_tester,
            down: HashMap::new(),
        }
    }

    /// The context recognizers attached through this binding must use.
    #[must_use]
    pub fn context(&self) -> &GestureContext {
        &self.ctx
    }

    /// The path hit when `pointer` went down, while it is still down.
    #[must_use]
    pub fn hit_test_result(&self, pointer: PointerId) -> Option<&HitTestResult> {
        self.down.get(&pointer).map(|down| &down.result)
    }

    /// Returns `true` between a pointer's down (or pan/zoom start) and its end.
    #[must_use]
    pub fn is_pointer_down(&self, pointer: PointerId) -> bool {
        self.down.contains_key(&pointer)
    }

    /// Dispatches one logical pointer event.
    pub fn handle_event(&mut self, event: PointerEvent) {
        let ctx = &self.ctx;
        ctx.advance_to(event.timestamp);

        let result = match event.kind {
            PointerEventKind::Down
            | PointerEventKind::PanZoomStart
            | PointerEventKind::Hover
            | PointerEventKind::Scroll { .. }
            | PointerEventKind::ScrollInertiaCancel => {
                let mut result = HitTestResult::new();
                self.hit_tester
                    .hit_test(&mut result, event.position, event.view_id);
                trace!(
                    "{:?}: hit {} targets at ({}, {})",
                    event.pointer,
                    result.len(),
                    event.position.x,
                    event.position.y
                );
                if matches!(
                    event.kind,
                    PointerEventKind::Down | PointerEventKind::PanZoomStart
                ) {
                    self.down.insert(
                        event.pointer,
                        DownPointer {
                            result: result.clone(),
                            last_event: event.clone(),
                        },
                    );
                }
                Some(result)
            }
            kind if kind.is_end() => self.down.remove(&event.pointer).map(|down| down.result),
            _ => self.down.get_mut(&event.pointer).map(|down| {
                down.last_event = event.clone();
                down.result.clone()
            }),
        };

        if let Some(result) = &result {
            for entry in result.path() {
                entry
                    .target()
                    .handle_event(ctx, &event.transformed(entry.transform()), entry);
            }
        }

        ctx.router().route(&event);
        match event.kind {
            PointerEventKind::Down | PointerEventKind::PanZoomStart => {
                ctx.arena().close(event.pointer);
            }
            PointerEventKind::Up | PointerEventKind::PanZoomEnd => {
                ctx.arena().sweep(event.pointer);
            }
            kind if kind.is_signal() => ctx.signals().resolve(&event),
            _ => {}
        }
        ctx.drain_tasks();
    }

    /// Converts platform records and dispatches the resulting events.
    ///
    /// `device_pixel_ratio` maps a view to its ratio; records for views it
    /// does not know are dropped.
    pub fn handle_pointer_data<I, F>(&mut self, data: I, device_pixel_ratio: F)
    where
        I: IntoIterator<Item = PointerData>,
        F: Fn(ViewId) -> Option<f64>,
    {
        for event in convert_pointer_data(data, device_pixel_ratio) {
            self.handle_event(event);
        }
    }

    /// Dispatches a synthesized cancel for `pointer` if it is down.
    ///
    /// Returns `false` if the pointer was not down.
    pub fn cancel_pointer(&mut self, pointer: PointerId) -> bool {
        let Some(down) = self.down.get(&pointer) else {
            return false;
        };
        let last = &down.last_event;
        let cancel = PointerEvent::cancel(pointer, last.position)
            .with_timestamp(self.ctx.now().max(last.timestamp))
            .with_device(last.device)
            .with_device_kind(last.device_kind)
            .with_view(last.view_id)
            .with_synthesized(true);
        trace!("{pointer:?}: cancelled by the host");
        self.handle_event(cancel);
        true
    }
}

type SignalHandler = Rc<dyn Fn(&GestureContext, &PointerEvent)>;

/// A hit-test target that offers pointers to its recognizers.
///
/// Downs go to [`GestureRecognizer::add_pointer`] and pan/zoom starts to
/// [`GestureRecognizer::add_pointer_pan_zoom`], in the order the recognizers
/// were added. A signal handler, if set, competes for pointer signals through
/// the context's [`PointerSignalResolver`](crate::PointerSignalResolver).
#[derive(Default)]
pub struct GestureTarget {
    recognizers: RefCell<Vec<Rc<dyn GestureRecognizer>>>,
    on_signal: Option<SignalHandler>,
}

impl fmt::Debug for GestureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureTarget")
            .field("recognizers", &self.recognizers.borrow())
            .field("has_signal_handler", &self.on_signal.is_some())
            .finish()
    }
}

impl GestureTarget {
    /// Creates a target without recognizers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `recognizer`.
    #[must_use]
    pub fn with_recognizer(self, recognizer: impl GestureRecognizer + 'static) -> Self {
        self.add_recognizer(recognizer);
        self
    }

    /// Handles pointer signals that this target wins.
    #[must_use]
    pub fn with_signal_handler(
        mut self,
        handler: impl Fn(&GestureContext, &PointerEvent) + 'static,
    ) -> Self {
        self.on_signal = Some(Rc::new(handler));
        self
    }

    /// Attaches `recognizer`; it sees downs from the next one on.
    pub fn add_recognizer(&self, recognizer: impl GestureRecognizer + 'static) {
        self.recognizers.borrow_mut().push(Rc::new(recognizer));
    }

    /// Number of attached recognizers.
    #[must_use]
    pub fn recognizer_count(&self) -> usize {
        self.recognizers.borrow().len()
    }

    /// Disposes and detaches every recognizer.
    pub fn dispose(&self, ctx: &GestureContext) {
        let recognizers = core::mem::take(&mut *self.recognizers.borrow_mut());
        for recognizer in recognizers {
            recognizer.dispose(ctx);
        }
    }
}

impl HitTestTarget for GestureTarget {
    fn handle_event(&self, ctx: &GestureContext, event: &PointerEvent, _: &HitTestEntry) {
        match event.kind {
            PointerEventKind::Down | PointerEventKind::PanZoomStart => {
                // Recognizers added by a callback wait for the next down.
                let recognizers = self.recognizers.borrow().clone();
                for recognizer in recognizers {
                    if event.kind == PointerEventKind::Down {
                        recognizer.add_pointer(ctx, event);
                    } else {
                        recognizer.add_pointer_pan_zoom(ctx, event);
                    }
                }
            }
            kind if kind.is_signal() => {
                if let Some(handler) = &self.on_signal {
                    let handler = handler.clone();
                    ctx.signals()
                        .register(event, move |ctx, event| handler(ctx, event));
                }
            }
            _ => {}
        }
    }
}
