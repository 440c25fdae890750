// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bookkeeping for recognizers that follow one primary pointer.
//!
//! The first allowed down becomes the primary pointer. The recognizer is
//! `Possible` until the primary pointer drifts too far, the arena is lost, or
//! every tracked pointer is gone; a lost arena leaves it `Defunct` until then.
//! An optional deadline timer runs from the down until the arena is won.

use alloc::rc::{Rc, Weak};
use core::time::Duration;

use kurbo::Point;

use super::PointerTracking;
use crate::arena::GestureArenaMember;
use crate::context::{GestureContext, TimerHandle};
use crate::event::{PointerEvent, PointerEventKind, PointerId, PositionPair};
use crate::router::PointerRoute;

/// Lifecycle of a primary-pointer recognizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureRecognizerState {
    /// Waiting for a pointer.
    #[default]
    Ready,
    /// Tracking a primary pointer; the gesture may still be recognized.
    Possible,
    /// The gesture failed; waiting for the tracked pointers to go away.
    Defunct,
}

/// A recognizer with a primary-pointer deadline.
pub(crate) trait DeadlineRecognizer: PointerRoute + GestureArenaMember + 'static {
    /// The deadline passed before the arena was won.
    fn did_exceed_deadline(self: Rc<Self>, ctx: &GestureContext);
}

/// How a routed event relates to the primary pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PrimaryEvent {
    /// The primary pointer moved past the allowed slop.
    PastSlop,
    /// An event of the primary pointer while possible.
    Primary,
    /// Anything else.
    Other,
}

#[derive(Debug)]
pub(crate) struct PrimaryPointerState {
    pub(crate) tracking: PointerTracking,
    pub(crate) state: GestureRecognizerState,
    pub(crate) primary_pointer: Option<PointerId>,
    pub(crate) initial_position: Option<PositionPair>,
    pub(crate) gesture_accepted: bool,
    pub(crate) deadline: Option<Duration>,
    pub(crate) pre_accept_slop: Option<f64>,
    pub(crate) post_accept_slop: Option<f64>,
    timer: Option<TimerHandle>,
}

impl PrimaryPointerState {
    pub(crate) fn new(
        deadline: Option<Duration>,
        pre_accept_slop: Option<f64>,
        post_accept_slop: Option<f64>,
    ) -> Self {
        Self {
            tracking: PointerTracking::default(),
            state: GestureRecognizerState::Ready,
            primary_pointer: None,
            initial_position: None,
            gesture_accepted: false,
            deadline,
            pre_accept_slop,
            post_accept_slop,
            timer: None,
        }
    }

    /// Tracks `event`'s pointer, making it primary when ready.
    pub(crate) fn add_allowed_pointer<T: DeadlineRecognizer>(
        &mut self,
        ctx: &GestureContext,
        this: &Rc<T>,
        event: &PointerEvent,
    ) {
        self.tracking
            .start(ctx, this, event.pointer, event.transform);
        if self.state != GestureRecognizerState::Ready {
            return;
        }
        self.state = GestureRecognizerState::Possible;
        self.gesture_accepted = false;
        self.primary_pointer = Some(event.pointer);
        self.initial_position = Some(event.position_pair());
        if let Some(deadline) = self.deadline {
            let weak: Weak<T> = Rc::downgrade(this);
            self.timer = Some(ctx.start_timer(deadline, move |ctx| {
                if let Some(this) = weak.upgrade() {
                    this.did_exceed_deadline(ctx);
                }
            }));
        }
    }

    /// Non-allowed downs abandon the gesture unless it was already won.
    pub(crate) fn should_reject_non_allowed(&self) -> bool {
        !self.gesture_accepted
    }

    fn global_distance(&self, position: Point) -> f64 {
        self.initial_position
            .map_or(0.0, |initial| (position - initial.global).hypot())
    }

    pub(crate) fn classify(&self, event: &PointerEvent) -> PrimaryEvent {
        debug_assert!(
            self.state != GestureRecognizerState::Ready,
            "routed event while not tracking"
        );
        if self.state != GestureRecognizerState::Possible
            || Some(event.pointer) != self.primary_pointer
        {
            return PrimaryEvent::Other;
        }
        let slop = if self.gesture_accepted {
            self.post_accept_slop
        } else {
            self.pre_accept_slop
        };
        let past_slop = slop.is_some_and(|slop| self.global_distance(event.position) > slop);
        if event.kind == PointerEventKind::Move && past_slop {
            PrimaryEvent::PastSlop
        } else {
            PrimaryEvent::Primary
        }
    }

    pub(crate) fn stop_timer(&mut self, ctx: &GestureContext) {
        if let Some(timer) = self.timer.take() {
            ctx.cancel_timer(timer);
        }
    }

    /// Marks the gesture as won when `pointer` is primary.
    pub(crate) fn accept_gesture(&mut self, ctx: &GestureContext, pointer: PointerId) {
        if Some(pointer) == self.primary_pointer {
            self.stop_timer(ctx);
            self.gesture_accepted = true;
        }
    }

    /// Marks the gesture as failed when `pointer` is primary.
    pub(crate) fn reject_gesture(&mut self, ctx: &GestureContext, pointer: PointerId) {
        if Some(pointer) == self.primary_pointer && self.state == GestureRecognizerState::Possible
        {
            self.stop_timer(ctx);
            self.state = GestureRecognizerState::Defunct;
        }
    }

    /// Returns to ready once the last tracked pointer is gone.
    ///
    /// The primary pointer id is kept so that a late arena decision for it
    /// is still recognized.
    pub(crate) fn did_stop_tracking_last_pointer(&mut self, ctx: &GestureContext) {
        self.stop_timer(ctx);
        self.state = GestureRecognizerState::Ready;
        self.initial_position = None;
        self.gesture_accepted = false;
    }
}
